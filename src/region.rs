use bevy::math::{IVec2, UVec2};
use itertools::iproduct;

/// An axis aligned integer rectangle, where both `min` and `max` are inclusive.
///
/// Used for dirty regions in texel and vertex space, as well as for hole bounds.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TexelRect {
    pub min: IVec2,
    pub max: IVec2,
}

impl TexelRect {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            min: IVec2::new(x1, y1),
            max: IVec2::new(x2, y2),
        }
    }

    pub fn from_point(point: IVec2) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// The rectangle covering a whole `size` x `size` grid.
    pub fn square(size: u32) -> Self {
        Self::new(0, 0, size as i32 - 1, size as i32 - 1)
    }

    pub fn width(&self) -> u32 {
        (self.max.x - self.min.x + 1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.max.y - self.min.y + 1).max(0) as u32
    }

    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y
    }

    pub fn contains(&self, point: IVec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let rect = Self {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        };

        rect.is_valid().then_some(rect)
    }

    pub fn expand(&self, amount: i32) -> Self {
        Self {
            min: self.min - amount,
            max: self.max + amount,
        }
    }

    /// Clamps the rectangle into a `size` x `size` grid.
    pub fn clamp_to(&self, size: u32) -> Option<Self> {
        self.intersect(&Self::square(size))
    }

    pub fn offset(&self, offset: IVec2) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Iterates over all points row by row.
    pub fn iter(&self) -> impl Iterator<Item = UVec2> {
        let min = self.min.max(IVec2::ZERO);
        let max = self.max;

        iproduct!(min.y..=max.y, min.x..=max.x).map(|(y, x)| UVec2::new(x as u32, y as u32))
    }
}

/// Merges an optional rectangle with another one.
pub(crate) fn merge(rect: &mut Option<TexelRect>, other: TexelRect) {
    *rect = Some(match rect {
        Some(rect) => rect.union(&other),
        None => other,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_of_disjoint_rects_is_none() {
        let a = TexelRect::new(0, 0, 3, 3);
        let b = TexelRect::new(4, 0, 6, 3);

        assert_eq!(a.intersect(&b), None);
        assert_eq!(a.union(&b), TexelRect::new(0, 0, 6, 3));
    }

    #[test]
    fn single_texel_rect_is_valid() {
        let rect = TexelRect::from_point(IVec2::new(3, 3));

        assert!(rect.is_valid());
        assert_eq!(rect.area(), 1);
        assert_eq!(rect.iter().collect::<Vec<_>>(), vec![UVec2::new(3, 3)]);
    }

    #[test]
    fn clamp_drops_outside_parts() {
        let rect = TexelRect::new(-2, 5, 3, 12).clamp_to(8).unwrap();

        assert_eq!(rect, TexelRect::new(0, 5, 3, 7));
        assert_eq!(TexelRect::new(9, 9, 10, 10).clamp_to(8), None);
    }
}
