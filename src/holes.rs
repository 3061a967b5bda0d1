//! Connected hole regions of a visibility mask.

use crate::region::{merge, TexelRect};
use bevy::math::IVec2;
use itertools::iproduct;
use ndarray::{Array2, ArrayView2};
use std::collections::BTreeMap;

/// Visibility weights at or above this value mark a hole.
pub const DEFAULT_HOLE_THRESHOLD: u8 = 170;

/// Labels the 4-connected hole regions of a visibility mask.
#[derive(Copy, Clone, Debug)]
pub struct HoleSegmenter {
    threshold: u8,
}

impl Default for HoleSegmenter {
    fn default() -> Self {
        Self::new(DEFAULT_HOLE_THRESHOLD)
    }
}

impl HoleSegmenter {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }

    pub fn is_hole(&self, value: u8) -> bool {
        value >= self.threshold
    }

    /// Returns the inclusive bounds of every connected hole region of `mask` (indexed `[[y, x]]`),
    /// ordered by the first texel of each region in row major order.
    pub fn segment(&self, mask: ArrayView2<u8>) -> Vec<TexelRect> {
        let (height, width) = mask.dim();
        let mut labels = Array2::<u32>::zeros((height, width));
        let mut equivalence = EquivalenceTable::default();

        for (y, x) in iproduct!(0..height, 0..width) {
            if !self.is_hole(mask[[y, x]]) {
                continue;
            }

            let left = if x > 0 { labels[[y, x - 1]] } else { 0 };
            let up = if y > 0 { labels[[y - 1, x]] } else { 0 };

            labels[[y, x]] = match (left, up) {
                (0, 0) => equivalence.insert(),
                (label, 0) | (0, label) => label,
                (left, up) => equivalence.union(left, up),
            };
        }

        let mut bounds: BTreeMap<u32, Option<TexelRect>> = BTreeMap::new();

        for ((y, x), &label) in labels.indexed_iter() {
            if label == 0 {
                continue;
            }

            let point = IVec2::new(x as i32, y as i32);
            merge(
                bounds.entry(equivalence.find(label)).or_default(),
                TexelRect::from_point(point),
            );
        }

        bounds.into_values().flatten().collect()
    }
}

/// Union-find over provisional labels. Label 0 is the background.
struct EquivalenceTable {
    parents: Vec<u32>,
}

impl Default for EquivalenceTable {
    fn default() -> Self {
        Self { parents: vec![0] }
    }
}

impl EquivalenceTable {
    fn insert(&mut self) -> u32 {
        let label = self.parents.len() as u32;
        self.parents.push(label);
        label
    }

    fn find(&mut self, label: u32) -> u32 {
        let mut root = label;
        while self.parents[root as usize] != root {
            root = self.parents[root as usize];
        }

        let mut current = label;
        while self.parents[current as usize] != root {
            let next = self.parents[current as usize];
            self.parents[current as usize] = root;
            current = next;
        }

        root
    }

    /// Merges two labels, the smaller root wins.
    fn union(&mut self, a: u32, b: u32) -> u32 {
        let (a, b) = (self.find(a), self.find(b));
        let (root, child) = (a.min(b), a.max(b));
        self.parents[child as usize] = root;
        root
    }
}

#[inline]
pub fn align_vertex_down(vertex: i32, lod: u32) -> i32 {
    (vertex >> lod) << lod
}

#[inline]
pub fn align_vertex_up(vertex: i32, lod: u32) -> i32 {
    let step = 1 << lod;
    ((vertex + step - 1) >> lod) << lod
}

/// Grows hole bounds by the footprint of a vertex at `lod` and snaps them to the vertices of
/// that lod, clamped to a grid of `size` vertices.
pub fn expand_bounds_for_lod(bounds: TexelRect, lod: u32, size: u32) -> TexelRect {
    let expanded = bounds.expand((2 << lod) - 1);
    let max = size as i32 - 1;

    TexelRect::new(
        align_vertex_down(expanded.min.x, lod).clamp(0, max),
        align_vertex_down(expanded.min.y, lod).clamp(0, max),
        align_vertex_up(expanded.max.x, lod).clamp(0, max),
        align_vertex_up(expanded.max.y, lod).clamp(0, max),
    )
}

/// For every vertex of a `size` x `size` grid (indexed `[[y, x]]`), the first lod at which the
/// vertex lies inside the expanded bounds of a hole, or `num_lods` if no hole is close.
pub fn hole_lod_table(bounds: &[TexelRect], size: u32, num_lods: u32) -> Array2<u8> {
    let mut table = Array2::from_elem((size as usize, size as usize), num_lods as u8);

    for lod in (0..num_lods).rev() {
        for &hole in bounds {
            for vertex in expand_bounds_for_lod(hole, lod, size).iter() {
                table[[vertex.y as usize, vertex.x as usize]] = lod as u8;
            }
        }
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(size: usize, holes: &[TexelRect]) -> Array2<u8> {
        Array2::from_shape_fn((size, size), |(y, x)| {
            let point = IVec2::new(x as i32, y as i32);
            if holes.iter().any(|hole| hole.contains(point)) {
                255
            } else {
                0
            }
        })
    }

    #[test]
    fn single_rectangular_hole() {
        let hole = TexelRect::new(2, 3, 5, 4);
        let bounds = HoleSegmenter::default().segment(mask(8, &[hole]).view());

        assert_eq!(bounds, vec![hole]);
    }

    #[test]
    fn u_shape_is_one_region() {
        // The arms are only connected through the bottom row, so the labels of both arms have
        // to be merged in the equivalence table.
        let holes = [
            TexelRect::new(1, 1, 1, 5),
            TexelRect::new(5, 1, 5, 5),
            TexelRect::new(1, 5, 5, 5),
        ];
        let bounds = HoleSegmenter::default().segment(mask(8, &holes).view());

        assert_eq!(bounds, vec![TexelRect::new(1, 1, 5, 5)]);
    }

    #[test]
    fn diagonal_neighbours_are_separate_regions() {
        let holes = [TexelRect::new(1, 1, 1, 1), TexelRect::new(2, 2, 2, 2)];
        let bounds = HoleSegmenter::default().segment(mask(4, &holes).view());

        assert_eq!(bounds, holes.to_vec());
    }

    #[test]
    fn threshold_is_inclusive() {
        let mut values = Array2::<u8>::zeros((4, 4));
        values[[0, 0]] = 170;
        values[[3, 3]] = 169;

        let bounds = HoleSegmenter::new(170).segment(values.view());

        assert_eq!(bounds, vec![TexelRect::new(0, 0, 0, 0)]);
    }

    #[test]
    fn bounds_expand_to_lod_vertices() {
        let hole = TexelRect::new(9, 9, 10, 10);

        assert_eq!(align_vertex_down(7, 2), 4);
        assert_eq!(align_vertex_up(7, 2), 8);
        assert_eq!(align_vertex_up(8, 2), 8);

        assert_eq!(expand_bounds_for_lod(hole, 0, 16), TexelRect::new(8, 8, 11, 11));
        assert_eq!(expand_bounds_for_lod(hole, 1, 16), TexelRect::new(6, 6, 14, 14));
        assert_eq!(expand_bounds_for_lod(hole, 2, 16), TexelRect::new(0, 0, 15, 15));
    }

    #[test]
    fn lod_table_is_monotonic_around_holes() {
        let hole = TexelRect::new(9, 9, 10, 10);
        let table = hole_lod_table(&[hole], 16, 3);

        assert_eq!(table[[9, 9]], 0);
        assert_eq!(table[[7, 7]], 1);
        assert_eq!(table[[0, 0]], 2);

        let table = hole_lod_table(&[hole], 16, 2);
        assert_eq!(table[[0, 0]], 2);
    }
}
