use bevy::{
    log::{debug, warn},
    utils::HashMap,
};
use derive_more::derive::{Display, From};

/// Identifies a paint layer of the landscape.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, From, Display)]
#[display("layer#{_0}")]
pub struct LayerHandle(u32);

impl LayerHandle {
    /// The reserved layer, that marks holes in the landscape.
    pub const VISIBILITY: LayerHandle = LayerHandle(0);

    pub fn is_visibility(self) -> bool {
        self == Self::VISIBILITY
    }
}

/// The authored description of a paint layer.
#[derive(Clone, Debug)]
pub struct LayerInfo {
    pub name: String,
    /// The minimum weight (`0..=1`) a layer needs at a vertex to be considered as the
    /// dominant collision layer there.
    pub min_collision_relevance_weight: f32,
}

impl LayerInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_collision_relevance_weight: 0.0,
        }
    }

    pub fn with_min_collision_relevance_weight(mut self, weight: f32) -> Self {
        self.min_collision_relevance_weight = weight.clamp(0.0, 1.0);
        self
    }

    /// The relevance threshold in weight units.
    pub(crate) fn min_collision_weight(&self) -> u8 {
        (self.min_collision_relevance_weight * 255.0).round() as u8
    }
}

pub struct LayerRegistry {
    layers: HashMap<LayerHandle, LayerInfo>,
    next_handle: u32,
}

impl Default for LayerRegistry {
    fn default() -> Self {
        let mut layers = HashMap::default();
        layers.insert(LayerHandle::VISIBILITY, LayerInfo::new("Visibility"));

        Self {
            layers,
            next_handle: 1,
        }
    }
}

impl LayerRegistry {
    pub fn register(&mut self, info: LayerInfo) -> LayerHandle {
        let handle = LayerHandle(self.next_handle);
        self.next_handle += 1;

        debug!("Registered paint layer {} as {handle}.", info.name);
        self.layers.insert(handle, info);

        handle
    }

    /// Removes the info of a layer. Tiles still referencing the layer drop their allocation
    /// the next time they are reallocated.
    /// The reserved visibility layer can't be removed.
    pub fn remove(&mut self, handle: LayerHandle) -> Option<LayerInfo> {
        if handle.is_visibility() {
            warn!("The visibility layer is reserved and can't be removed.");
            return None;
        }

        self.layers.remove(&handle)
    }

    pub fn get(&self, handle: LayerHandle) -> Option<&LayerInfo> {
        self.layers.get(&handle)
    }

    pub fn contains(&self, handle: LayerHandle) -> bool {
        self.layers.contains_key(&handle)
    }

    pub fn find(&self, name: &str) -> Option<LayerHandle> {
        self.layers
            .iter()
            .find(|(_, info)| info.name == name)
            .map(|(&handle, _)| handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (LayerHandle, &LayerInfo)> {
        self.layers.iter().map(|(&handle, info)| (handle, info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_layer_is_reserved() {
        let mut registry = LayerRegistry::default();
        let grass = registry.register(LayerInfo::new("Grass"));

        assert!(registry.remove(LayerHandle::VISIBILITY).is_none());
        assert!(registry.contains(LayerHandle::VISIBILITY));
        assert_eq!(registry.find("Visibility"), Some(LayerHandle::VISIBILITY));

        assert_eq!(registry.remove(grass).map(|info| info.name), Some("Grass".into()));
        assert!(!registry.contains(grass));
    }

    #[test]
    fn relevance_weight_is_clamped() {
        let info = LayerInfo::new("Rock").with_min_collision_relevance_weight(2.0);
        assert_eq!(info.min_collision_weight(), 255);

        let info = LayerInfo::new("Rock").with_min_collision_relevance_weight(0.5);
        assert_eq!(info.min_collision_weight(), 128);
    }
}
