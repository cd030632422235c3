//! Pluggable clustering algorithms
//!
//! The recompute core only talks to algorithms through [`Algorithm`] and its
//! screen-aware extension [`ScreenBasedAlgorithm`]. Plain algorithms are lifted into the
//! screen-aware contract by [`ScreenBasedAlgorithmAdapter`], which asks to be
//! re-clustered on every camera movement.

mod distance;
mod precache;
mod view_based;

pub use distance::NonHierarchicalDistanceBasedAlgorithm;
pub use precache::PreCachingAlgorithmDecorator;
pub use view_based::NonHierarchicalViewBasedAlgorithm;

use crate::{CameraPosition, ClusterItem, ClusterSet, Config, Result};

/// Default maximum distance between clustered items, in screen pixels
pub const DEFAULT_MAX_DISTANCE_AT_ZOOM: u32 = 100;

/// Capability set every clustering algorithm provides
///
/// Mutations take `&mut self` and are serialized by the owner; [`Algorithm::clusters`]
/// takes `&self` and may run concurrently with other reads.
pub trait Algorithm<T: ClusterItem>: Send + Sync {
    /// Add one item; adding an item that is already present is a no-op
    fn add_item(&mut self, item: T) -> Result<()>;

    /// Add many items
    fn add_items(&mut self, items: Vec<T>) -> Result<()> {
        for item in items {
            self.add_item(item)?;
        }
        Ok(())
    }

    /// Remove one item; removing an absent item is a no-op
    fn remove_item(&mut self, item: &T) -> Result<()>;

    /// Remove every item
    fn clear_items(&mut self) -> Result<()>;

    /// Snapshot of all held items
    fn items(&self) -> Vec<T>;

    /// Number of held items
    fn item_count(&self) -> usize {
        self.items().len()
    }

    /// Compute the clusters for `zoom`
    fn clusters(&self, zoom: f64) -> Result<ClusterSet<T>>;

    /// Maximum distance, in screen pixels, between items grouped together
    fn max_distance_between_clustered_items(&self) -> u32;

    fn set_max_distance_between_clustered_items(&mut self, max_distance: u32);
}

/// An algorithm that also depends on what the camera shows
pub trait ScreenBasedAlgorithm<T: ClusterItem>: Algorithm<T> {
    /// Whether every camera movement (not only zoom changes) needs a recompute
    fn should_recluster_on_map_movement(&self) -> bool;

    /// Observe a settled camera position
    fn on_camera_change(&mut self, position: &CameraPosition);
}

/// Lifts a plain [`Algorithm`] into a [`ScreenBasedAlgorithm`]
///
/// The wrapped algorithm ignores the camera, so the adapter cannot know whether a pan
/// exposes clusters it never computed; it therefore asks for a recompute on every
/// camera movement.
#[derive(Debug)]
pub struct ScreenBasedAlgorithmAdapter<A> {
    algorithm: A,
}

impl<A> ScreenBasedAlgorithmAdapter<A> {
    pub fn new(algorithm: A) -> Self {
        Self { algorithm }
    }

    /// The wrapped algorithm
    pub fn inner(&self) -> &A {
        &self.algorithm
    }

    pub fn into_inner(self) -> A {
        self.algorithm
    }
}

impl<T: ClusterItem, A: Algorithm<T>> Algorithm<T> for ScreenBasedAlgorithmAdapter<A> {
    fn add_item(&mut self, item: T) -> Result<()> {
        self.algorithm.add_item(item)
    }

    fn add_items(&mut self, items: Vec<T>) -> Result<()> {
        self.algorithm.add_items(items)
    }

    fn remove_item(&mut self, item: &T) -> Result<()> {
        self.algorithm.remove_item(item)
    }

    fn clear_items(&mut self) -> Result<()> {
        self.algorithm.clear_items()
    }

    fn items(&self) -> Vec<T> {
        self.algorithm.items()
    }

    fn item_count(&self) -> usize {
        self.algorithm.item_count()
    }

    fn clusters(&self, zoom: f64) -> Result<ClusterSet<T>> {
        self.algorithm.clusters(zoom)
    }

    fn max_distance_between_clustered_items(&self) -> u32 {
        self.algorithm.max_distance_between_clustered_items()
    }

    fn set_max_distance_between_clustered_items(&mut self, max_distance: u32) {
        self.algorithm
            .set_max_distance_between_clustered_items(max_distance);
    }
}

impl<T: ClusterItem, A: Algorithm<T>> ScreenBasedAlgorithm<T> for ScreenBasedAlgorithmAdapter<A> {
    fn should_recluster_on_map_movement(&self) -> bool {
        true
    }

    fn on_camera_change(&mut self, _position: &CameraPosition) {}
}

/// The algorithm a fresh coordinator starts with
///
/// A distance-based algorithm behind a per-zoom cache, adapted to the screen-based
/// contract.
pub fn default_algorithm<T: ClusterItem>(config: &Config) -> Box<dyn ScreenBasedAlgorithm<T>> {
    let distance = NonHierarchicalDistanceBasedAlgorithm::with_max_distance(
        config.max_distance_between_clustered_items,
    );
    Box::new(ScreenBasedAlgorithmAdapter::new(
        PreCachingAlgorithmDecorator::with_capacity(distance, config.precache_capacity),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::tests::TestItem;

    #[test]
    fn test_adapter_always_reclusters() {
        let adapter = ScreenBasedAlgorithmAdapter::new(
            NonHierarchicalDistanceBasedAlgorithm::<TestItem>::new(),
        );
        assert!(adapter.should_recluster_on_map_movement());
    }

    #[test]
    fn test_adapter_forwards_mutations() {
        let mut adapter = ScreenBasedAlgorithmAdapter::new(
            NonHierarchicalDistanceBasedAlgorithm::<TestItem>::new(),
        );
        adapter
            .add_items(vec![TestItem::new(1, 0.0, 0.0), TestItem::new(2, 1.0, 1.0)])
            .unwrap();
        adapter.remove_item(&TestItem::new(1, 0.0, 0.0)).unwrap();
        assert_eq!(adapter.item_count(), 1);
        assert_eq!(adapter.inner().item_count(), 1);

        adapter.set_max_distance_between_clustered_items(42);
        assert_eq!(adapter.max_distance_between_clustered_items(), 42);

        adapter.clear_items().unwrap();
        assert!(adapter.into_inner().items().is_empty());
    }

    #[test]
    fn test_default_algorithm_uses_config() {
        let config = Config {
            max_distance_between_clustered_items: 60,
            ..Config::default()
        };
        let algorithm = default_algorithm::<TestItem>(&config);
        assert!(algorithm.should_recluster_on_map_movement());
        assert_eq!(algorithm.max_distance_between_clustered_items(), 60);
    }
}
