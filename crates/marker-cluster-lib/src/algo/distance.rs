//! Greedy, non-hierarchical distance-based clustering
//!
//! Items are visited in insertion order. Each unvisited item becomes the center of a new
//! cluster that absorbs every item within a square of side `max_distance` screen pixels
//! around it. An item already claimed by an earlier cluster moves to the new one only if
//! the new center is at least as close.

use crate::algo::{Algorithm, DEFAULT_MAX_DISTANCE_AT_ZOOM};
use crate::geometry::{
    LatLng, bounds_around, discrete_zoom, distance_squared, to_world_point,
    world_units_per_pixel,
};
use crate::quadtree::{PointQuadtree, QuadItem};
use crate::{Cluster, ClusterItem, ClusterSet, Result};
use std::collections::{HashMap, HashSet};

/// Distance-based clustering backed by a point quadtree
#[derive(Debug, Clone)]
pub struct NonHierarchicalDistanceBasedAlgorithm<T> {
    /// Maximum clustering distance in screen pixels
    max_distance: u32,
    /// Items in insertion order, with their world points
    items: Vec<QuadItem<T>>,
    /// Membership set used to reject duplicates
    members: HashSet<T>,
    /// Spatial index over the same items
    quadtree: PointQuadtree<T>,
}

impl<T: ClusterItem> Default for NonHierarchicalDistanceBasedAlgorithm<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<T: ClusterItem> NonHierarchicalDistanceBasedAlgorithm<T> {
    /// Create an empty algorithm with the default clustering distance
    pub fn new() -> Self {
        Self::with_max_distance(DEFAULT_MAX_DISTANCE_AT_ZOOM)
    }

    /// Create an empty algorithm with a custom clustering distance (in pixels)
    pub fn with_max_distance(max_distance: u32) -> Self {
        Self {
            max_distance,
            items: Vec::new(),
            members: HashSet::new(),
            quadtree: PointQuadtree::new(),
        }
    }

    /// Spatial index over the held items
    #[inline]
    pub(crate) fn quadtree(&self) -> &PointQuadtree<T> {
        &self.quadtree
    }

    /// Cluster `candidates` at `zoom`
    ///
    /// Only candidates can seed a cluster, but any held item near a seed may join it.
    pub(crate) fn cluster_candidates<'a, I>(&'a self, candidates: I, zoom: i32) -> Vec<Cluster<T>>
    where
        I: IntoIterator<Item = &'a QuadItem<T>>,
    {
        let span = self.max_distance as f64 * world_units_per_pixel(zoom);

        let mut visited: HashSet<&'a T> = HashSet::new();
        // item -> (cluster index, squared distance to that cluster's center)
        let mut assignment: HashMap<&'a T, (usize, f64)> = HashMap::new();
        let mut groups: Vec<(LatLng, Vec<T>)> = Vec::new();

        for candidate in candidates {
            if visited.contains(&candidate.item) {
                continue;
            }

            let hits = self.quadtree.search(bounds_around(candidate.point, span));
            let cluster_index = groups.len();

            if hits.len() <= 1 {
                groups.push((candidate.item.position(), vec![candidate.item.clone()]));
                visited.insert(&candidate.item);
                assignment.insert(&candidate.item, (cluster_index, 0.0));
                continue;
            }

            groups.push((candidate.item.position(), Vec::with_capacity(hits.len())));
            for &hit in &hits {
                let distance = distance_squared(hit.point, candidate.point);
                if let Some(&(previous, existing)) = assignment.get(&hit.item) {
                    if existing < distance {
                        continue;
                    }
                    groups[previous].1.retain(|member| *member != hit.item);
                }
                assignment.insert(&hit.item, (cluster_index, distance));
                groups[cluster_index].1.push(hit.item.clone());
            }
            visited.extend(hits.into_iter().map(|hit| &hit.item));
        }

        groups
            .into_iter()
            .filter(|(_, members)| !members.is_empty())
            .map(|(position, members)| Cluster::new(position, members))
            .collect()
    }
}

impl<T: ClusterItem> Algorithm<T> for NonHierarchicalDistanceBasedAlgorithm<T> {
    fn add_item(&mut self, item: T) -> Result<()> {
        if self.members.contains(&item) {
            return Ok(());
        }
        let point = to_world_point(item.position());
        self.quadtree.insert(item.clone(), point);
        self.members.insert(item.clone());
        self.items.push(QuadItem { item, point });
        Ok(())
    }

    fn add_items(&mut self, items: Vec<T>) -> Result<()> {
        self.items.reserve(items.len());
        for item in items {
            self.add_item(item)?;
        }
        Ok(())
    }

    fn remove_item(&mut self, item: &T) -> Result<()> {
        if !self.members.remove(item) {
            return Ok(());
        }
        // Use the stored point: an equal item may report a different position
        if let Some(index) = self.items.iter().position(|entry| entry.item == *item) {
            let entry = self.items.remove(index);
            self.quadtree.remove(&entry.item, entry.point);
        }
        Ok(())
    }

    fn clear_items(&mut self) -> Result<()> {
        self.items.clear();
        self.members.clear();
        self.quadtree.clear();
        Ok(())
    }

    fn items(&self) -> Vec<T> {
        self.items.iter().map(|entry| entry.item.clone()).collect()
    }

    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn clusters(&self, zoom: f64) -> Result<ClusterSet<T>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("distance::clusters");

        let clusters = self.cluster_candidates(&self.items, discrete_zoom(zoom));
        Ok(ClusterSet::new(zoom, clusters))
    }

    fn max_distance_between_clustered_items(&self) -> u32 {
        self.max_distance
    }

    fn set_max_distance_between_clustered_items(&mut self, max_distance: u32) {
        self.max_distance = max_distance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::tests::TestItem;

    /// A 10x10 grid of items around London, 0.01 degrees apart
    fn grid_items() -> Vec<TestItem> {
        (0..100)
            .map(|i| {
                TestItem::new(
                    i,
                    51.5 + (i / 10) as f64 * 0.01,
                    -0.12 + (i % 10) as f64 * 0.01,
                )
            })
            .collect()
    }

    fn assert_each_item_once(set: &ClusterSet<TestItem>, expected: &[TestItem]) {
        let mut seen: Vec<u32> = set.items().map(|item| item.id).collect();
        seen.sort_unstable();
        let mut wanted: Vec<u32> = expected.iter().map(|item| item.id).collect();
        wanted.sort_unstable();
        assert_eq!(seen, wanted);
    }

    #[test]
    fn test_empty_algorithm() {
        let algorithm = NonHierarchicalDistanceBasedAlgorithm::<TestItem>::new();
        let set = algorithm.clusters(10.0).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.zoom(), 10.0);
    }

    #[test]
    fn test_close_items_cluster_at_low_zoom() {
        let mut algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
        let a = TestItem::new(1, 51.5074, -0.1278);
        let b = TestItem::new(2, 51.5084, -0.1268);
        algorithm.add_items(vec![a, b]).unwrap();

        let set = algorithm.clusters(5.0).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.clusters()[0].size(), 2);
        // The first inserted item is the seed
        assert_eq!(set.clusters()[0].position(), a.position());
    }

    #[test]
    fn test_close_items_split_at_high_zoom() {
        let mut algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
        algorithm
            .add_items(vec![
                TestItem::new(1, 51.5074, -0.1278),
                TestItem::new(2, 51.5084, -0.1268),
            ])
            .unwrap();

        let set = algorithm.clusters(20.0).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.iter().all(|cluster| cluster.size() == 1));
    }

    #[test]
    fn test_far_items_never_cluster() {
        let mut algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
        algorithm
            .add_items(vec![
                TestItem::new(1, 51.5, -0.12),
                TestItem::new(2, 35.68, 139.69),
            ])
            .unwrap();
        assert_eq!(algorithm.clusters(3.0).unwrap().len(), 2);
    }

    #[test]
    fn test_every_item_in_exactly_one_cluster() {
        let mut algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
        let items = grid_items();
        algorithm.add_items(items.clone()).unwrap();

        for zoom in [0.0, 6.0, 10.5, 12.0, 14.0, 18.0] {
            let set = algorithm.clusters(zoom).unwrap();
            assert_eq!(set.item_count(), items.len(), "zoom {zoom}");
            assert_each_item_once(&set, &items);
        }
    }

    #[test]
    fn test_cluster_count_grows_with_zoom() {
        let mut algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
        algorithm.add_items(grid_items()).unwrap();

        let coarse = algorithm.clusters(8.0).unwrap().len();
        let fine = algorithm.clusters(16.0).unwrap().len();
        assert!(coarse < fine, "coarse={coarse} fine={fine}");
        assert_eq!(fine, 100);
    }

    #[test]
    fn test_duplicate_add_is_ignored() {
        let mut algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
        let item = TestItem::new(1, 10.0, 10.0);
        algorithm.add_item(item).unwrap();
        algorithm.add_item(item).unwrap();
        assert_eq!(algorithm.item_count(), 1);
        assert_eq!(algorithm.quadtree().len(), 1);
    }

    #[test]
    fn test_remove_item() {
        let mut algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
        let items = grid_items();
        algorithm.add_items(items.clone()).unwrap();

        algorithm.remove_item(&items[42]).unwrap();
        // Absent items are ignored
        algorithm.remove_item(&items[42]).unwrap();
        algorithm
            .remove_item(&TestItem::new(999, 0.0, 0.0))
            .unwrap();

        assert_eq!(algorithm.item_count(), 99);
        assert_eq!(algorithm.quadtree().len(), 99);
        let set = algorithm.clusters(12.0).unwrap();
        assert!(set.items().all(|item| item.id != 42));
    }

    #[test]
    fn test_clear_items() {
        let mut algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
        algorithm.add_items(grid_items()).unwrap();
        algorithm.clear_items().unwrap();
        assert_eq!(algorithm.item_count(), 0);
        assert!(algorithm.clusters(5.0).unwrap().is_empty());
    }

    #[test]
    fn test_items_preserve_insertion_order() {
        let mut algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
        let items = grid_items();
        algorithm.add_items(items.clone()).unwrap();
        assert_eq!(algorithm.items(), items);
    }

    #[test]
    fn test_max_distance_controls_grouping() {
        let mut algorithm = NonHierarchicalDistanceBasedAlgorithm::with_max_distance(1);
        algorithm.add_items(grid_items()).unwrap();
        let tight = algorithm.clusters(10.0).unwrap().len();

        algorithm.set_max_distance_between_clustered_items(400);
        let loose = algorithm.clusters(10.0).unwrap().len();
        assert!(loose < tight, "loose={loose} tight={tight}");
    }
}
