//! Clusterable items and the immutable cluster values produced from them

use crate::geometry::LatLng;
use std::hash::Hash;
use std::sync::Arc;

/// An entity that can be grouped into clusters
///
/// Equality and hashing define identity: two equal items are the same marker, so an
/// algorithm holds at most one copy of each.
pub trait ClusterItem: Clone + Eq + Hash + Send + Sync + 'static {
    /// Geographic position of the item
    fn position(&self) -> LatLng;
}

/// A group of items represented by a single position
///
/// Clusters are immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster<T> {
    position: LatLng,
    items: Vec<T>,
}

impl<T: ClusterItem> Cluster<T> {
    /// Create a cluster from its representative position and members
    pub fn new(position: LatLng, items: Vec<T>) -> Self {
        Self { position, items }
    }

    /// Create a cluster holding a single item at the item's own position
    pub fn single(item: T) -> Self {
        Self {
            position: item.position(),
            items: vec![item],
        }
    }

    /// Representative position of the cluster
    #[inline]
    pub fn position(&self) -> LatLng {
        self.position
    }

    /// Items aggregated by this cluster
    #[inline]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of items in the cluster
    #[inline]
    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Check if `item` is a member of this cluster
    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }
}

/// The clusters computed for one zoom level
///
/// Cloning is cheap: the clusters are shared, never copied or mutated.
#[derive(Debug)]
pub struct ClusterSet<T> {
    zoom: f64,
    clusters: Arc<[Cluster<T>]>,
}

impl<T> Clone for ClusterSet<T> {
    fn clone(&self) -> Self {
        Self {
            zoom: self.zoom,
            clusters: Arc::clone(&self.clusters),
        }
    }
}

impl<T: ClusterItem> ClusterSet<T> {
    /// Freeze a list of clusters computed at `zoom`
    pub fn new(zoom: f64, clusters: Vec<Cluster<T>>) -> Self {
        Self {
            zoom,
            clusters: clusters.into(),
        }
    }

    /// An empty result for `zoom`
    pub fn empty(zoom: f64) -> Self {
        Self::new(zoom, Vec::new())
    }

    /// Same clusters, reported for a different (non-truncated) zoom
    pub fn with_zoom(&self, zoom: f64) -> Self {
        Self {
            zoom,
            clusters: Arc::clone(&self.clusters),
        }
    }

    /// Zoom level this set was computed for
    #[inline]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// All clusters in the set
    #[inline]
    pub fn clusters(&self) -> &[Cluster<T>] {
        &self.clusters
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Iterate over the clusters
    pub fn iter(&self) -> std::slice::Iter<'_, Cluster<T>> {
        self.clusters.iter()
    }

    /// Total number of items across all clusters
    pub fn item_count(&self) -> usize {
        self.clusters.iter().map(Cluster::size).sum()
    }

    /// Iterate over every clustered item
    pub fn items(&self) -> impl Iterator<Item = &T> + '_ {
        self.clusters.iter().flat_map(|cluster| cluster.items().iter())
    }

    /// Check if two sets share the same underlying allocation
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.clusters, &other.clusters)
    }
}

impl<'a, T: ClusterItem> IntoIterator for &'a ClusterSet<T> {
    type Item = &'a Cluster<T>;
    type IntoIter = std::slice::Iter<'a, Cluster<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
