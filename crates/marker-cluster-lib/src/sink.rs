//! Collaborators the core drives and is driven by

use crate::{CameraPosition, ClusterItem, ClusterSet};
use std::sync::Arc;

/// Receives every delivered cluster set
///
/// Called from a background thread of the recompute pool, at most once per
/// non-superseded recompute. Deliveries are serialized, so an implementation never
/// sees two calls at the same time.
pub trait ClusterRenderer<T: ClusterItem>: Send + Sync {
    fn on_clusters_changed(&self, clusters: ClusterSet<T>);
}

/// Completion callback, invoked right after each delivery
pub type ClusterEndedListener = Arc<dyn Fn() + Send + Sync>;

/// The viewport the manager reads the current camera from
pub trait CameraSource: Send + Sync {
    fn camera_position(&self) -> CameraPosition;
}

impl<T: ClusterItem, F> ClusterRenderer<T> for F
where
    F: Fn(ClusterSet<T>) + Send + Sync,
{
    fn on_clusters_changed(&self, clusters: ClusterSet<T>) {
        self(clusters)
    }
}
