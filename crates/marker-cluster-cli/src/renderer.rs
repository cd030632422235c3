//! Headless stand-ins for the map widget

use marker_cluster_lib::{CameraPosition, CameraSource, ClusterRenderer, ClusterSet, WaypointItem};
use std::sync::Mutex;

/// What the last delivered cluster set looked like
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeliverySummary {
    pub zoom: f64,
    pub clusters: usize,
    pub items: usize,
    pub largest: usize,
}

impl DeliverySummary {
    fn of(set: &ClusterSet<WaypointItem>) -> Self {
        Self {
            zoom: set.zoom(),
            clusters: set.len(),
            items: set.item_count(),
            largest: set.iter().map(|cluster| cluster.size()).max().unwrap_or(0),
        }
    }
}

/// Renderer that logs each delivery instead of painting it
#[derive(Debug, Default)]
pub struct LoggingRenderer {
    deliveries: Mutex<Vec<DeliverySummary>>,
}

impl LoggingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delivery so far, oldest first
    pub fn deliveries(&self) -> Vec<DeliverySummary> {
        match self.deliveries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ClusterRenderer<WaypointItem> for LoggingRenderer {
    fn on_clusters_changed(&self, clusters: ClusterSet<WaypointItem>) {
        let summary = DeliverySummary::of(&clusters);
        tracing::info!(
            zoom = summary.zoom,
            clusters = summary.clusters,
            items = summary.items,
            largest = summary.largest,
            "Clusters changed"
        );
        match self.deliveries.lock() {
            Ok(mut guard) => guard.push(summary),
            Err(poisoned) => {
                tracing::warn!("Renderer mutex poisoned; recovering");
                poisoned.into_inner().push(summary);
            }
        }
    }
}

/// Camera moved by the replay loop
#[derive(Debug)]
pub struct SimulatedCamera {
    position: Mutex<CameraPosition>,
}

impl SimulatedCamera {
    pub fn new(position: CameraPosition) -> Self {
        Self {
            position: Mutex::new(position),
        }
    }

    pub fn move_to(&self, position: CameraPosition) {
        match self.position.lock() {
            Ok(mut guard) => *guard = position,
            Err(poisoned) => *poisoned.into_inner() = position,
        }
    }
}

impl CameraSource for SimulatedCamera {
    fn camera_position(&self) -> CameraPosition {
        match self.position.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
