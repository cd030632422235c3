//! Marker Cluster Library - Concurrent Re-clustering of Map Markers
//!
//! This library keeps a derived set of marker clusters up to date while its inputs
//! change from two independent directions: item edits coming from application code and
//! camera movements coming from the map widget. The clustering math is a pluggable
//! [`Algorithm`]; the library's job is the concurrency discipline around it.
//!
//! # Architecture
//!
//! - **[`AlgorithmHandle`]**: the single active algorithm behind a reader/writer lock
//! - **[`TriggerPolicy`]**: decides whether a settled camera warrants a recompute
//! - **[`RecomputeCoordinator`]**: cancel-and-restart background execution that only
//!   ever delivers the most recently requested result
//! - **[`ClusterRenderer`]** / **[`ClusterEndedListener`]**: where finished results go
//! - **[`ClusterManager`]**: the public facade tying the above together
//!
//! # Guarantees
//!
//! - Readers never observe an algorithm mid-mutation
//! - A superseded recompute never reaches the renderer, even if it finishes last
//! - Recomputes run on the tokio blocking pool, never on the calling thread

pub mod algo;
mod config;
mod coordinator;
pub mod geometry;
mod handle;
mod item;
mod manager;
pub mod quadtree;
mod runtime;
mod sink;
mod trigger;
mod waypoint;

// Public API exports
pub use algo::{
    Algorithm, NonHierarchicalDistanceBasedAlgorithm, NonHierarchicalViewBasedAlgorithm,
    PreCachingAlgorithmDecorator, ScreenBasedAlgorithm, ScreenBasedAlgorithmAdapter,
    default_algorithm,
};
pub use config::Config;
pub use coordinator::RecomputeCoordinator;
pub use geometry::{CameraPosition, LatLng};
pub use handle::AlgorithmHandle;
pub use item::{Cluster, ClusterItem, ClusterSet};
pub use manager::{ClusterManager, ClusterManagerBuilder};
pub use sink::{CameraSource, ClusterEndedListener, ClusterRenderer};
pub use trigger::{TriggerPolicy, zoom_changed};
pub use waypoint::{WaypointItem, load_waypoints, load_waypoints_from_files};

/// Error types for the clustering core
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("Algorithm panicked during {operation}: {message}")]
    AlgorithmPanicked {
        operation: &'static str,
        message: String,
    },

    #[error("No tokio runtime available to run background recomputes")]
    NoRuntime,

    #[error("GPX parsing error: {0}")]
    GpxParse(#[from] gpx::errors::GpxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
