mod logging;
mod renderer;
mod settings;

use clap::Parser;
use geo::Point;
use marker_cluster_lib::{
    Algorithm, CameraPosition, ClusterError, ClusterManager, NonHierarchicalDistanceBasedAlgorithm,
    NonHierarchicalViewBasedAlgorithm, ScreenBasedAlgorithm, ScreenBasedAlgorithmAdapter,
    WaypointItem, default_algorithm, load_waypoints_from_files,
};
use renderer::{DeliverySummary, LoggingRenderer, SimulatedCamera};
use settings::{AlgorithmKind, Settings};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("Failed to load markers: {0}")]
    Load(#[source] ClusterError),

    #[error("Failed to start the cluster manager: {0}")]
    Manager(#[source] ClusterError),

    #[error("Failed to build the tokio runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Markers spread along a wavy path around `(lat, lon)`
fn synthetic_markers(count: usize, lat: f64, lon: f64) -> Vec<WaypointItem> {
    (0..count)
        .map(|i| {
            let t = i as f64 / count.max(1) as f64;
            WaypointItem {
                id: i as u64,
                name: None,
                position: Point::new(
                    lon + (t * 30.0).cos() * 0.2 + t * 0.1,
                    lat + (t * 50.0).sin() * 0.1 + t * 0.1,
                ),
            }
        })
        .collect()
}

fn load_markers(settings: &Settings) -> Result<Vec<WaypointItem>, CliError> {
    if settings.gpx_files.is_empty() {
        tracing::info!(count = settings.synthetic_items, "Generating synthetic markers");
        return Ok(synthetic_markers(
            settings.synthetic_items,
            settings.center_lat,
            settings.center_lon,
        ));
    }
    load_waypoints_from_files(settings.gpx_files.clone()).map_err(CliError::Load)
}

fn build_algorithm(settings: &Settings) -> Box<dyn ScreenBasedAlgorithm<WaypointItem>> {
    match settings.algorithm {
        AlgorithmKind::Distance => Box::new(ScreenBasedAlgorithmAdapter::new(
            NonHierarchicalDistanceBasedAlgorithm::with_max_distance(settings.max_distance),
        )),
        AlgorithmKind::Precaching => default_algorithm(&settings.config()),
        AlgorithmKind::ViewBased => {
            let mut algorithm =
                NonHierarchicalViewBasedAlgorithm::new(settings.screen_width, settings.screen_height);
            algorithm.set_max_distance_between_clustered_items(settings.max_distance);
            Box::new(algorithm)
        }
    }
}

/// Camera position for step `step` of the replay
fn camera_at(settings: &Settings, step: usize, zoom: f64) -> CameraPosition {
    let offset = if settings.pan { step as f64 * 0.02 } else { 0.0 };
    CameraPosition::new(
        Point::new(settings.center_lon + offset, settings.center_lat + offset),
        zoom,
    )
}

/// Replay the zoom sequence and return every delivery
async fn run(settings: Settings) -> Result<Vec<DeliverySummary>, CliError> {
    let markers = load_markers(&settings)?;
    tracing::info!(markers = markers.len(), algorithm = ?settings.algorithm, "Starting replay");

    let first_zoom = settings.zooms.first().copied().unwrap_or(0.0);
    let camera = Arc::new(SimulatedCamera::new(camera_at(&settings, 0, first_zoom)));
    let renderer = Arc::new(LoggingRenderer::new());
    // Counts completed deliveries
    let (completed_tx, mut completed) = watch::channel(0usize);

    let manager = ClusterManager::<WaypointItem>::builder(camera.clone(), renderer.clone())
        .config(settings.config())
        .screen_based_algorithm(build_algorithm(&settings))
        .items(markers)
        .on_cluster_ended(move || completed_tx.send_modify(|count| *count += 1))
        .build()
        .map_err(CliError::Manager)?;

    let timeout = Duration::from_millis(settings.timeout_ms);
    for (step, &zoom) in settings.zooms.iter().enumerate() {
        let position = camera_at(&settings, step, zoom);
        camera.move_to(position);

        // Late deliveries from earlier steps must not satisfy this step's wait
        completed.borrow_and_update();
        if !manager.on_camera_idle(&position) {
            tracing::info!(step, zoom, "Camera idle did not trigger a recompute");
            continue;
        }

        if tokio::time::timeout(timeout, completed.changed()).await.is_err() {
            tracing::warn!(step, zoom, "No clusters delivered within {} ms", settings.timeout_ms);
        }
    }

    let deliveries = renderer.deliveries();
    match deliveries.last() {
        Some(last) => tracing::info!(
            deliveries = deliveries.len(),
            final_zoom = last.zoom,
            final_clusters = last.clusters,
            items = last.items,
            "Replay finished"
        ),
        None => tracing::info!("Replay finished without any delivered clusters"),
    }
    Ok(deliveries)
}

fn main() -> ExitCode {
    let settings = Settings::parse();
    logging::setup_logging();

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::from)
        .and_then(|runtime| runtime.block_on(run(settings)));

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
