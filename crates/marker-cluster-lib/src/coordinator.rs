//! Cancel-and-restart background recomputes
//!
//! Every request bumps a generation counter and launches a task on the tokio blocking
//! pool. A task delivers its result only if its generation is still the latest one,
//! checked under a delivery lock so the compare and the delivery form one atomic step.
//! Aborting the previous [`JoinHandle`] keeps a not-yet-started task from computing at
//! all; a task already inside the algorithm runs to completion and its result is
//! dropped.

use crate::runtime::{lock_mutex, panic_message, spawn_blocking};
use crate::{AlgorithmHandle, CameraSource, ClusterEndedListener, ClusterItem, ClusterRenderer};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// State shared with the background tasks
struct Shared<T: ClusterItem> {
    handle: Arc<AlgorithmHandle<T>>,
    renderer: Arc<dyn ClusterRenderer<T>>,
    listener: Option<ClusterEndedListener>,
    /// Generation of the latest request
    generation: AtomicU64,
    /// Serializes the "still current" check with the delivery itself
    delivery: Mutex<()>,
}

impl<T: ClusterItem> Shared<T> {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Body of one recompute task
    fn run(&self, generation: u64, zoom: f64) {
        if !self.is_current(generation) {
            tracing::trace!(generation, "Recompute superseded before it started");
            return;
        }

        let clusters = match self.handle.compute_clusters(zoom) {
            Ok(clusters) => clusters,
            Err(e) => {
                tracing::error!(generation, zoom, "Cluster computation failed: {e}");
                return;
            }
        };

        let _delivering = lock_mutex(&self.delivery, "delivery");
        if !self.is_current(generation) {
            tracing::debug!(generation, "Discarding superseded cluster result");
            return;
        }

        tracing::debug!(
            generation,
            zoom,
            clusters = clusters.len(),
            items = clusters.item_count(),
            "Delivering clusters"
        );
        let delivered = catch_unwind(AssertUnwindSafe(|| {
            self.renderer.on_clusters_changed(clusters);
            if let Some(listener) = &self.listener {
                listener();
            }
        }));
        if let Err(payload) = delivered {
            tracing::error!(
                generation,
                "Cluster delivery panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    }
}

/// Runs recomputes off the calling thread and delivers only the latest one
pub struct RecomputeCoordinator<T: ClusterItem> {
    shared: Arc<Shared<T>>,
    camera: Arc<dyn CameraSource>,
    runtime: Handle,
    /// The outstanding task, replaced atomically with the generation bump
    current: Mutex<Option<JoinHandle<()>>>,
}

impl<T: ClusterItem> std::fmt::Debug for RecomputeCoordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecomputeCoordinator")
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

impl<T: ClusterItem> RecomputeCoordinator<T> {
    pub fn new(
        handle: Arc<AlgorithmHandle<T>>,
        camera: Arc<dyn CameraSource>,
        renderer: Arc<dyn ClusterRenderer<T>>,
        listener: Option<ClusterEndedListener>,
        runtime: Handle,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                handle,
                renderer,
                listener,
                generation: AtomicU64::new(0),
                delivery: Mutex::new(()),
            }),
            camera,
            runtime,
            current: Mutex::new(None),
        }
    }

    /// Supersede any outstanding recompute and launch a new one
    ///
    /// The zoom is read from the camera now, not when the task starts. Returns the
    /// generation of the launched task without waiting for it.
    pub fn request_recompute(&self) -> u64 {
        let mut current = lock_mutex(&self.current, "recompute task");
        // Read under the lock so a later generation never carries an older reading
        let zoom = self.camera.camera_position().zoom;
        if let Some(previous) = current.take() {
            previous.abort();
        }
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let shared = Arc::clone(&self.shared);
        *current = Some(spawn_blocking(&self.runtime, move || {
            shared.run(generation, zoom)
        }));

        tracing::trace!(generation, zoom, "Recompute requested");
        generation
    }

    /// Generation of the latest request; `0` before the first one
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Whether `generation` is still the latest request
    pub fn is_current(&self, generation: u64) -> bool {
        self.shared.is_current(generation)
    }

    /// Supersede the outstanding recompute without starting a new one
    pub fn cancel(&self) {
        let mut current = lock_mutex(&self.current, "recompute task");
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(previous) = current.take() {
            previous.abort();
        }
    }
}

impl<T: ClusterItem> Drop for RecomputeCoordinator<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}
