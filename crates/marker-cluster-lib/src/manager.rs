//! Public facade over the algorithm handle, trigger policy and recompute coordinator

use crate::runtime::resolve_handle;
use crate::{
    Algorithm, AlgorithmHandle, CameraPosition, CameraSource, ClusterEndedListener,
    ClusterError, ClusterItem, ClusterRenderer, Config, RecomputeCoordinator, Result,
    ScreenBasedAlgorithm, ScreenBasedAlgorithmAdapter, TriggerPolicy, default_algorithm,
};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Keeps the clusters of a set of items in sync with a map camera
///
/// Item edits do not recompute by themselves; batch them and call
/// [`ClusterManager::cluster`]. Camera-idle events and algorithm swaps recompute
/// automatically. Every failure inside the algorithm is logged and swallowed, leaving
/// the last delivered clusters in place.
pub struct ClusterManager<T: ClusterItem> {
    handle: Arc<AlgorithmHandle<T>>,
    trigger: TriggerPolicy,
    coordinator: RecomputeCoordinator<T>,
    camera: Arc<dyn CameraSource>,
    config: Config,
}

impl<T: ClusterItem> std::fmt::Debug for ClusterManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterManager")
            .field("config", &self.config)
            .field("trigger", &self.trigger)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<T: ClusterItem> ClusterManager<T> {
    /// Start building a manager that reads `camera` and delivers to `renderer`
    pub fn builder(
        camera: Arc<dyn CameraSource>,
        renderer: Arc<dyn ClusterRenderer<T>>,
    ) -> ClusterManagerBuilder<T> {
        ClusterManagerBuilder::new(camera, renderer)
    }

    /// Replace the algorithm with a plain one, adapted to the screen-based contract
    pub fn set_algorithm<A: Algorithm<T> + 'static>(&self, algorithm: A) {
        self.set_screen_based_algorithm(Box::new(ScreenBasedAlgorithmAdapter::new(algorithm)));
    }

    /// Replace the algorithm, migrating every item, and recompute
    pub fn set_screen_based_algorithm(&self, algorithm: Box<dyn ScreenBasedAlgorithm<T>>) {
        // A failed swap is logged by the handle and keeps the old algorithm
        let _ = self.handle.swap(algorithm, self.camera.as_ref());
        self.coordinator.request_recompute();
    }

    pub fn add_item(&self, item: T) {
        let _ = self
            .handle
            .mutate("add_item", |algorithm| algorithm.add_item(item));
    }

    pub fn add_items(&self, items: impl IntoIterator<Item = T>) {
        let items: Vec<T> = items.into_iter().collect();
        let _ = self
            .handle
            .mutate("add_items", |algorithm| algorithm.add_items(items));
    }

    pub fn remove_item(&self, item: &T) {
        let _ = self
            .handle
            .mutate("remove_item", |algorithm| algorithm.remove_item(item));
    }

    pub fn clear_items(&self) {
        let _ = self
            .handle
            .mutate("clear_items", |algorithm| algorithm.clear_items());
    }

    /// Force a recompute at the current camera zoom
    pub fn cluster(&self) {
        self.coordinator.request_recompute();
    }

    /// Handle the camera settling at `position`
    ///
    /// The algorithm always sees the new position. A recompute follows if the algorithm
    /// re-clusters on every movement or the zoom changed since the last triggered one.
    /// Returns whether a recompute was requested.
    pub fn on_camera_idle(&self, position: &CameraPosition) -> bool {
        // A failed notification is logged by the handle; the zoom debounce still applies
        let always_recluster = self
            .handle
            .notify_camera_change(position)
            .unwrap_or_else(|_| self.handle.should_recluster());
        if !self.trigger.should_recompute(always_recluster, position) {
            return false;
        }
        tracing::debug!(zoom = position.zoom, always_recluster, "Camera idle triggers recompute");
        self.coordinator.request_recompute();
        true
    }

    /// Run a closure with read-only access to the active algorithm
    pub fn with_algorithm<R>(&self, f: impl FnOnce(&dyn ScreenBasedAlgorithm<T>) -> R) -> R {
        self.handle.with_algorithm(f)
    }

    /// Snapshot of the current items
    pub fn items(&self) -> Vec<T> {
        self.handle.items()
    }

    pub fn item_count(&self) -> usize {
        self.handle.item_count()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Builder for [`ClusterManager`]
pub struct ClusterManagerBuilder<T: ClusterItem> {
    camera: Arc<dyn CameraSource>,
    renderer: Arc<dyn ClusterRenderer<T>>,
    listener: Option<ClusterEndedListener>,
    algorithm: Option<Box<dyn ScreenBasedAlgorithm<T>>>,
    config: Config,
    runtime: Option<Handle>,
    items: Vec<T>,
}

impl<T: ClusterItem> ClusterManagerBuilder<T> {
    pub fn new(camera: Arc<dyn CameraSource>, renderer: Arc<dyn ClusterRenderer<T>>) -> Self {
        Self {
            camera,
            renderer,
            listener: None,
            algorithm: None,
            config: Config::default(),
            runtime: None,
            items: Vec::new(),
        }
    }

    /// Settings used for the default algorithm
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Start with a plain algorithm instead of the default one
    pub fn algorithm<A: Algorithm<T> + 'static>(self, algorithm: A) -> Self {
        self.screen_based_algorithm(Box::new(ScreenBasedAlgorithmAdapter::new(algorithm)))
    }

    /// Start with a screen-based algorithm instead of the default one
    pub fn screen_based_algorithm(mut self, algorithm: Box<dyn ScreenBasedAlgorithm<T>>) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Runtime whose blocking pool runs the recomputes
    ///
    /// Defaults to the runtime `build` is called from.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Callback invoked after each delivered cluster set
    pub fn on_cluster_ended(mut self, listener: impl Fn() + Send + Sync + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn item(mut self, item: T) -> Self {
        self.items.push(item);
        self
    }

    pub fn items(mut self, items: impl IntoIterator<Item = T>) -> Self {
        self.items.extend(items);
        self
    }

    /// Build the manager; initial items are added without triggering a recompute
    pub fn build(self) -> Result<ClusterManager<T>> {
        let runtime = resolve_handle(self.runtime).ok_or(ClusterError::NoRuntime)?;
        let algorithm = self
            .algorithm
            .unwrap_or_else(|| default_algorithm(&self.config));

        let handle = Arc::new(AlgorithmHandle::new(algorithm));
        if !self.items.is_empty() {
            let items = self.items;
            handle.mutate("add_items", |algorithm| algorithm.add_items(items))?;
        }

        let coordinator = RecomputeCoordinator::new(
            Arc::clone(&handle),
            Arc::clone(&self.camera),
            self.renderer,
            self.listener,
            runtime,
        );

        tracing::debug!(items = handle.item_count(), "Cluster manager ready");
        Ok(ClusterManager {
            handle,
            trigger: TriggerPolicy::new(),
            coordinator,
            camera: self.camera,
            config: self.config,
        })
    }
}
