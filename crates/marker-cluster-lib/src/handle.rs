//! The guarded slot holding the active algorithm
//!
//! Every access goes through a single reader/writer lock: item edits, camera
//! notifications and swaps take it exclusively, cluster computation takes it shared.
//! Each algorithm call runs inside `catch_unwind` while the guard is held, so a
//! misbehaving algorithm surfaces as a [`ClusterError`] and the guard is always
//! released normally.

use crate::runtime::{panic_message, read_lock, write_lock};
use crate::{
    Algorithm, CameraPosition, CameraSource, ClusterError, ClusterItem, ClusterSet, Result,
    ScreenBasedAlgorithm,
};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::RwLock;

/// Name used when reporting lock poisoning
const LOCK_NAME: &str = "algorithm";

/// Owner of the single active [`ScreenBasedAlgorithm`]
pub struct AlgorithmHandle<T: ClusterItem> {
    algorithm: RwLock<Box<dyn ScreenBasedAlgorithm<T>>>,
}

impl<T: ClusterItem> std::fmt::Debug for AlgorithmHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgorithmHandle").finish_non_exhaustive()
    }
}

/// Run an algorithm call, converting a panic into an error
fn contain<R>(operation: &'static str, f: impl FnOnce() -> Result<R>) -> Result<R> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(ClusterError::AlgorithmPanicked {
            operation,
            message: panic_message(payload.as_ref()),
        })
    })
}

impl<T: ClusterItem> AlgorithmHandle<T> {
    /// Take ownership of the initial algorithm
    pub fn new(algorithm: Box<dyn ScreenBasedAlgorithm<T>>) -> Self {
        Self {
            algorithm: RwLock::new(algorithm),
        }
    }

    /// Replace the active algorithm, migrating every item into the replacement
    ///
    /// The migration and installation happen under one exclusive lock, so readers see
    /// either the old algorithm with its items or the new one with the same items. If
    /// the migration fails the old algorithm stays active and the replacement is
    /// dropped. After the lock is released, an algorithm that re-clusters on every
    /// movement is primed with the current camera position.
    pub fn swap(
        &self,
        mut replacement: Box<dyn ScreenBasedAlgorithm<T>>,
        camera: &dyn CameraSource,
    ) -> Result<()> {
        #[cfg(feature = "profiling")]
        profiling::scope!("handle::swap");

        let previous = {
            let mut active = write_lock(&self.algorithm, LOCK_NAME);
            let migrated = contain("swap", || {
                let items = active.items();
                let count = items.len();
                replacement.add_items(items)?;
                Ok(count)
            });
            let count = match migrated {
                Ok(count) => count,
                Err(e) => {
                    tracing::error!("Algorithm swap failed, keeping the previous algorithm: {e}");
                    return Err(e);
                }
            };
            tracing::info!(items = count, "Swapped clustering algorithm");
            std::mem::replace(&mut *active, replacement)
        };
        // The outgoing algorithm may be large; free it outside the lock
        drop(previous);

        let wants_priming = self.with_algorithm(|algorithm| {
            algorithm.should_recluster_on_map_movement()
        });
        if wants_priming {
            self.notify_camera_change(&camera.camera_position())?;
        }
        Ok(())
    }

    /// Apply an item mutation under the exclusive lock
    ///
    /// Failures (including panics) are logged here and returned; the lock is always
    /// released and the algorithm stays installed.
    pub fn mutate<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut dyn ScreenBasedAlgorithm<T>) -> Result<R>,
    ) -> Result<R> {
        let mut active = write_lock(&self.algorithm, LOCK_NAME);
        tracing::trace!(operation, "algorithm write lock acquired");
        let result = contain(operation, || f(active.as_mut()));
        drop(active);

        if let Err(e) = &result {
            tracing::error!(operation, "Algorithm mutation failed: {e}");
        }
        result
    }

    /// Compute clusters for `zoom` under the shared lock
    pub fn compute_clusters(&self, zoom: f64) -> Result<ClusterSet<T>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("handle::compute_clusters");

        let active = read_lock(&self.algorithm, LOCK_NAME);
        tracing::trace!(zoom, "algorithm read lock acquired");
        contain("clusters", || active.clusters(zoom))
    }

    /// Tell the active algorithm the camera settled at `position`
    ///
    /// Returns whether the algorithm wants a recompute on every camera movement.
    pub fn notify_camera_change(&self, position: &CameraPosition) -> Result<bool> {
        let mut active = write_lock(&self.algorithm, LOCK_NAME);
        contain("on_camera_change", || {
            active.on_camera_change(position);
            Ok(active.should_recluster_on_map_movement())
        })
        .inspect_err(|e| tracing::error!("Camera notification failed: {e}"))
    }

    /// Whether the active algorithm re-clusters on every movement
    ///
    /// An algorithm that panics while answering is treated as zoom-driven.
    pub fn should_recluster(&self) -> bool {
        let active = read_lock(&self.algorithm, LOCK_NAME);
        contain("should_recluster_on_map_movement", || {
            Ok(active.should_recluster_on_map_movement())
        })
        .unwrap_or(false)
    }

    /// Run a closure with shared access to the active algorithm
    pub fn with_algorithm<R>(&self, f: impl FnOnce(&dyn ScreenBasedAlgorithm<T>) -> R) -> R {
        let active = read_lock(&self.algorithm, LOCK_NAME);
        f(active.as_ref())
    }

    /// Snapshot of the items held by the active algorithm
    pub fn items(&self) -> Vec<T> {
        self.with_algorithm(|algorithm| algorithm.items())
    }

    /// Number of items held by the active algorithm
    pub fn item_count(&self) -> usize {
        self.with_algorithm(|algorithm| algorithm.item_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::tests::TestItem;
    use crate::{
        NonHierarchicalDistanceBasedAlgorithm, NonHierarchicalViewBasedAlgorithm,
        ScreenBasedAlgorithmAdapter,
    };
    use geo::Point;

    struct FixedCamera(CameraPosition);

    impl CameraSource for FixedCamera {
        fn camera_position(&self) -> CameraPosition {
            self.0
        }
    }

    fn distance_handle() -> AlgorithmHandle<TestItem> {
        AlgorithmHandle::new(Box::new(ScreenBasedAlgorithmAdapter::new(
            NonHierarchicalDistanceBasedAlgorithm::new(),
        )))
    }

    /// Panics on every mutation and every compute
    struct PanickingAlgorithm;

    impl Algorithm<TestItem> for PanickingAlgorithm {
        fn add_item(&mut self, _item: TestItem) -> Result<()> {
            panic!("add_item exploded");
        }
        fn remove_item(&mut self, _item: &TestItem) -> Result<()> {
            Err(ClusterError::Algorithm("cannot remove".to_string()))
        }
        fn clear_items(&mut self) -> Result<()> {
            Ok(())
        }
        fn items(&self) -> Vec<TestItem> {
            Vec::new()
        }
        fn clusters(&self, _zoom: f64) -> Result<ClusterSet<TestItem>> {
            panic!("clusters exploded");
        }
        fn max_distance_between_clustered_items(&self) -> u32 {
            0
        }
        fn set_max_distance_between_clustered_items(&mut self, _max_distance: u32) {}
    }

    #[test]
    fn test_mutate_and_compute() {
        let handle = distance_handle();
        handle
            .mutate("add_items", |algorithm| {
                algorithm.add_items(vec![TestItem::new(1, 0.0, 0.0), TestItem::new(2, 5.0, 5.0)])
            })
            .unwrap();
        assert_eq!(handle.item_count(), 2);

        let set = handle.compute_clusters(12.0).unwrap();
        assert_eq!(set.item_count(), 2);
    }

    #[test]
    fn test_swap_migrates_items() {
        let handle = distance_handle();
        let items: Vec<TestItem> = (0..3).map(|i| TestItem::new(i, i as f64, 0.0)).collect();
        handle
            .mutate("add_items", |algorithm| algorithm.add_items(items.clone()))
            .unwrap();

        let camera = FixedCamera(CameraPosition::default());
        handle
            .swap(
                Box::new(ScreenBasedAlgorithmAdapter::new(
                    NonHierarchicalDistanceBasedAlgorithm::with_max_distance(10),
                )),
                &camera,
            )
            .unwrap();

        let mut held = handle.items();
        held.sort_by_key(|item| item.id);
        assert_eq!(held, items);
        assert_eq!(
            handle.with_algorithm(|algorithm| algorithm.max_distance_between_clustered_items()),
            10
        );
    }

    #[test]
    fn test_swap_primes_screen_based_algorithm() {
        let handle = distance_handle();
        handle
            .mutate("add_item", |algorithm| {
                algorithm.add_item(TestItem::new(1, 51.5, -0.12))
            })
            .unwrap();

        let camera = FixedCamera(CameraPosition::new(Point::new(-0.12, 51.5), 10.0));
        handle
            .swap(Box::new(NonHierarchicalViewBasedAlgorithm::new(800, 600)), &camera)
            .unwrap();

        // Without priming the view-based algorithm would see nothing
        assert_eq!(handle.compute_clusters(10.0).unwrap().item_count(), 1);
    }

    #[test]
    fn test_failed_swap_keeps_previous_algorithm() {
        let handle = distance_handle();
        handle
            .mutate("add_item", |algorithm| algorithm.add_item(TestItem::new(1, 0.0, 0.0)))
            .unwrap();

        let camera = FixedCamera(CameraPosition::default());
        let result = handle.swap(
            Box::new(ScreenBasedAlgorithmAdapter::new(PanickingAlgorithm)),
            &camera,
        );
        assert!(matches!(
            result,
            Err(ClusterError::AlgorithmPanicked { operation: "swap", .. })
        ));
        assert_eq!(handle.item_count(), 1);
        assert!(handle.compute_clusters(3.0).is_ok());
    }

    #[test]
    fn test_panicking_mutation_is_contained() {
        let handle: AlgorithmHandle<TestItem> =
            AlgorithmHandle::new(Box::new(ScreenBasedAlgorithmAdapter::new(PanickingAlgorithm)));

        let result = handle.mutate("add_item", |algorithm| {
            algorithm.add_item(TestItem::new(1, 0.0, 0.0))
        });
        assert!(matches!(
            result,
            Err(ClusterError::AlgorithmPanicked { operation: "add_item", .. })
        ));

        let result = handle.mutate("remove_item", |algorithm| {
            algorithm.remove_item(&TestItem::new(1, 0.0, 0.0))
        });
        assert!(matches!(result, Err(ClusterError::Algorithm(_))));

        // The lock is still usable
        assert!(handle.mutate("clear_items", |algorithm| algorithm.clear_items()).is_ok());
    }

    #[test]
    fn test_panicking_compute_is_contained() {
        let handle: AlgorithmHandle<TestItem> =
            AlgorithmHandle::new(Box::new(ScreenBasedAlgorithmAdapter::new(PanickingAlgorithm)));
        let result = handle.compute_clusters(1.0);
        assert!(matches!(
            result,
            Err(ClusterError::AlgorithmPanicked { operation: "clusters", ref message })
                if message == "clusters exploded"
        ));
        assert_eq!(handle.item_count(), 0);
    }

    #[test]
    fn test_notify_reports_recluster_policy() {
        let handle = distance_handle();
        let always = handle
            .notify_camera_change(&CameraPosition::new(Point::new(0.0, 0.0), 3.0))
            .unwrap();
        assert!(always);
        assert!(handle.should_recluster());

        let view_based = AlgorithmHandle::<TestItem>::new(Box::new(
            NonHierarchicalViewBasedAlgorithm::new(800, 600),
        ));
        assert!(view_based.should_recluster());
    }

    #[test]
    fn test_concurrent_reads_and_writes_stay_consistent() {
        let handle = std::sync::Arc::new(distance_handle());
        let base: Vec<TestItem> = (0..200)
            .map(|i| TestItem::new(i, (i % 20) as f64 * 0.5, (i / 20) as f64 * 0.5))
            .collect();
        handle
            .mutate("add_items", |algorithm| algorithm.add_items(base.clone()))
            .unwrap();

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let handle = std::sync::Arc::clone(&handle);
                std::thread::spawn(move || {
                    for round in 0..50u32 {
                        let item = TestItem::new(10_000 + w * 100 + round, 1.0, 1.0);
                        handle
                            .mutate("add_item", |algorithm| algorithm.add_item(item))
                            .unwrap();
                        handle
                            .mutate("remove_item", |algorithm| algorithm.remove_item(&item))
                            .unwrap();
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|r| {
                let handle = std::sync::Arc::clone(&handle);
                std::thread::spawn(move || {
                    for round in 0..50 {
                        let set = handle.compute_clusters(((r + round) % 12) as f64).unwrap();
                        // Each writer holds at most one extra item between its add and remove
                        let count = set.item_count();
                        assert!((200..=204).contains(&count), "torn read: {count} items");
                        assert_eq!(count, set.items().count());
                    }
                })
            })
            .collect();

        for thread in writers.into_iter().chain(readers) {
            thread.join().unwrap();
        }
        assert_eq!(handle.item_count(), 200);
    }
}
