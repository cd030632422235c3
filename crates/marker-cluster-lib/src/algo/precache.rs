//! Per-zoom caching decorator
//!
//! Wraps any [`Algorithm`] and remembers the cluster set of the most recently used
//! discrete zoom levels. After serving a zoom it warms the neighbouring levels on the
//! rayon pool so that zooming in or out by one step is served from memory.

use crate::algo::Algorithm;
use crate::geometry::discrete_zoom;
use crate::runtime::{lock_mutex, panic_message, read_lock, write_lock};
use crate::{ClusterItem, ClusterSet, Result};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, RwLock};

/// Default number of zoom levels kept in the cache
const DEFAULT_CAPACITY: usize = 5;

/// Cached cluster sets plus an epoch bumped on every item mutation
///
/// A background precache only stores its result if the epoch it started from is still
/// current, so a result computed from a pre-mutation snapshot is never cached.
struct ClusterCache<T> {
    epoch: u64,
    entries: LruCache<i32, ClusterSet<T>>,
}

impl<T> ClusterCache<T> {
    fn invalidate(&mut self) {
        self.epoch += 1;
        self.entries.clear();
    }
}

/// Caching wrapper around another algorithm
pub struct PreCachingAlgorithmDecorator<T, A> {
    algorithm: Arc<RwLock<A>>,
    cache: Arc<Mutex<ClusterCache<T>>>,
    precache_neighbors: bool,
}

impl<T, A> std::fmt::Debug for PreCachingAlgorithmDecorator<T, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreCachingAlgorithmDecorator")
            .field("precache_neighbors", &self.precache_neighbors)
            .finish_non_exhaustive()
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<T: ClusterItem, A: Algorithm<T> + 'static> PreCachingAlgorithmDecorator<T, A> {
    /// Wrap `algorithm` with a cache of the default capacity
    pub fn new(algorithm: A) -> Self {
        Self::with_capacity(algorithm, DEFAULT_CAPACITY)
    }

    /// Wrap `algorithm` with a cache of `capacity` zoom levels (at least one)
    pub fn with_capacity(algorithm: A, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            algorithm: Arc::new(RwLock::new(algorithm)),
            cache: Arc::new(Mutex::new(ClusterCache {
                epoch: 0,
                entries: LruCache::new(capacity),
            })),
            precache_neighbors: true,
        }
    }

    /// Disable background warming of neighbouring zoom levels
    pub fn without_neighbor_precaching(mut self) -> Self {
        self.precache_neighbors = false;
        self
    }

    /// Check if a discrete zoom level is currently cached
    pub fn is_cached(&self, zoom: i32) -> bool {
        lock_mutex(&self.cache, "cluster cache")
            .entries
            .contains(&zoom)
    }

    /// Serve a discrete zoom from the cache or compute and store it
    fn cached_or_compute(&self, zoom: i32) -> Result<ClusterSet<T>> {
        if let Some(hit) = lock_mutex(&self.cache, "cluster cache").entries.get(&zoom) {
            tracing::trace!(zoom, "cluster cache hit");
            return Ok(hit.clone());
        }
        compute_and_store(&self.algorithm, &self.cache, zoom)
    }

    /// Warm `zoom` on the rayon pool unless it is already cached
    fn precache(&self, zoom: i32) {
        if zoom < 0 || self.is_cached(zoom) {
            return;
        }
        let algorithm = Arc::clone(&self.algorithm);
        let cache = Arc::clone(&self.cache);
        rayon::spawn(move || {
            // A panic escaping a rayon job aborts the process
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                compute_and_store(&algorithm, &cache, zoom)
            }));
            match outcome {
                Ok(Ok(_)) => tracing::trace!(zoom, "precached neighbouring zoom"),
                Ok(Err(e)) => tracing::debug!(zoom, "precache failed: {e}"),
                Err(payload) => {
                    tracing::warn!(zoom, "precache panicked: {}", panic_message(payload.as_ref()))
                }
            }
        });
    }

    fn mutate<R>(&mut self, f: impl FnOnce(&mut A) -> Result<R>) -> Result<R> {
        let mut algorithm = write_lock(&self.algorithm, "precached algorithm");
        let result = f(&mut algorithm);
        // Invalidate even on error: the mutation may have partially applied
        lock_mutex(&self.cache, "cluster cache").invalidate();
        result
    }
}

/// Compute a discrete zoom under the algorithm's read lock and cache it if still valid
fn compute_and_store<T: ClusterItem, A: Algorithm<T>>(
    algorithm: &RwLock<A>,
    cache: &Mutex<ClusterCache<T>>,
    zoom: i32,
) -> Result<ClusterSet<T>> {
    let algorithm = read_lock(algorithm, "precached algorithm");
    // Mutations need the write lock, so the epoch cannot move while we hold the read lock
    let epoch = lock_mutex(cache, "cluster cache").epoch;
    let clusters = algorithm.clusters(zoom as f64)?;
    drop(algorithm);

    let mut cache = lock_mutex(cache, "cluster cache");
    if cache.epoch == epoch {
        cache.entries.put(zoom, clusters.clone());
    }
    Ok(clusters)
}

impl<T: ClusterItem, A: Algorithm<T> + 'static> Algorithm<T> for PreCachingAlgorithmDecorator<T, A> {
    fn add_item(&mut self, item: T) -> Result<()> {
        self.mutate(|algorithm| algorithm.add_item(item))
    }

    fn add_items(&mut self, items: Vec<T>) -> Result<()> {
        self.mutate(|algorithm| algorithm.add_items(items))
    }

    fn remove_item(&mut self, item: &T) -> Result<()> {
        self.mutate(|algorithm| algorithm.remove_item(item))
    }

    fn clear_items(&mut self) -> Result<()> {
        self.mutate(|algorithm| algorithm.clear_items())
    }

    fn items(&self) -> Vec<T> {
        read_lock(&self.algorithm, "precached algorithm").items()
    }

    fn item_count(&self) -> usize {
        read_lock(&self.algorithm, "precached algorithm").item_count()
    }

    fn clusters(&self, zoom: f64) -> Result<ClusterSet<T>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("precache::clusters");

        let discrete = discrete_zoom(zoom);
        let clusters = self.cached_or_compute(discrete)?;

        if self.precache_neighbors {
            // A finite but huge zoom saturates at the i32 bounds
            for neighbor in [discrete.checked_add(1), discrete.checked_sub(1)].into_iter().flatten() {
                self.precache(neighbor);
            }
        }

        Ok(clusters.with_zoom(zoom))
    }

    fn max_distance_between_clustered_items(&self) -> u32 {
        read_lock(&self.algorithm, "precached algorithm").max_distance_between_clustered_items()
    }

    fn set_max_distance_between_clustered_items(&mut self, max_distance: u32) {
        let _ = self.mutate(|algorithm| {
            algorithm.set_max_distance_between_clustered_items(max_distance);
            Ok(())
        });
    }
}
