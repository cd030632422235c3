//! Background execution and lock helpers
//!
//! Recomputes run on the tokio blocking pool because algorithm compute calls are
//! synchronous and cannot be preempted. The lock helpers recover from poisoned std
//! locks instead of propagating the poison: the guarded values are only ever mutated
//! inside `catch_unwind`, so a poisoned lock still guards a consistent value.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Resolve the runtime to spawn recomputes on
///
/// Uses `explicit` if given, otherwise the runtime the caller is running inside.
pub fn resolve_handle(explicit: Option<Handle>) -> Option<Handle> {
    explicit.or_else(|| Handle::try_current().ok())
}

/// Run a synchronous job on the blocking pool of `handle`
pub fn spawn_blocking<F, R>(handle: &Handle, job: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    // Wrap the job in a profiling scope so recomputes are easy to identify in traces.
    // When profiling is disabled this is a no-op.
    #[cfg(feature = "profiling")]
    {
        handle.spawn_blocking(move || {
            profiling::scope!("runtime::spawn_blocking");
            job()
        })
    }
    #[cfg(not(feature = "profiling"))]
    {
        handle.spawn_blocking(job)
    }
}

/// Acquire a shared lock, recovering from poison
pub fn read_lock<'a, T: ?Sized>(lock: &'a RwLock<T>, name: &str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        tracing::warn!("{name} lock poisoned on read; recovering");
        poisoned.into_inner()
    })
}

/// Acquire an exclusive lock, recovering from poison
pub fn write_lock<'a, T: ?Sized>(lock: &'a RwLock<T>, name: &str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        tracing::warn!("{name} lock poisoned on write; recovering");
        poisoned.into_inner()
    })
}

/// Acquire a mutex, recovering from poison
pub fn lock_mutex<'a, T: ?Sized>(mutex: &'a Mutex<T>, name: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("{name} mutex poisoned; recovering");
        poisoned.into_inner()
    })
}

/// Extract a readable message from a caught panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
