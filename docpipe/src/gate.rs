use std::sync::Arc;

use async_lock::{Semaphore, SemaphoreGuardArc};

/// Bounds the number of processing functions executing simultaneously
/// (spec.md §4.3).
///
/// Built over `async_lock::Semaphore`, the same primitive async-std's own
/// `Mutex`/`RwLock` are built on (async-std no longer re-exports a
/// `Semaphore` of its own; `async-lock` is pulled in transitively by
/// async-std and is the idiomatic place this ecosystem reaches for one).
/// Persistence calls never acquire a permit here: DB connection pools
/// govern their own concurrency independently (spec.md §4.3 rationale).
#[derive(Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
}

/// Held for the duration of one processing-function invocation; releases
/// its slot on drop, including on cancellation or panic (spec.md §5,
/// "the semaphore releases all permits held by cancelled tasks").
pub struct ConcurrencyPermit {
    #[allow(dead_code)]
    guard: SemaphoreGuardArc,
}

impl ConcurrencyGate {
    /// Builds a gate admitting at most `max_concurrency` concurrent processors.
    pub fn new(max_concurrency: usize) -> ConcurrencyGate {
        ConcurrencyGate {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Suspends until a slot is free, then holds it until the returned
    /// permit is dropped.
    pub async fn acquire(&self) -> ConcurrencyPermit {
        let guard = self.semaphore.clone().acquire_arc().await;
        ConcurrencyPermit { guard }
    }
}
