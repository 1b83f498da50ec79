//! Per-key deduplication of in-flight fetches.
//!
//! The first caller for a key becomes the leader: its fetch future is turned
//! into a shared future that every later caller for the same key joins. The
//! registry only keeps a weak handle, so once every waiter has dropped its
//! handle the underlying fetch is dropped too.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared, WeakShared};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{CacheKey, FetchedImage};
use crate::domain::errors::CoverArtError;

/// Outcome delivered to every waiter of a fetch.
pub type FetchResult = Result<FetchedImage, CoverArtError>;

type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// How a caller got attached to a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchRole {
    /// The caller started the fetch.
    Leader,
    /// The caller joined a fetch that was already in flight.
    Joined,
}

struct InFlightFetch {
    generation: u64,
    waiters: Arc<AtomicUsize>,
    fetch: WeakShared<BoxFuture<'static, FetchResult>>,
}

impl InFlightFetch {
    fn upgrade(&self) -> Option<SharedFetch> {
        self.fetch.upgrade()
    }
}

type Registry = Arc<Mutex<HashMap<CacheKey, InFlightFetch>>>;

/// Guarantees at most one fetch in flight per key.
#[derive(Clone, Default)]
pub struct FetchCoordinator {
    in_flight: Registry,
    next_generation: Arc<AtomicU64>,
}

impl FetchCoordinator {
    /// Creates an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the caller to the fetch for `key`, starting it if needed.
    ///
    /// `fetch_fn` is only invoked when no live fetch exists for the key.
    /// The returned handle must be awaited (via [`FetchHandle::wait`]) to
    /// drive the fetch; dropping it withdraws the caller.
    pub fn join<F, Fut>(&self, key: &CacheKey, fetch_fn: F) -> FetchHandle
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let mut in_flight = self.in_flight.lock();

        if let Some(entry) = in_flight.get(key)
            && let Some(shared) = entry.upgrade()
        {
            let waiters = entry.waiters.fetch_add(1, Ordering::SeqCst) + 1;
            trace!(key = %key, waiters, "Joined in-flight fetch");
            return FetchHandle {
                role: FetchRole::Joined,
                shared,
                _waiter: WaiterGuard(Arc::clone(&entry.waiters)),
            };
        }

        // Entries whose waiters all went away are dead weight.
        in_flight.retain(|_, entry| entry.upgrade().is_some());

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let started_at = Instant::now();
        let registry = Arc::clone(&self.in_flight);
        let owned_key = key.clone();
        let fetch = fetch_fn();

        let shared = async move {
            let result = fetch.await;
            {
                let mut in_flight = registry.lock();
                if in_flight
                    .get(&owned_key)
                    .is_some_and(|entry| entry.generation == generation)
                {
                    in_flight.remove(&owned_key);
                }
            }
            debug!(
                key = %owned_key,
                ok = result.is_ok(),
                elapsed_ms = started_at.elapsed().as_millis(),
                "Fetch resolved"
            );
            result
        }
        .boxed()
        .shared();

        let waiters = Arc::new(AtomicUsize::new(1));
        if let Some(weak) = shared.downgrade() {
            in_flight.insert(
                key.clone(),
                InFlightFetch {
                    generation,
                    waiters: Arc::clone(&waiters),
                    fetch: weak,
                },
            );
        }
        trace!(key = %key, generation, "Started fetch");

        FetchHandle {
            role: FetchRole::Leader,
            shared,
            _waiter: WaiterGuard(waiters),
        }
    }

    /// Convenience wrapper: joins and waits.
    pub async fn fetch<F, Fut>(&self, key: &CacheKey, fetch_fn: F) -> (FetchRole, FetchResult)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult> + Send + 'static,
    {
        let handle = self.join(key, fetch_fn);
        let role = handle.role();
        (role, handle.wait().await)
    }

    /// Returns true if a live fetch exists for the key.
    #[must_use]
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight
            .lock()
            .get(key)
            .is_some_and(|entry| entry.upgrade().is_some())
    }

    /// Number of callers currently attached to the key's fetch.
    #[must_use]
    pub fn waiter_count(&self, key: &CacheKey) -> usize {
        self.in_flight
            .lock()
            .get(key)
            .map_or(0, |entry| entry.waiters.load(Ordering::SeqCst))
    }

    /// Number of live fetches.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .values()
            .filter(|entry| entry.upgrade().is_some())
            .count()
    }
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}

struct WaiterGuard(Arc<AtomicUsize>);

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A caller's attachment to an in-flight fetch.
#[must_use = "a fetch only makes progress while its handle is awaited"]
pub struct FetchHandle {
    role: FetchRole,
    shared: SharedFetch,
    _waiter: WaiterGuard,
}

impl FetchHandle {
    /// Whether this caller started the fetch.
    #[must_use]
    pub const fn role(&self) -> FetchRole {
        self.role
    }

    /// Waits for the fetch to resolve. Every waiter sees the same result.
    pub async fn wait(self) -> FetchResult {
        let Self {
            shared, _waiter, ..
        } = self;
        shared.await
    }
}

impl std::fmt::Debug for FetchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchHandle")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}
