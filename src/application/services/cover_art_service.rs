//! Cover art acquisition: memory cache, then disk cache, then the network.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::RwLock;
use tokio::sync::{Semaphore, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::fetch_coordinator::{FetchCoordinator, FetchResult, FetchRole};
use super::performance_monitor::{PerformanceEvent, PerformanceMonitor};
use crate::domain::entities::{
    CacheKey, CachedImage, CoverArtKind, DisplayContext, FetchedImage, ImageSource, LoadState,
    LoadStateEvent,
};
use crate::domain::errors::CoverArtError;
use crate::domain::ports::{CoverArtProvider, PersistentStore};
use crate::infrastructure::image::{MemoryBudget, MemoryCoverCache};

/// Default per-index stagger step.
pub const DEFAULT_STAGGER_STEP: Duration = Duration::from_millis(30);
/// Default upper bound for a stagger delay.
pub const DEFAULT_STAGGER_MAX: Duration = Duration::from_millis(600);

/// Tunables for [`CoverArtService`].
#[derive(Debug, Clone)]
pub struct CoverArtServiceConfig {
    /// Memory cache budget.
    pub memory: MemoryBudget,
    /// Maximum concurrent network downloads.
    pub max_concurrent_downloads: usize,
    /// Delay added per stagger index.
    pub stagger_step: Duration,
    /// Largest delay any stagger index gets.
    pub stagger_max: Duration,
    /// Buffered state events per subscriber.
    pub event_capacity: usize,
}

impl Default for CoverArtServiceConfig {
    fn default() -> Self {
        Self {
            memory: MemoryBudget::default(),
            max_concurrent_downloads: 4,
            stagger_step: DEFAULT_STAGGER_STEP,
            stagger_max: DEFAULT_STAGGER_MAX,
            event_capacity: 256,
        }
    }
}

/// Per-request hints.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Position in a batch of keys requested together. Later positions wait
    /// a little longer before going to the network.
    pub stagger_index: Option<usize>,
    /// Cancels this caller's interest in the request.
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    /// Sets the batch position used for the stagger delay.
    #[must_use]
    pub fn with_stagger(mut self, index: usize) -> Self {
        self.stagger_index = Some(index);
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Cache occupancy for the diagnostics view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverCacheStats {
    /// Covers decoded in memory.
    pub memory_count: usize,
    /// Accounted bytes of those covers.
    pub memory_bytes: usize,
    /// Covers stored on disk.
    pub persistent_count: usize,
    /// Encoded bytes stored on disk.
    pub persistent_bytes: u64,
}

impl std::fmt::Display for CoverCacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "memory: {} covers ({} KiB), disk: {} covers ({} KiB)",
            self.memory_count,
            self.memory_bytes / 1024,
            self.persistent_count,
            self.persistent_bytes / 1024,
        )
    }
}

/// State table plus its change feed.
struct LoadStates {
    states: RwLock<HashMap<CacheKey, LoadState>>,
    events: broadcast::Sender<LoadStateEvent>,
}

impl LoadStates {
    fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            states: RwLock::new(HashMap::new()),
            events,
        }
    }

    fn get(&self, key: &CacheKey) -> LoadState {
        self.states.read().get(key).cloned().unwrap_or_default()
    }

    fn subscribe(&self) -> broadcast::Receiver<LoadStateEvent> {
        self.events.subscribe()
    }

    /// Moves a key to `next`, publishing only real changes.
    fn transition(&self, key: &CacheKey, next: LoadState) -> LoadState {
        let mut states = self.states.write();
        let changed = !states
            .get(key)
            .map_or_else(|| next.is_idle(), |current| current.same_as(&next));
        if changed {
            if next.is_idle() {
                states.remove(key);
            } else {
                states.insert(key.clone(), next.clone());
            }
            trace!(key = %key, state = %next, "Load state changed");
            // No subscribers is fine.
            let _ = self.events.send(LoadStateEvent {
                key: key.clone(),
                state: next.clone(),
            });
        }
        next
    }

    /// Marks a key as loading unless a result was already published for it.
    fn begin_loading(&self, key: &CacheKey) {
        let mut states = self.states.write();
        if states
            .get(key)
            .is_some_and(|current| current.is_loading() || current.is_loaded())
        {
            return;
        }
        states.insert(key.clone(), LoadState::Loading);
        trace!(key = %key, state = %LoadState::Loading, "Load state changed");
        let _ = self.events.send(LoadStateEvent {
            key: key.clone(),
            state: LoadState::Loading,
        });
    }

    /// Returns a key to idle if its current state matches.
    fn reset_if(&self, key: &CacheKey, predicate: fn(&LoadState) -> bool) {
        let mut states = self.states.write();
        if states.get(key).is_some_and(predicate) {
            states.remove(key);
            let _ = self.events.send(LoadStateEvent {
                key: key.clone(),
                state: LoadState::Idle,
            });
        }
    }

    /// Returns every loaded key to idle.
    fn reset_loaded(&self) -> usize {
        let mut states = self.states.write();
        let loaded: Vec<CacheKey> = states
            .iter()
            .filter(|(_, state)| state.is_loaded())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &loaded {
            states.remove(key);
            let _ = self.events.send(LoadStateEvent {
                key: key.clone(),
                state: LoadState::Idle,
            });
        }
        loaded.len()
    }
}

enum StaggerOutcome {
    Elapsed,
    Resolved(Arc<CachedImage>),
    Cancelled,
}

struct ServiceInner {
    provider: Arc<dyn CoverArtProvider>,
    memory: MemoryCoverCache,
    disk: Arc<dyn PersistentStore>,
    coordinator: FetchCoordinator,
    monitor: Arc<PerformanceMonitor>,
    states: LoadStates,
    downloads: Semaphore,
    config: CoverArtServiceConfig,
}

/// Serves cover art to the presentation layer.
///
/// Cheap to clone; clones share caches, state and in-flight fetches.
#[derive(Clone)]
pub struct CoverArtService {
    inner: Arc<ServiceInner>,
}

impl CoverArtService {
    /// Creates a service over the given provider and persistent store.
    #[must_use]
    pub fn new(
        provider: Arc<dyn CoverArtProvider>,
        disk: Arc<dyn PersistentStore>,
        monitor: Arc<PerformanceMonitor>,
        config: CoverArtServiceConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                provider,
                memory: MemoryCoverCache::new(config.memory),
                disk,
                coordinator: FetchCoordinator::new(),
                monitor,
                states: LoadStates::new(config.event_capacity),
                downloads: Semaphore::new(config.max_concurrent_downloads.max(1)),
                config,
            }),
        }
    }

    /// Requests the cover for an entity shown in the given context.
    pub async fn request(
        &self,
        entity_id: &str,
        kind: CoverArtKind,
        context: DisplayContext,
    ) -> LoadState {
        self.request_key(
            CacheKey::for_context(entity_id, kind, context),
            RequestOptions::default(),
        )
        .await
    }

    /// Like [`Self::request`], with stagger and cancellation hints.
    pub async fn request_with(
        &self,
        entity_id: &str,
        kind: CoverArtKind,
        context: DisplayContext,
        options: RequestOptions,
    ) -> LoadState {
        self.request_key(CacheKey::for_context(entity_id, kind, context), options)
            .await
    }

    /// Like [`Self::request`], also reporting which tier served the cover.
    pub async fn request_with_source(
        &self,
        entity_id: &str,
        kind: CoverArtKind,
        context: DisplayContext,
    ) -> (LoadState, Option<ImageSource>) {
        self.resolve(
            CacheKey::for_context(entity_id, kind, context),
            RequestOptions::default(),
        )
        .await
    }

    /// Resolves a key to `Loaded` or `Failed`.
    ///
    /// Returns without suspending on a memory hit. A cancelled request
    /// returns whatever state the key is in at that point.
    pub async fn request_key(&self, key: CacheKey, options: RequestOptions) -> LoadState {
        self.resolve(key, options).await.0
    }

    async fn resolve(
        &self,
        key: CacheKey,
        options: RequestOptions,
    ) -> (LoadState, Option<ImageSource>) {
        let inner = &self.inner;

        if let Some(image) = inner.memory.get(&key) {
            trace!(key = %key, "Memory cache hit");
            inner.monitor.record(PerformanceEvent::CacheHit);
            let state = inner.settle_loaded(&key, image);
            return (state, Some(ImageSource::MemoryCache));
        }

        if let Some(image) = inner.load_from_disk(&key).await {
            trace!(key = %key, "Disk cache hit");
            inner.promote(&key, Arc::clone(&image));
            inner.monitor.record(PerformanceEvent::CacheHit);
            let state = inner.settle_loaded(&key, image);
            return (state, Some(ImageSource::DiskCache));
        }

        let cancel = options.cancel.unwrap_or_default();

        if let Some(delay) = inner.stagger_delay(options.stagger_index) {
            match inner.wait_stagger(&key, delay, &cancel).await {
                StaggerOutcome::Elapsed => {}
                StaggerOutcome::Resolved(image) => {
                    inner.monitor.record(PerformanceEvent::CacheHit);
                    let state = inner.settle_loaded(&key, image);
                    return (state, Some(ImageSource::MemoryCache));
                }
                StaggerOutcome::Cancelled => {
                    inner.monitor.record(PerformanceEvent::Cancelled);
                    return (inner.states.get(&key), None);
                }
            }
        }

        if cancel.is_cancelled() {
            inner.monitor.record(PerformanceEvent::Cancelled);
            return (inner.states.get(&key), None);
        }

        let leader = Arc::clone(inner);
        let fetch_key = key.clone();
        let handle = inner
            .coordinator
            .join(&key, move || leader.fetch_from_network(fetch_key));
        let role = handle.role();
        inner.states.begin_loading(&key);

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = handle.wait() => Some(result),
        };

        match result {
            None => {
                inner.monitor.record(PerformanceEvent::Cancelled);
                if inner.coordinator.waiter_count(&key) == 0 {
                    debug!(key = %key, "Last waiter cancelled");
                    inner.states.reset_if(&key, LoadState::is_loading);
                }
                (inner.states.get(&key), None)
            }
            Some(Ok(fetched)) => {
                let event = match (role, fetched.source) {
                    (FetchRole::Joined, _) => PerformanceEvent::DuplicateSuppressed,
                    (FetchRole::Leader, ImageSource::Network) => PerformanceEvent::NetworkFetch,
                    (FetchRole::Leader, _) => PerformanceEvent::CacheHit,
                };
                inner.monitor.record(event);
                let state = inner.settle_loaded(&key, fetched.image);
                (state, Some(fetched.source))
            }
            Some(Err(e)) => {
                debug!(key = %key, error = %e, "Cover art request failed");
                inner.monitor.record(PerformanceEvent::Failed);
                (inner.states.transition(&key, LoadState::Failed(e.kind())), None)
            }
        }
    }

    /// Requests a batch of covers, staggered by position.
    pub async fn request_batch<I, S>(
        &self,
        ids: I,
        kind: CoverArtKind,
        context: DisplayContext,
        cancel: Option<CancellationToken>,
    ) -> Vec<(CacheKey, LoadState)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requests = ids.into_iter().enumerate().map(|(index, id)| {
            let key = CacheKey::for_context(id, kind, context);
            let options = RequestOptions {
                stagger_index: Some(index),
                cancel: cancel.clone(),
            };
            async move {
                let state = self.request_key(key.clone(), options).await;
                (key, state)
            }
        });
        join_all(requests).await
    }

    /// Cached image for a key, if any. Never blocks on I/O.
    #[must_use]
    pub fn current_image(&self, key: &CacheKey) -> Option<Arc<CachedImage>> {
        self.inner
            .memory
            .peek(key)
            .or_else(|| self.inner.states.get(key).image().cloned())
    }

    /// Current state of a key. Never blocks on I/O.
    #[must_use]
    pub fn current_state(&self, key: &CacheKey) -> LoadState {
        self.inner.states.get(key)
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LoadStateEvent> {
        self.inner.states.subscribe()
    }

    /// Occupancy of both cache tiers.
    #[must_use]
    pub fn cache_stats(&self) -> CoverCacheStats {
        let memory = self.inner.memory.stats();
        CoverCacheStats {
            memory_count: memory.count,
            memory_bytes: memory.approx_bytes,
            persistent_count: self.inner.disk.count(),
            persistent_bytes: self.inner.disk.total_bytes(),
        }
    }

    /// Drops every decoded cover. The persistent cache is untouched.
    pub fn clear_memory_cache(&self) {
        let dropped = self.inner.memory.clear().len();
        let reset = self.inner.states.reset_loaded();
        debug!(dropped, reset, "Cleared memory cover cache");
    }

    /// Request counters shared with this service.
    #[must_use]
    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.inner.monitor
    }

    /// Number of network fetches in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.inner.coordinator.in_flight_count()
    }
}

impl std::fmt::Debug for CoverArtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverArtService")
            .field("memory", &self.inner.memory)
            .field("coordinator", &self.inner.coordinator)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl ServiceInner {
    fn stagger_delay(&self, index: Option<usize>) -> Option<Duration> {
        let index = u32::try_from(index?).unwrap_or(u32::MAX);
        let delay = self
            .config
            .stagger_step
            .saturating_mul(index)
            .min(self.config.stagger_max);
        (!delay.is_zero()).then_some(delay)
    }

    /// Waits out a stagger delay unless the key resolves or the caller cancels first.
    async fn wait_stagger(
        &self,
        key: &CacheKey,
        delay: Duration,
        cancel: &CancellationToken,
    ) -> StaggerOutcome {
        let mut events = self.states.subscribe();
        if let Some(image) = self.memory.peek(key) {
            return StaggerOutcome::Resolved(image);
        }

        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        let mut open = true;

        loop {
            tokio::select! {
                () = &mut sleep => return StaggerOutcome::Elapsed,
                () = cancel.cancelled() => return StaggerOutcome::Cancelled,
                event = events.recv(), if open => match event {
                    Ok(LoadStateEvent { key: changed, state: LoadState::Loaded(image) })
                        if changed == *key =>
                    {
                        return StaggerOutcome::Resolved(image);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        trace!(skipped, "State feed lagged during stagger");
                        if let Some(image) = self.memory.peek(key) {
                            return StaggerOutcome::Resolved(image);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => open = false,
                },
            }
        }
    }

    /// Reads and decodes a disk entry. Every failure reads as a miss.
    async fn load_from_disk(&self, key: &CacheKey) -> Option<Arc<CachedImage>> {
        let disk = Arc::clone(&self.disk);
        let lookup = key.clone();
        let bytes = match tokio::task::spawn_blocking(move || disk.get(&lookup)).await {
            Ok(Ok(Some(bytes))) => bytes,
            Ok(Ok(None)) => return None,
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Disk cache read failed, falling back to network");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Disk cache read task failed");
                return None;
            }
        };

        match tokio::task::spawn_blocking(move || CachedImage::decode(&bytes)).await {
            Ok(Ok(image)) => Some(Arc::new(image)),
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Dropping corrupt disk cache entry");
                let disk = Arc::clone(&self.disk);
                let corrupt = key.clone();
                if let Ok(Err(e)) =
                    tokio::task::spawn_blocking(move || disk.remove(&corrupt)).await
                {
                    warn!(key = %key, error = %e, "Failed to remove corrupt entry");
                }
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Decode task failed");
                None
            }
        }
    }

    /// Stores a cover in memory; keys pushed out go back to idle.
    fn promote(&self, key: &CacheKey, image: Arc<CachedImage>) {
        for evicted in self.memory.put(key.clone(), image) {
            self.states.reset_if(&evicted, LoadState::is_loaded);
        }
    }

    /// Publishes `Loaded` for a key. If the key was evicted from memory
    /// before the state landed, the key goes straight back to idle.
    fn settle_loaded(&self, key: &CacheKey, image: Arc<CachedImage>) -> LoadState {
        let cacheable = self.memory.admits(&image);
        let state = self.states.transition(key, LoadState::Loaded(image));
        if cacheable && self.memory.peek(key).is_none() {
            trace!(key = %key, "Evicted before load settled");
            self.states.reset_if(key, LoadState::is_loaded);
        }
        state
    }

    /// Downloads, decodes and stores one cover. Runs once per in-flight key.
    async fn fetch_from_network(self: Arc<Self>, key: CacheKey) -> FetchResult {
        if let Some(image) = self.memory.peek(&key) {
            return Ok(FetchedImage {
                image,
                source: ImageSource::MemoryCache,
            });
        }

        let permit = self
            .downloads
            .acquire()
            .await
            .map_err(|_| CoverArtError::network("Download queue closed"))?;
        debug!(key = %key, "Downloading cover art");
        let bytes = self
            .provider
            .fetch_image_bytes(key.entity_id(), key.kind(), key.size())
            .await?;
        drop(permit);

        let encoded = bytes.clone();
        let image = tokio::task::spawn_blocking(move || CachedImage::decode(&encoded))
            .await
            .map_err(|e| CoverArtError::decode(format!("Decode task failed: {e}")))??;
        let image = Arc::new(image);

        let disk = Arc::clone(&self.disk);
        let store_key = key.clone();
        match tokio::task::spawn_blocking(move || disk.put(&store_key, &bytes)).await {
            Ok(Ok(())) => trace!(key = %key, "Stored cover on disk"),
            Ok(Err(e)) => warn!(key = %key, error = %e, "Failed to cache cover on disk"),
            Err(e) => warn!(key = %key, error = %e, "Disk write task failed"),
        }

        self.promote(&key, Arc::clone(&image));

        Ok(FetchedImage {
            image,
            source: ImageSource::Network,
        })
    }
}
