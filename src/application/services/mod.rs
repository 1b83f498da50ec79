pub mod cover_art_service;
pub mod fetch_coordinator;
pub mod performance_monitor;

pub use cover_art_service::{
    CoverArtService, CoverArtServiceConfig, CoverCacheStats, DEFAULT_STAGGER_MAX,
    DEFAULT_STAGGER_STEP, RequestOptions,
};
pub use fetch_coordinator::{FetchCoordinator, FetchHandle, FetchResult, FetchRole};
pub use performance_monitor::{PerformanceEvent, PerformanceMonitor, PerformanceStats};
