//! Application layer: request orchestration over the domain ports.

/// Cover art services.
pub mod services;

pub use services::{
    CoverArtService, CoverArtServiceConfig, CoverCacheStats, FetchCoordinator, PerformanceEvent,
    PerformanceMonitor, PerformanceStats, RequestOptions,
};
