//! Client-side data access layer for the administrative portal.
//!
//! Every page-level module reads and writes server state through a single
//! [`DataClient`]. The client owns:
//!
//! - a response cache with per-call TTL and coarse invalidation on writes,
//! - reuse of stale entries when the server answers `304 Not Modified`,
//! - per-route request counters for diagnostics,
//! - a route-keyed [`PrefetchPlanner`] that warms the cache ahead of navigation.
//!
//! Construct one client per application and pass it by reference (or clone it;
//! clones share state) instead of relying on globals.

pub mod api;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod perf;
pub mod prefetch;
pub mod resources;

pub use api::{ApiError, DataClient, RequestOptions};
pub use auth::SessionData;
pub use cache::{CacheEntry, CacheKey, CacheStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClientConfig;
pub use perf::{PerfCounter, RouteCounter};
pub use prefetch::{IssuedPrefetch, PrefetchPlanner, PrefetchRequest};
pub use resources::Resource;
