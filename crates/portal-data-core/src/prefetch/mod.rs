//! Route-keyed speculative prefetching.
//!
//! When the user hovers or focuses a link, the `PrefetchPlanner` maps the
//! target pathname to the reads that page will need and warms the cache with
//! them. Prefetches run as detached tasks and never report errors; the worst
//! outcome is a cold cache on arrival.

pub mod planner;

pub use planner::{IssuedPrefetch, PrefetchPlanner, PrefetchRequest, PrefetchRoute};
