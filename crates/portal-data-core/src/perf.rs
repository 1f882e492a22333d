//! Per-route request counters.
//!
//! Pure observability: the dispatcher charges every network attempt to the
//! route the user is currently on. Counters are created lazily and never
//! reset for the lifetime of the owning client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{info, trace};

use crate::clock::Clock;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteCounter {
    pub route: String,
    /// High-resolution timer reading when the route was first charged,
    /// or 0.0 when no timer is available.
    pub started_at_ms: f64,
    pub api_requests: u64,
}

pub struct PerfCounter {
    routes: Mutex<HashMap<String, RouteCounter>>,
    clock: Arc<dyn Clock>,
    verbose: bool,
}

impl PerfCounter {
    pub fn new(clock: Arc<dyn Clock>, verbose: bool) -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            clock,
            verbose,
        }
    }

    fn routes(&self) -> MutexGuard<'_, HashMap<String, RouteCounter>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one request against `route`, returning the running total.
    pub fn record(&self, route: &str) -> u64 {
        let count = {
            let mut routes = self.routes();
            let counter = routes
                .entry(route.to_string())
                .or_insert_with(|| RouteCounter {
                    route: route.to_string(),
                    started_at_ms: self.clock.high_res_ms().unwrap_or(0.0),
                    api_requests: 0,
                });
            counter.api_requests += 1;
            counter.api_requests
        };

        if self.verbose {
            info!(route = route, api_requests = count, "API request recorded");
        } else {
            trace!(route = route, api_requests = count, "API request recorded");
        }
        count
    }

    pub fn get(&self, route: &str) -> Option<RouteCounter> {
        self.routes().get(route).cloned()
    }

    /// Requests charged to `route`, zero if it was never charged.
    pub fn requests_for(&self, route: &str) -> u64 {
        self.get(route).map(|c| c.api_requests).unwrap_or(0)
    }

    pub fn total_requests(&self) -> u64 {
        self.routes().values().map(|c| c.api_requests).sum()
    }

    /// All counters sorted by route.
    pub fn snapshot(&self) -> Vec<RouteCounter> {
        let mut counters: Vec<RouteCounter> = self.routes().values().cloned().collect();
        counters.sort_by(|a, b| a.route.cmp(&b.route));
        counters
    }
}
