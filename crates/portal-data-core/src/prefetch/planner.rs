use futures::future::join_all;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::{DataClient, RequestOptions};
use crate::auth::SessionData;
use crate::resources::{
    Resource, ADMIN_EMPLOYEES, ADMIN_ROLES, ANNOUNCEMENTS, DASHBOARD_SUMMARY, EMPLOYEES,
    LOCATIONS, ME, SHIFTS, TIMESHEETS,
};

/// One read to issue ahead of navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchRequest {
    pub url: String,
    pub ttl_ms: u64,
}

/// A route pattern and the endpoint templates it warms.
///
/// Pattern and template segments starting with `:` are parameters; a
/// template parameter is replaced by the pathname segment bound to the
/// same name in the pattern.
#[derive(Debug, Clone)]
pub struct PrefetchRoute {
    pattern: String,
    targets: Vec<(String, u64)>,
    admin_only: bool,
}

impl PrefetchRoute {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: normalize_path(pattern).to_string(),
            targets: Vec::new(),
            admin_only: false,
        }
    }

    pub fn fetch(mut self, template: &str, ttl_ms: u64) -> Self {
        self.targets.push((template.to_string(), ttl_ms));
        self
    }

    pub fn fetch_resource(self, resource: Resource) -> Self {
        self.fetch(resource.collection, resource.ttl_ms)
    }

    /// Only plan this route for sessions with admin capability.
    pub fn admin_only(mut self) -> Self {
        self.admin_only = true;
        self
    }

    /// Parameter bindings when `path` matches this pattern.
    fn bind<'a>(&'a self, path: &'a str) -> Option<Vec<(&'a str, &'a str)>> {
        let pattern: Vec<&str> = segments(&self.pattern).collect();
        let actual: Vec<&str> = segments(path).collect();
        if pattern.len() != actual.len() {
            return None;
        }

        let mut params = Vec::new();
        for (expected, got) in pattern.iter().zip(actual.iter()) {
            match expected.strip_prefix(':') {
                Some(name) => params.push((name, *got)),
                None if expected == got => {}
                None => return None,
            }
        }
        Some(params)
    }
}

/// A prefetch that has been spawned.
#[derive(Debug)]
pub struct IssuedPrefetch {
    pub url: String,
    handle: JoinHandle<Option<Value>>,
}

impl IssuedPrefetch {
    /// Wait for the prefetch; `None` if it failed for any reason.
    pub async fn wait(self) -> Option<Value> {
        self.handle.await.ok().flatten()
    }

    /// Wait for a whole batch, pairing each URL with its outcome.
    pub async fn wait_all(issued: Vec<IssuedPrefetch>) -> Vec<(String, Option<Value>)> {
        join_all(issued.into_iter().map(|p| async move {
            let url = p.url.clone();
            (url, p.wait().await)
        }))
        .await
    }
}

/// Lookup table from pathnames to cache-warming reads.
#[derive(Debug, Clone)]
pub struct PrefetchPlanner {
    routes: Vec<PrefetchRoute>,
}

impl Default for PrefetchPlanner {
    fn default() -> Self {
        Self::with_routes(vec![
            PrefetchRoute::new("/")
                .fetch_resource(DASHBOARD_SUMMARY)
                .fetch_resource(ANNOUNCEMENTS),
            PrefetchRoute::new("/dashboard")
                .fetch_resource(DASHBOARD_SUMMARY)
                .fetch_resource(ANNOUNCEMENTS),
            PrefetchRoute::new("/employees").fetch_resource(EMPLOYEES),
            PrefetchRoute::new("/employees/:id").fetch(&EMPLOYEES.item_url(":id"), EMPLOYEES.ttl_ms),
            PrefetchRoute::new("/schedule")
                .fetch_resource(SHIFTS)
                .fetch_resource(LOCATIONS),
            PrefetchRoute::new("/timesheets").fetch_resource(TIMESHEETS),
            PrefetchRoute::new("/profile").fetch_resource(ME),
            PrefetchRoute::new("/admin")
                .fetch_resource(ADMIN_EMPLOYEES)
                .fetch_resource(ADMIN_ROLES)
                .admin_only(),
        ])
    }
}

impl PrefetchPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routes(routes: Vec<PrefetchRoute>) -> Self {
        Self { routes }
    }

    /// Reads to warm for `pathname`. Empty for unknown routes and for gated
    /// routes the session may not see.
    pub fn plan_for(&self, pathname: &str, session: &SessionData) -> Vec<PrefetchRequest> {
        let path = normalize_path(pathname);

        let Some((route, params)) = self
            .routes
            .iter()
            .find_map(|route| route.bind(path).map(|params| (route, params)))
        else {
            return Vec::new();
        };

        if route.admin_only && !session.has_admin_access() {
            debug!(route = %route.pattern, "Skipping prefetch for gated route");
            return Vec::new();
        }

        route
            .targets
            .iter()
            .map(|(template, ttl_ms)| PrefetchRequest {
                url: fill_template(template, &params),
                ttl_ms: *ttl_ms,
            })
            .collect()
    }

    /// Spawn the plan for `pathname` as a parallel batch.
    ///
    /// Returns once every prefetch is spawned, not once they finish. Outside
    /// a tokio runtime nothing is issued.
    pub fn warm(
        &self,
        client: &DataClient,
        pathname: &str,
        session: &SessionData,
    ) -> Vec<IssuedPrefetch> {
        let plan = self.plan_for(pathname, session);
        if plan.is_empty() {
            return Vec::new();
        }

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(pathname = pathname, error = %e, "No async runtime, skipping prefetch");
                return Vec::new();
            }
        };

        debug!(pathname = pathname, count = plan.len(), "Issuing prefetches");
        plan.into_iter()
            .map(|request| {
                let client = client.clone();
                let url = request.url.clone();
                let handle = runtime.spawn(async move {
                    client
                        .prefetch(&request.url, RequestOptions::get().ttl_ms(request.ttl_ms))
                        .await
                });
                IssuedPrefetch { url, handle }
            })
            .collect()
    }
}

/// Drop query string, fragment and trailing slashes; the root stays `/`.
fn normalize_path(pathname: &str) -> &str {
    let end = pathname.find(['?', '#']).unwrap_or(pathname.len());
    let trimmed = pathname[..end].trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn fill_template(template: &str, params: &[(&str, &str)]) -> String {
    template
        .split('/')
        .map(|segment| {
            segment
                .strip_prefix(':')
                .and_then(|name| params.iter().find(|(key, _)| *key == name))
                .map(|(_, value)| *value)
                .unwrap_or(segment)
        })
        .collect::<Vec<_>>()
        .join("/")
}
