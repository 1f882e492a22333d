//! Named endpoint wrappers over the dispatcher.
//!
//! Each [`Resource`] is a REST collection plus the TTL its reads are cached
//! for. Page modules call these instead of assembling URLs and options by
//! hand, which keeps the TTL consistent for every read of the same key.

use serde_json::Value;
use tracing::warn;

use crate::api::{ApiError, DataClient, RequestOptions};
use crate::auth::SessionData;

/// A REST collection exposed by the portal API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    pub collection: &'static str,
    pub ttl_ms: u64,
}

pub const ME: Resource = Resource::new("/api/me", 30_000);
pub const DASHBOARD_SUMMARY: Resource = Resource::new("/api/dashboard/summary", 30_000);
pub const ANNOUNCEMENTS: Resource = Resource::new("/api/announcements", 30_000);
pub const EMPLOYEES: Resource = Resource::new("/api/employees", 30_000);
pub const SHIFTS: Resource = Resource::new("/api/shifts", 20_000);
pub const LOCATIONS: Resource = Resource::new("/api/locations", 20_000);
pub const TIMESHEETS: Resource = Resource::new("/api/timesheets", 20_000);
pub const ADMIN_EMPLOYEES: Resource = Resource::new("/api/admin/employees", 30_000);
pub const ADMIN_ROLES: Resource = Resource::new("/api/admin/roles", 30_000);

impl Resource {
    pub const fn new(collection: &'static str, ttl_ms: u64) -> Self {
        Self { collection, ttl_ms }
    }

    pub fn item_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection, id)
    }

    pub async fn list(&self, client: &DataClient) -> Result<Value, ApiError> {
        client
            .request(self.collection, RequestOptions::get().ttl_ms(self.ttl_ms))
            .await
    }

    pub async fn get(&self, client: &DataClient, id: &str) -> Result<Value, ApiError> {
        client
            .request(&self.item_url(id), RequestOptions::get().ttl_ms(self.ttl_ms))
            .await
    }

    pub async fn create(&self, client: &DataClient, body: Value) -> Result<Value, ApiError> {
        client
            .request(self.collection, RequestOptions::post(body))
            .await
    }

    pub async fn update(
        &self,
        client: &DataClient,
        id: &str,
        body: Value,
    ) -> Result<Value, ApiError> {
        client
            .request(&self.item_url(id), RequestOptions::put(body))
            .await
    }

    pub async fn delete(&self, client: &DataClient, id: &str) -> Result<Value, ApiError> {
        client
            .request(&self.item_url(id), RequestOptions::delete())
            .await
    }
}

/// Fetch the signed-in user's session.
///
/// A body that does not describe a session yields a session with no
/// permissions rather than an error.
pub async fn fetch_session(client: &DataClient) -> Result<SessionData, ApiError> {
    let payload = ME.list(client).await?;
    match serde_json::from_value(payload) {
        Ok(session) => Ok(session),
        Err(e) => {
            warn!(error = %e, "Unrecognised session payload, treating as anonymous");
            Ok(SessionData::default())
        }
    }
}
