use serde::{Deserialize, Serialize};

/// Permission that unlocks the admin area.
pub const ADMIN_ACCESS: &str = "admin.access";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionData {
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub permissions: Vec<String>,
    /// Pre-permission boolean some accounts still carry.
    pub is_admin: Option<bool>,
}

impl SessionData {
    /// Session with the given permissions and nothing else.
    pub fn with_permissions<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            permissions: permissions.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn has_permission(&self, name: &str) -> bool {
        self.permissions.iter().any(|p| p == name)
    }

    /// Admin capability via the explicit permission or the legacy flag.
    pub fn has_admin_access(&self) -> bool {
        self.has_permission(ADMIN_ACCESS) || self.is_admin.unwrap_or(false)
    }
}
