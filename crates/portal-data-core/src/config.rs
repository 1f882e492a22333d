//! Client configuration management.
//!
//! This module handles loading and saving the data client configuration:
//! the API base URL, transport timeout, default prefetch TTL and the verbose
//! request-count diagnostics flag.
//!
//! Configuration is stored at `~/.config/portal-data/config.json` and can be
//! overridden per process with `PORTAL_*` environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for the config directory path
const APP_NAME: &str = "portal-data";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Transport timeout applied when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// TTL applied to prefetches that do not carry their own.
pub const DEFAULT_PREFETCH_TTL_MS: u64 = 30_000;

const ENV_BASE_URL: &str = "PORTAL_API_BASE_URL";
const ENV_TIMEOUT: &str = "PORTAL_REQUEST_TIMEOUT_SECS";
const ENV_PREFETCH_TTL: &str = "PORTAL_PREFETCH_TTL_MS";
const ENV_DEBUG_REQUESTS: &str = "PORTAL_DEBUG_REQUESTS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub default_prefetch_ttl_ms: u64,
    pub debug_requests: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            default_prefetch_ttl_ms: DEFAULT_PREFETCH_TTL_MS,
            debug_requests: false,
        }
    }
}

impl ClientConfig {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Overlay `PORTAL_*` environment variables onto this config.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Overlay values from an arbitrary lookup. Unparsable values are logged and skipped.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_BASE_URL) {
            let url = url.trim();
            self.base_url = (!url.is_empty()).then(|| url.to_string());
        }

        if let Some(raw) = lookup(ENV_TIMEOUT) {
            match raw.trim().parse() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => warn!(var = ENV_TIMEOUT, value = %raw, "Ignoring invalid override"),
            }
        }

        if let Some(raw) = lookup(ENV_PREFETCH_TTL) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.default_prefetch_ttl_ms = ms,
                _ => warn!(var = ENV_PREFETCH_TTL, value = %raw, "Ignoring invalid override"),
            }
        }

        if let Some(raw) = lookup(ENV_DEBUG_REQUESTS) {
            match parse_flag(&raw) {
                Some(flag) => self.debug_requests = flag,
                None => warn!(var = ENV_DEBUG_REQUESTS, value = %raw, "Ignoring invalid override"),
            }
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
