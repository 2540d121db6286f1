// SPDX-License-Identifier: PMPL-1.0-or-later
//! Server configuration, read from `RTSDATA_*` environment variables.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// redb database file; an in-memory store is used when absent
    pub db_path: Option<PathBuf>,
    /// Accepted access tokens, in clear; hashed before use
    #[serde(skip_serializing, default)]
    pub api_keys: Vec<String>,
    /// Prefix every route is mounted under, e.g. `/rts`
    pub root_path: Option<String>,
    pub auth_enabled: bool,
    /// Serve `/health` and `/ready` without a token
    pub public_health: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            db_path: None,
            api_keys: Vec::new(),
            root_path: None,
            auth_enabled: true,
            public_health: true,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(host) = get("RTSDATA_HOST") {
            config.host = host;
        }
        if let Some(port) = get("RTSDATA_PORT") {
            config.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                var: "RTSDATA_PORT",
                value: port.clone(),
            })?;
        }
        config.db_path = get("RTSDATA_DB_PATH").map(PathBuf::from);
        if let Some(keys) = get("RTSDATA_API_KEYS") {
            config.api_keys = keys
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect();
        }
        config.root_path = get("RTSDATA_ROOT_PATH").and_then(|p| normalize_root_path(&p));
        if let Some(flag) = get("RTSDATA_AUTH_ENABLED") {
            config.auth_enabled = parse_flag("RTSDATA_AUTH_ENABLED", &flag)?;
        }
        if let Some(flag) = get("RTSDATA_PUBLIC_HEALTH") {
            config.public_health = parse_flag("RTSDATA_PUBLIC_HEALTH", &flag)?;
        }
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `/rts/` and `rts` both become `/rts`; `/` means no prefix.
pub fn normalize_root_path(path: &str) -> Option<String> {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!("/{trimmed}"))
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = ApiConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.db_path.is_none());
        assert!(config.api_keys.is_empty());
        assert!(config.auth_enabled);
    }

    #[test]
    fn test_reads_every_variable() {
        let config = ApiConfig::from_lookup(lookup(&[
            ("RTSDATA_HOST", "127.0.0.1"),
            ("RTSDATA_PORT", "9000"),
            ("RTSDATA_DB_PATH", "/var/lib/rtsdata/rts.redb"),
            ("RTSDATA_API_KEYS", "alpha, beta,,"),
            ("RTSDATA_ROOT_PATH", "/rts/"),
            ("RTSDATA_PUBLIC_HEALTH", "no"),
        ]))
        .unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.db_path, Some(PathBuf::from("/var/lib/rtsdata/rts.redb")));
        assert_eq!(config.api_keys, vec!["alpha", "beta"]);
        assert_eq!(config.root_path.as_deref(), Some("/rts"));
        assert!(!config.public_health);
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let err = ApiConfig::from_lookup(lookup(&[("RTSDATA_PORT", "http")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "RTSDATA_PORT",
                value: "http".to_string()
            }
        );
    }

    #[test]
    fn test_root_path_normalization() {
        assert_eq!(normalize_root_path("/"), None);
        assert_eq!(normalize_root_path("rts"), Some("/rts".to_string()));
        assert_eq!(normalize_root_path("/a/b/"), Some("/a/b".to_string()));
    }
}
