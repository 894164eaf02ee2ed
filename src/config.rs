// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration for search-rbac
//!
//! All search-rbac data is stored under ~/.search-rbac/:
//! - ~/.search-rbac/config.json - cache and discovery settings
//! - ~/.search-rbac/log/ - rolling log files

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default freshness window of per-identity permissions (1 minute)
pub const DEFAULT_USER_CACHE_TTL_MS: u64 = 60_000;

/// Default freshness window of shared hub topology (5 minutes)
pub const DEFAULT_SHARED_CACHE_TTL_MS: u64 = 300_000;

/// Label key substring that marks a namespace as a managed cluster
pub const DEFAULT_MANAGED_CLUSTER_LABEL_MARKER: &str = "managedCluster";

/// Concurrent authorization reviews per refresh
pub const DEFAULT_RULES_REVIEW_CONCURRENCY: usize = 10;

/// Get the base search-rbac directory (~/.search-rbac/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".search-rbac"))
        .context("Could not determine home directory")
}

/// search-rbac configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Freshness window of each per-identity sub-cache, in milliseconds
    #[serde(default = "default_user_cache_ttl_ms")]
    pub user_cache_ttl_ms: u64,

    /// Freshness window of the shared namespace list and resource catalog
    #[serde(default = "default_shared_cache_ttl_ms")]
    pub shared_cache_ttl_ms: u64,

    #[serde(default = "default_managed_cluster_label_marker")]
    pub managed_cluster_label_marker: String,

    #[serde(default = "default_rules_review_concurrency")]
    pub rules_review_concurrency: usize,

    /// Kubeconfig context of the hub (kubeconfig default when unset)
    #[serde(default)]
    pub context: Option<String>,
}

fn default_user_cache_ttl_ms() -> u64 {
    DEFAULT_USER_CACHE_TTL_MS
}

fn default_shared_cache_ttl_ms() -> u64 {
    DEFAULT_SHARED_CACHE_TTL_MS
}

fn default_managed_cluster_label_marker() -> String {
    DEFAULT_MANAGED_CLUSTER_LABEL_MARKER.to_string()
}

fn default_rules_review_concurrency() -> usize {
    DEFAULT_RULES_REVIEW_CONCURRENCY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_cache_ttl_ms: DEFAULT_USER_CACHE_TTL_MS,
            shared_cache_ttl_ms: DEFAULT_SHARED_CACHE_TTL_MS,
            managed_cluster_label_marker: default_managed_cluster_label_marker(),
            rules_review_concurrency: DEFAULT_RULES_REVIEW_CONCURRENCY,
            context: None,
        }
    }
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from a specific file, or return default if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get the config file path (~/.search-rbac/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }

    fn validate(&self) -> Result<()> {
        if self.user_cache_ttl_ms == 0 {
            return Err(crate::error::Error::config("user_cache_ttl_ms must be greater than 0").into());
        }
        if self.managed_cluster_label_marker.is_empty() {
            return Err(
                crate::error::Error::config("managed_cluster_label_marker must not be empty").into(),
            );
        }
        Ok(())
    }

    pub fn user_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.user_cache_ttl_ms)
    }

    pub fn shared_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.shared_cache_ttl_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.user_cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.shared_cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.managed_cluster_label_marker, "managedCluster");
        assert!(config.context.is_none());
    }

    #[test]
    fn test_config_deserialize_partial() {
        let json = r#"{"user_cache_ttl_ms": 1500, "context": "hub"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.user_cache_ttl(), Duration::from_millis(1500));
        assert_eq!(config.context.as_deref(), Some("hub"));
        assert_eq!(config.rules_review_concurrency, DEFAULT_RULES_REVIEW_CONCURRENCY);
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let config = Config {
            user_cache_ttl_ms: 30_000,
            context: Some("hub-prod".to_string()),
            ..Config::default()
        };
        config.save_to(&config_path).unwrap();

        let loaded = Config::load_from(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = Config::load_from(&temp_dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_load_rejects_zero_ttl() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"user_cache_ttl_ms": 0}"#).unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("user_cache_ttl_ms"));
    }
}
