//! Analyzer configuration loading
//!
//! Loads configuration from `~/.config/iamrisk/config.toml` (or `IAMRISK_CONFIG` env).
//! A missing file is not an error: every field has a default.

use crate::errors::{AnalyzerError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration for the analyzer
#[derive(Debug, Deserialize, Clone)]
pub struct AnalyzerConfig {
    /// Path to the snapshot JSON document
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,

    /// What to do when the snapshot file does not exist
    #[serde(default)]
    pub missing_snapshot: MissingSnapshotPolicy,

    /// Minimum cardinality rules for the integrity report
    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

fn default_snapshot_path() -> String {
    Path::new("data")
        .join("data.json")
        .to_string_lossy()
        .into_owned()
}

/// Policy applied when the snapshot file is absent
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MissingSnapshotPolicy {
    /// Fail start-up with `SnapshotNotFound`
    #[default]
    Abort,
    /// Continue with an empty record; every integrity check fails
    Empty,
}

/// Minimum counts checked by the integrity report
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ThresholdConfig {
    #[serde(default = "default_min_users")]
    pub min_users: usize,

    /// Counted over distinct `RoleName` values, not role records
    #[serde(default = "default_min_role_names")]
    pub min_role_names: usize,

    #[serde(default = "default_min_applications")]
    pub min_applications: usize,

    #[serde(default = "default_min_groups")]
    pub min_groups: usize,

    #[serde(default = "default_min_resources")]
    pub min_resources: usize,
}

fn default_min_users() -> usize {
    20
}
fn default_min_role_names() -> usize {
    5
}
fn default_min_applications() -> usize {
    5
}
fn default_min_groups() -> usize {
    3
}
fn default_min_resources() -> usize {
    5
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_users: default_min_users(),
            min_role_names: default_min_role_names(),
            min_applications: default_min_applications(),
            min_groups: default_min_groups(),
            min_resources: default_min_resources(),
        }
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            missing_snapshot: MissingSnapshotPolicy::default(),
            thresholds: ThresholdConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "IAMRISK_CONFIG";

    /// Default config filename
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "config.toml";

    /// Load configuration from file
    ///
    /// Resolution order:
    /// 1. `IAMRISK_CONFIG` environment variable
    /// 2. `~/.config/iamrisk/config.toml`
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let path = Self::resolve_config_path();

        if !path.exists() {
            tracing::debug!(
                path = %path.display(),
                "Analyzer config not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load_from_path(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AnalyzerError::config_with_source(
                format!("failed to read config at {}", path.display()),
                e,
            )
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: AnalyzerConfig = toml::from_str(contents)
            .map_err(|e| AnalyzerError::config_with_source("failed to parse config", e))?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .map(|h| {
                h.join(".config")
                    .join("iamrisk")
                    .join(Self::DEFAULT_CONFIG_FILENAME)
            })
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    fn validate(&self) -> Result<()> {
        if self.snapshot_path.trim().is_empty() {
            return Err(AnalyzerError::config("snapshot_path must not be empty"));
        }

        let t = &self.thresholds;
        for (name, value) in [
            ("min_users", t.min_users),
            ("min_role_names", t.min_role_names),
            ("min_applications", t.min_applications),
            ("min_groups", t.min_groups),
            ("min_resources", t.min_resources),
        ] {
            if value == 0 {
                tracing::warn!(threshold = name, "Threshold is 0; the check always passes");
            }
        }

        Ok(())
    }

    /// Get the resolved snapshot path (expanding ~ if needed)
    pub fn resolved_snapshot_path(&self) -> PathBuf {
        let path = &self.snapshot_path;
        if let Some(stripped) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(stripped);
        }
        PathBuf::from(path)
    }
}
