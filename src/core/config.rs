//! Runtime configuration.
//!
//! Sources, later wins: built-in defaults, `<store>/gloss.toml`, then
//! environment variables. A missing config file is not an error.

use crate::core::error::GlossError;
use crate::core::schemas;
use crate::plugins::timeline::{DedupIdentity, ReadMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_RETENTION_MINUTES: u64 = 60 * 24 * 30;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GlossConfig {
    pub site_title: String,
    /// Base URL asset references are published under.
    pub uhrp_url: String,
    pub retention_minutes: u64,
    pub read_mode: ReadMode,
    pub dedup: DedupIdentity,
}

impl Default for GlossConfig {
    fn default() -> Self {
        Self {
            site_title: "notes".to_string(),
            uhrp_url: "https://nanostore.babbage.systems".to_string(),
            retention_minutes: DEFAULT_RETENTION_MINUTES,
            read_mode: ReadMode::FullHistory,
            dedup: DedupIdentity::Entry,
        }
    }
}

impl GlossConfig {
    /// Load using the process environment for overrides.
    pub fn load(root: &Path) -> Result<Self, GlossError> {
        Self::load_with_env(root, |name| std::env::var(name).ok())
    }

    pub fn load_with_env<F>(root: &Path, env: F) -> Result<Self, GlossError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = root.join(schemas::CONFIG_FILE_NAME);
        let mut cfg = if path.is_file() {
            let content = fs::read_to_string(&path).map_err(GlossError::IoError)?;
            toml::from_str(&content).map_err(|e| {
                GlossError::ConfigError(format!("{}: {}", path.display(), e))
            })?
        } else {
            GlossConfig::default()
        };
        cfg.apply_env(env)?;
        Ok(cfg)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<(), GlossError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = env("GLOSS_SITE_TITLE") {
            self.site_title = v;
        }
        if let Some(v) = env("UHRP_URL") {
            self.uhrp_url = v;
        }
        if let Some(v) = env("UHRP_RETENTION_MIN") {
            self.retention_minutes = v.trim().parse().map_err(|_| {
                GlossError::ConfigError(format!("UHRP_RETENTION_MIN must be an integer, got '{}'", v))
            })?;
        }
        if let Some(v) = env("GLOSS_READ_MODE") {
            self.read_mode = ReadMode::from_str(&v)?;
        }
        if let Some(v) = env("GLOSS_DEDUP") {
            self.dedup = DedupIdentity::from_str(&v)?;
        }
        Ok(())
    }
}
