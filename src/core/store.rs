//! Store abstraction for gloss's local state.
//!
//! A store is one directory holding the versioned KV database, the broker
//! audit trail, uploaded blobs, the caller's identity and `gloss.toml`.

use crate::core::error::GlossError;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory name used under the home directory when no override is given.
pub const DEFAULT_STORE_DIR: &str = ".gloss";

/// Store handle representing a gloss state workspace.
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory
    pub root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the store root: explicit override, then `$HOME/.gloss`.
    pub fn resolve(home_override: Option<&Path>) -> Result<Self, GlossError> {
        if let Some(dir) = home_override {
            return Ok(Self::new(dir));
        }
        let home = dirs::home_dir().ok_or_else(|| {
            GlossError::ConfigError("cannot determine home directory; pass --home".into())
        })?;
        Ok(Self::new(home.join(DEFAULT_STORE_DIR)))
    }

    pub fn ensure_dir(&self) -> Result<(), GlossError> {
        fs::create_dir_all(&self.root).map_err(GlossError::IoError)
    }
}
