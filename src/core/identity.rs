//! Controller identity.
//!
//! Every write is attributed to the identity that issued it, and every read
//! stamps entries with the identity the store recorded. The identity is passed
//! explicitly into each store call; there is no process-global "self".

use crate::core::error::GlossError;
use crate::core::schemas;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    pub fn new(raw: &str) -> Result<Self, GlossError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(GlossError::ValidationError(format!(
                "Invalid identity '{}': must be a non-empty token without whitespace",
                raw
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Fresh random identity: hex SHA-256 over a new ULID.
    pub fn generate() -> Self {
        let mut hasher = Sha256::new();
        hasher.update(Ulid::new().to_string().as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Read `<root>/identity`, creating it on first use.
    pub fn load_or_create(root: &Path) -> Result<Self, GlossError> {
        let path = root.join(schemas::IDENTITY_FILE_NAME);
        if path.is_file() {
            let raw = fs::read_to_string(&path).map_err(GlossError::IoError)?;
            return Self::new(&raw);
        }
        fs::create_dir_all(root).map_err(GlossError::IoError)?;
        let id = Self::generate();
        fs::write(&path, format!("{}\n", id.0)).map_err(GlossError::IoError)?;
        tracing::info!(identity = %id.short(), "created new identity");
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for display.
    pub fn short(&self) -> &str {
        short_controller(&self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn short_controller(controller: &str) -> &str {
    match controller.char_indices().nth(8) {
        Some((idx, _)) => &controller[..idx],
        None => controller,
    }
}
