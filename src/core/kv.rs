//! Versioned key-value store contract.
//!
//! The store keeps, per `(key, controller)`, a current value plus the ordered
//! values it superseded. Writes are always scoped to the calling identity;
//! reads may be scoped to the caller, to one named controller, or span all of
//! them. Values are opaque text: decoding is the caller's job.

use crate::core::error::GlossError;
use crate::core::identity::Identity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerFilter {
    /// Every controller that has ever written the key.
    All,
    /// Only the calling identity.
    Caller,
    /// One named controller.
    Exact(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOptions {
    pub controller: ControllerFilter,
    pub history: bool,
}

impl GetOptions {
    /// The caller's own current value, no history.
    pub fn own_current() -> Self {
        Self {
            controller: ControllerFilter::Caller,
            history: false,
        }
    }

    /// Every controller, with full history.
    pub fn all_with_history() -> Self {
        Self {
            controller: ControllerFilter::All,
            history: true,
        }
    }

    pub fn all_current() -> Self {
        Self {
            controller: ControllerFilter::All,
            history: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvVersion {
    /// Monotonic per `(key, controller)`; higher is newer.
    pub version: u64,
    pub value: String,
}

/// One controller's chain for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvRecord {
    pub key: String,
    pub controller: String,
    pub current: KvVersion,
    /// Superseded values. Backends may return these in any order.
    pub history: Vec<KvVersion>,
}

impl KvRecord {
    /// Current plus history, oldest first, regardless of how the backend ordered them.
    pub fn versions_ascending(&self) -> Vec<&KvVersion> {
        let mut all: Vec<&KvVersion> = self.history.iter().collect();
        all.push(&self.current);
        all.sort_by_key(|v| v.version);
        all.dedup_by_key(|v| v.version);
        all
    }
}

pub trait VersionedKv {
    /// Write `value` as the caller's new current version of `key`.
    fn set(&self, identity: &Identity, key: &str, value: &str) -> Result<(), GlossError>;

    /// One record per matching controller. Empty when nothing was ever written.
    fn get(
        &self,
        identity: &Identity,
        key: &str,
        opts: &GetOptions,
    ) -> Result<Vec<KvRecord>, GlossError>;
}
