//! Subsystem registration: centralizes store initialization.
//!
//! Adding a new subsystem: append one entry to `SUBSYSTEMS`.

use crate::core::{db, error};
use crate::plugins::assets;
use std::path::Path;

pub(crate) struct SubsystemInit {
    pub name: &'static str,
    pub initialize: fn(&Path) -> Result<(), error::GlossError>,
}

pub(crate) const SUBSYSTEMS: &[SubsystemInit] = &[
    SubsystemInit { name: "kv", initialize: db::initialize_kv_db },
    SubsystemInit { name: "blobs", initialize: assets::initialize_blob_store },
];

/// Initialize every subsystem sequentially, returning the names initialized.
pub(crate) fn initialize_all(root: &Path) -> Result<Vec<&'static str>, error::GlossError> {
    let mut done = Vec::with_capacity(SUBSYSTEMS.len());
    for sub in SUBSYSTEMS {
        (sub.initialize)(root)?;
        done.push(sub.name);
    }
    Ok(done)
}
