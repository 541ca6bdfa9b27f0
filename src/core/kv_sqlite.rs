//! SQLite-backed [`VersionedKv`].
//!
//! Each row of `kv_versions` is one version of one controller's value for one
//! key. Version numbers are allocated inside the write transaction.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::GlossError;
use crate::core::identity::Identity;
use crate::core::kv::{ControllerFilter, GetOptions, KvRecord, KvVersion, VersionedKv};
use crate::core::time;
use rusqlite::params;
use std::path::{Path, PathBuf};

pub struct SqliteKv {
    root: PathBuf,
    db_path: PathBuf,
}

impl SqliteKv {
    /// Open (and initialize if needed) the store under `root`.
    pub fn open(root: &Path) -> Result<Self, GlossError> {
        db::initialize_kv_db(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            db_path: db::kv_db_path(root),
        })
    }

    fn broker(&self) -> DbBroker {
        DbBroker::new(&self.root)
    }
}

impl VersionedKv for SqliteKv {
    fn set(&self, identity: &Identity, key: &str, value: &str) -> Result<(), GlossError> {
        let written_at = time::now_rfc3339();
        self.broker()
            .with_conn(&self.db_path, identity.as_str(), "kv.set", |conn| {
                let tx = conn.transaction()?;
                let next: i64 = tx.query_row(
                    "SELECT COALESCE(MAX(version), 0) + 1 FROM kv_versions
                     WHERE key = ?1 AND controller = ?2",
                    params![key, identity.as_str()],
                    |row| row.get(0),
                )?;
                tx.execute(
                    "INSERT INTO kv_versions(key, controller, version, value, written_at)
                     VALUES(?1, ?2, ?3, ?4, ?5)",
                    params![key, identity.as_str(), next, value, written_at],
                )?;
                tx.commit()?;
                tracing::debug!(key, controller = %identity.short(), version = next, "kv set");
                Ok(())
            })
    }

    fn get(
        &self,
        identity: &Identity,
        key: &str,
        opts: &GetOptions,
    ) -> Result<Vec<KvRecord>, GlossError> {
        let controller = match &opts.controller {
            ControllerFilter::All => None,
            ControllerFilter::Caller => Some(identity.as_str().to_string()),
            ControllerFilter::Exact(c) => Some(c.clone()),
        };

        self.broker()
            .with_read_conn(&self.db_path, |conn| {
                // Newest first within each controller; consumers normalize order themselves.
                let mut stmt = conn.prepare(
                    "SELECT controller, version, value FROM kv_versions
                     WHERE key = ?1 AND (?2 IS NULL OR controller = ?2)
                     ORDER BY controller ASC, version DESC",
                )?;
                let rows = stmt.query_map(params![key, controller], |row| {
                    let version: i64 = row.get(1)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        KvVersion {
                            version: version as u64,
                            value: row.get(2)?,
                        },
                    ))
                })?;

                let mut records: Vec<KvRecord> = Vec::new();
                for row in rows {
                    let (ctrl, version) = row?;
                    match records.last_mut() {
                        Some(rec) if rec.controller == ctrl => {
                            if opts.history {
                                rec.history.push(version);
                            }
                        }
                        _ => records.push(KvRecord {
                            key: key.to_string(),
                            controller: ctrl,
                            current: version,
                            history: Vec::new(),
                        }),
                    }
                }
                Ok(records)
            })
    }
}
