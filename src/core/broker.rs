use crate::core::db;
use crate::core::error;
use crate::core::schemas;
use crate::core::time;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The DB Broker is the single path through which the KV database is touched.
/// Connections are serialized in-process and every write is audited to a JSONL
/// trail. The trail is append-only; nothing rotates it.
pub struct DbBroker {
    audit_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub db_id: String,
    pub status: String,
}

impl DbBroker {
    pub fn new(root: &Path) -> Self {
        Self {
            audit_log_path: root.join(schemas::KV_EVENTS_NAME),
        }
    }

    /// Execute a mutating closure with a serialized connection to the specified DB.
    ///
    /// The closure's result is returned as-is. The audit line is written after the
    /// closure commits, so an audit failure is logged and never reported as a failed
    /// operation.
    pub fn with_conn<F, R>(
        &self,
        db_path: &Path,
        actor: &str,
        op_name: &str,
        f: F,
    ) -> Result<R, error::GlossError>
    where
        F: FnOnce(&mut Connection) -> Result<R, error::GlossError>,
    {
        let result = Self::serialized(db_path, f);

        let status = if result.is_ok() { "success" } else { "error" };
        if let Err(e) = self.log_event(actor, op_name, &db_id(db_path), status) {
            tracing::warn!(
                op = op_name,
                status,
                error = %e,
                path = %self.audit_log_path.display(),
                "failed to append broker audit event"
            );
        }

        result
    }

    /// Execute a read-only closure with a serialized connection. Reads are not
    /// audited, so the audit trail grows only with writes.
    pub fn with_read_conn<F, R>(&self, db_path: &Path, f: F) -> Result<R, error::GlossError>
    where
        F: FnOnce(&mut Connection) -> Result<R, error::GlossError>,
    {
        Self::serialized(db_path, f)
    }

    fn serialized<F, R>(db_path: &Path, f: F) -> Result<R, error::GlossError>
    where
        F: FnOnce(&mut Connection) -> Result<R, error::GlossError>,
    {
        static DB_LOCK: Mutex<()> = Mutex::new(());
        let _lock = DB_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut conn = db::db_connect(&db_path.to_string_lossy())?;
        f(&mut conn)
    }

    fn log_event(
        &self,
        actor: &str,
        op: &str,
        db_id: &str,
        status: &str,
    ) -> Result<(), error::GlossError> {
        let ev = BrokerEvent {
            ts: time::now_rfc3339(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            op: op.to_string(),
            db_id: db_id.to_string(),
            status: status.to_string(),
        };
        let line = serde_json::to_string(&ev)
            .map_err(|e| error::GlossError::ValidationError(e.to_string()))?;

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)
            .map_err(error::GlossError::IoError)?;
        writeln!(f, "{}", line).map_err(error::GlossError::IoError)?;
        Ok(())
    }
}

fn db_id(db_path: &Path) -> String {
    db_path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// Read back the audit trail, oldest first. Missing file means no events yet.
pub fn read_audit_log(root: &Path) -> Result<Vec<BrokerEvent>, error::GlossError> {
    let path = root.join(schemas::KV_EVENTS_NAME);
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(&path).map_err(error::GlossError::IoError)?;
    let mut out = Vec::new();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let ev: BrokerEvent = serde_json::from_str(line).map_err(|e| {
            error::GlossError::ValidationError(format!("Invalid audit event: {}", e))
        })?;
        out.push(ev);
    }
    Ok(out)
}
