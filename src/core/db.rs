use crate::core::broker::DbBroker;
use crate::core::error;
use crate::core::schemas;
use rusqlite::{Connection, params};
use std::fs;
use std::path::{Path, PathBuf};

pub fn db_connect(db_path: &str) -> Result<Connection, error::GlossError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    Ok(conn)
}

pub fn kv_db_path(root: &Path) -> PathBuf {
    root.join(schemas::KV_DB_NAME)
}

pub fn initialize_kv_db(root: &Path) -> Result<(), error::GlossError> {
    fs::create_dir_all(root).map_err(error::GlossError::IoError)?;

    let db_path = kv_db_path(root);
    let broker = DbBroker::new(root);
    broker.with_conn(&db_path, "gloss", "kv.init", |conn| {
        conn.execute(schemas::KV_DB_SCHEMA_META, [])?;
        conn.execute(schemas::KV_DB_SCHEMA_VERSIONS, [])?;
        conn.execute(schemas::KV_DB_SCHEMA_INDEX, [])?;
        conn.execute(
            "INSERT OR IGNORE INTO meta(key, value) VALUES('schema_version', ?1)",
            params![schemas::KV_SCHEMA_VERSION],
        )?;
        Ok(())
    })
}
