//! Centralized database schema definitions.
//!
//! gloss keeps a single SQLite database: `kv.db`, the local versioned
//! key-value store. Every `(key, controller)` pair owns an independent,
//! monotonically numbered version chain; the highest version is current.

pub const KV_DB_NAME: &str = "kv.db";
pub const KV_EVENTS_NAME: &str = "kv.events.jsonl";
pub const BLOB_DIR_NAME: &str = "blobs";
pub const IDENTITY_FILE_NAME: &str = "identity";
pub const CONFIG_FILE_NAME: &str = "gloss.toml";

pub const KV_DB_SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const KV_DB_SCHEMA_VERSIONS: &str = "
    CREATE TABLE IF NOT EXISTS kv_versions (
        key TEXT NOT NULL,
        controller TEXT NOT NULL,
        version INTEGER NOT NULL,
        value TEXT NOT NULL,
        written_at TEXT NOT NULL,
        PRIMARY KEY (key, controller, version)
    )
";

pub const KV_DB_SCHEMA_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_kv_versions_key ON kv_versions(key)";

pub const KV_SCHEMA_VERSION: &str = "1";
