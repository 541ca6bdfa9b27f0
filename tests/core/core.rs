use gloss::core::broker::{self, BrokerEvent, DbBroker};
use gloss::core::config::GlossConfig;
use gloss::core::db;
use gloss::core::error::GlossError;
use gloss::core::identity::Identity;
use gloss::core::kv::{GetOptions, VersionedKv};
use gloss::core::kv_sqlite::SqliteKv;
use gloss::core::schemas;
use gloss::core::store::Store;
use gloss::plugins::timeline::{DedupIdentity, ReadMode, ReconstructOptions};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

#[test]
fn kv_db_initializes_schema_and_is_idempotent() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();

    db::initialize_kv_db(root).expect("kv init");
    db::initialize_kv_db(root).expect("kv re-init");
    let db_path = db::kv_db_path(root);
    assert!(db_path.exists());

    let conn = db::db_connect(&db_path.to_string_lossy()).expect("db connect");
    let mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("journal mode");
    assert_eq!(mode.to_lowercase(), "wal");
    let version: String = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .expect("schema version");
    assert_eq!(version, schemas::KV_SCHEMA_VERSION);
}

#[test]
fn broker_audits_success_and_failure() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    db::initialize_kv_db(root).expect("kv init");
    let db_path = db::kv_db_path(root);

    let broker = DbBroker::new(root);
    let count: i64 = broker
        .with_conn(&db_path, "tester", "kv.count", |conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM kv_versions", [], |row| row.get(0))?)
        })
        .expect("broker success path");
    assert_eq!(count, 0);

    let result: Result<(), GlossError> = broker.with_conn(&db_path, "tester", "kv.fail", |_| {
        Err(GlossError::ValidationError("intentional".to_string()))
    });
    assert!(result.is_err());

    let audit_path = root.join(schemas::KV_EVENTS_NAME);
    assert!(audit_path.exists());
    let raw: Vec<BrokerEvent> = fs::read_to_string(&audit_path)
        .expect("read audit")
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid broker event json"))
        .collect();
    let events = broker::read_audit_log(root).expect("read audit log");
    assert_eq!(raw.len(), events.len());
    assert!(events.iter().any(|ev| ev.op == "kv.init" && ev.actor == "gloss"));
    assert!(events.iter().any(|ev| ev.op == "kv.count" && ev.status == "success"));
    assert!(events.iter().any(|ev| ev.op == "kv.fail" && ev.status == "error"));
    assert!(events.iter().all(|ev| ev.db_id == schemas::KV_DB_NAME));
    assert!(events.iter().all(|ev| !ev.event_id.is_empty()));
}

#[test]
fn committed_write_succeeds_even_when_audit_trail_is_unwritable() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    let kv = SqliteKv::open(root).expect("open kv");
    let alice = Identity::new("alice").expect("identity");

    let audit_path = root.join(schemas::KV_EVENTS_NAME);
    fs::remove_file(&audit_path).expect("remove audit log");
    fs::create_dir_all(&audit_path).expect("squat audit path");

    kv.set(&alice, "entry/2025-10-06", "v1")
        .expect("committed write must report success");
    let records = kv
        .get(&alice, "entry/2025-10-06", &GetOptions::own_current())
        .expect("get");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].current.value, "v1");

    let broker = DbBroker::new(root);
    let err = broker
        .with_conn(&db::kv_db_path(root), "alice", "kv.fail", |_| -> Result<(), GlossError> {
            Err(GlossError::StorageUnavailable("disk full".to_string()))
        })
        .unwrap_err();
    assert!(err.is_storage(), "operation error must win: {}", err);
}

#[test]
fn reads_do_not_grow_the_audit_trail() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    let kv = SqliteKv::open(root).expect("open kv");
    let alice = Identity::new("alice").expect("identity");
    kv.set(&alice, "entry/2025-10-06", "v1").expect("set");
    let before = broker::read_audit_log(root).expect("audit").len();

    for _ in 0..5 {
        kv.get(&alice, "entry/2025-10-06", &GetOptions::all_with_history())
            .expect("get");
    }
    let events = broker::read_audit_log(root).expect("audit");
    assert_eq!(events.len(), before);
    assert!(events.iter().any(|ev| ev.op == "kv.set" && ev.actor == "alice"));
    assert!(events.iter().all(|ev| ev.op != "kv.get"));
}

#[test]
fn missing_audit_log_reads_as_empty() {
    let tmp = tempdir().expect("tempdir");
    assert!(broker::read_audit_log(tmp.path()).expect("read").is_empty());
}

#[test]
fn unopenable_database_is_a_storage_error() {
    let tmp = tempdir().expect("tempdir");
    fs::create_dir_all(tmp.path().join(schemas::KV_DB_NAME)).expect("squat db path");
    let err = SqliteKv::open(tmp.path()).err().expect("open must fail");
    assert!(err.is_storage(), "unexpected error: {}", err);
}

#[test]
fn identity_is_created_once_and_reused() {
    let tmp = tempdir().expect("tempdir");
    let first = Identity::load_or_create(tmp.path()).expect("create identity");
    let second = Identity::load_or_create(tmp.path()).expect("load identity");
    assert_eq!(first, second);
    assert_eq!(first.as_str().len(), 64);
    assert_eq!(first.short().len(), 8);
    assert!(tmp.path().join(schemas::IDENTITY_FILE_NAME).is_file());
}

#[test]
fn store_resolves_explicit_home() {
    let tmp = tempdir().expect("tempdir");
    let nested = tmp.path().join("nested").join("store");
    let store = Store::resolve(Some(&nested)).expect("resolve");
    assert_eq!(store.root, nested);
    store.ensure_dir().expect("ensure dir");
    assert!(nested.is_dir());
}

#[test]
fn config_file_and_env_layer_over_defaults() {
    let tmp = tempdir().expect("tempdir");
    fs::write(
        tmp.path().join(schemas::CONFIG_FILE_NAME),
        "site_title = \"team notes\"\nread_mode = \"current\"\ndedup = \"controller\"\n",
    )
    .expect("write config");

    let cfg = GlossConfig::load_with_env(tmp.path(), |name| match name {
        "UHRP_RETENTION_MIN" => Some("5".to_string()),
        _ => None,
    })
    .expect("load config");
    assert_eq!(cfg.site_title, "team notes");
    assert_eq!(cfg.retention_minutes, 5);
    let opts = ReconstructOptions::from(&cfg);
    assert_eq!(opts.read_mode, ReadMode::CurrentOnly);
    assert_eq!(opts.dedup, DedupIdentity::ControllerScoped);
}

#[test]
fn unknown_config_key_is_rejected() {
    let tmp = tempdir().expect("tempdir");
    fs::write(tmp.path().join(schemas::CONFIG_FILE_NAME), "colour = \"red\"\n")
        .expect("write config");
    let err = GlossConfig::load_with_env(tmp.path(), |_| None).unwrap_err();
    assert!(matches!(err, GlossError::ConfigError(_)));
}

fn gloss(home: &Path, identity: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gloss"))
        .arg("--home")
        .arg(home)
        .args(["--identity", identity])
        .args(args)
        .env_remove("GLOSS_READ_MODE")
        .env_remove("GLOSS_DEDUP")
        .env_remove("GLOSS_LOG")
        .output()
        .expect("run gloss")
}

fn json_of(out: &Output) -> JsonValue {
    assert!(
        out.status.success(),
        "gloss failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("json envelope")
}

#[test]
fn cli_logs_from_two_identities_and_lists_one_timeline() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path();

    let init = json_of(&gloss(home, "alice", &["--format", "json", "init"]));
    assert_eq!(init["cmd"], "init");
    assert_eq!(init["status"], "ok");

    let logged = json_of(&gloss(
        home,
        "alice",
        &["--format", "json", "log", "fixed", "bug", "-t", "infra"],
    ));
    assert_eq!(logged["entry"]["text"], "fixed bug");
    assert_eq!(logged["entry"]["tags"][0], "infra");
    let day = logged["entry"]["key"].as_str().expect("day key").to_string();

    json_of(&gloss(home, "bob", &["--format", "json", "log", "shipped"]));

    let listed = json_of(&gloss(home, "bob", &["--format", "json", "list", &day]));
    let entries = listed["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 2);
    let controllers: Vec<&str> = entries
        .iter()
        .map(|e| e["controller"].as_str().expect("controller"))
        .collect();
    assert!(controllers.contains(&"alice"));
    assert!(controllers.contains(&"bob"));

    let tagged = json_of(&gloss(
        home,
        "bob",
        &["--format", "json", "list", &day, "--tags", "infra"],
    ));
    assert_eq!(tagged["entries"].as_array().expect("entries").len(), 1);

    let audit = json_of(&gloss(home, "bob", &["--format", "json", "audit", "--limit", "5"]));
    assert!(!audit["events"].as_array().expect("events").is_empty());
}

#[test]
fn cli_get_of_empty_day_fails_and_remove_day_needs_confirm() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path();

    let get = gloss(home, "alice", &["get", "2099-01-01"]);
    assert_eq!(get.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&get.stderr).contains("No entries found"));

    let remove = gloss(home, "alice", &["remove-day", "2099-01-01"]);
    assert_eq!(remove.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&remove.stderr).contains("--confirm"));

    let bad = gloss(home, "alice", &["list", "06-10-2025"]);
    assert_eq!(bad.status.code(), Some(1));
}

#[test]
fn cli_update_and_history_by_entry_ref() {
    let tmp = tempdir().expect("tempdir");
    let home = tmp.path();

    let logged = json_of(&gloss(home, "alice", &["--format", "json", "log", "draft"]));
    let day = logged["entry"]["key"].as_str().expect("day");
    let at = logged["entry"]["at"].as_str().expect("at");
    // at is RFC 3339 with millis: YYYY-MM-DDTHH:MM:SS.mmmZ
    let entry_ref = format!(
        "{}/{}{}{}-{}",
        day,
        &at[11..13],
        &at[14..16],
        &at[17..19],
        &at[20..23]
    );

    let updated = json_of(&gloss(
        home,
        "alice",
        &["--format", "json", "update", &entry_ref, "final"],
    ));
    assert_eq!(updated["status"], "ok");
    assert_eq!(updated["entry"]["text"], "final");

    let history = json_of(&gloss(home, "alice", &["--format", "json", "history", &entry_ref]));
    let texts: Vec<&str> = history["versions"]
        .as_array()
        .expect("versions")
        .iter()
        .map(|v| v["text"].as_str().expect("text"))
        .collect();
    assert_eq!(texts, vec!["final", "draft"]);

    let not_mine = json_of(&gloss(
        home,
        "bob",
        &["--format", "json", "remove", &entry_ref],
    ));
    assert_eq!(not_mine["status"], "not_found");
}
