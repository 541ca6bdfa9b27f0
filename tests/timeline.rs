use gloss::core::identity::Identity;
use gloss::core::kv::VersionedKv;
use gloss::core::kv_sqlite::SqliteKv;
use gloss::core::time;
use gloss::plugins::chain::{self, DayChain, LogEntry};
use gloss::plugins::timeline::{self, DedupIdentity, ListFilter, ReadMode, ReconstructOptions};
use tempfile::{TempDir, tempdir};

const DAY: &str = "2025-10-06";

fn setup() -> (TempDir, SqliteKv) {
    let tmp = tempdir().expect("tempdir");
    let kv = SqliteKv::open(tmp.path()).expect("open kv");
    (tmp, kv)
}

fn who(name: &str) -> Identity {
    Identity::new(name).expect("identity")
}

fn entry(at: &str, text: &str, tags: &[&str]) -> LogEntry {
    LogEntry::new(
        time::parse_at(at).expect("timestamp"),
        text,
        tags.iter().map(|t| t.to_string()).collect(),
        vec![],
    )
}

fn texts(entries: &[LogEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.text.as_str()).collect()
}

#[test]
fn concrete_two_entry_day_lists_in_order_without_duplicates() {
    let (_tmp, kv) = setup();
    let me = who("writer-1");
    chain::append(
        &kv,
        &me,
        DAY,
        entry("2025-10-06T10:00:00Z", "fixed bug", &["infra"]),
    )
    .unwrap();
    chain::append(&kv, &me, DAY, entry("2025-10-06T14:00:00Z", "shipped release", &[])).unwrap();

    let out = timeline::list_day(&kv, &me, DAY, &ReconstructOptions::default()).unwrap();
    assert_eq!(texts(&out), vec!["fixed bug", "shipped release"]);
    assert_eq!(out[0].tags, vec!["infra"]);
    assert!(out[1].tags.is_empty());
    assert!(out.iter().all(|e| e.controller.as_deref() == Some("writer-1")));
}

#[test]
fn three_appends_yield_three_entries_not_six() {
    let (_tmp, kv) = setup();
    let me = who("alice");
    for (at, text) in [
        ("2025-10-06T09:00:00Z", "E1"),
        ("2025-10-06T10:00:00Z", "E2"),
        ("2025-10-06T11:00:00Z", "E3"),
    ] {
        chain::append(&kv, &me, DAY, entry(at, text, &[])).unwrap();
    }

    let records = kv
        .get(
            &me,
            &chain::day_store_key(DAY),
            &gloss::core::kv::GetOptions::all_with_history(),
        )
        .unwrap();
    assert_eq!(records[0].history.len(), 2, "three versions stored");

    let out = timeline::list_day(&kv, &me, DAY, &ReconstructOptions::default()).unwrap();
    assert_eq!(texts(&out), vec!["E1", "E2", "E3"]);
}

#[test]
fn entries_from_two_controllers_interleave_by_time() {
    let (_tmp, kv) = setup();
    let a = who("controller-a");
    let b = who("controller-b");
    chain::append(&kv, &a, DAY, entry("2025-10-06T08:00:00Z", "t1", &[])).unwrap();
    chain::append(&kv, &b, DAY, entry("2025-10-06T09:00:00Z", "t2", &[])).unwrap();
    chain::append(&kv, &a, DAY, entry("2025-10-06T10:00:00Z", "t3", &[])).unwrap();

    let out = timeline::list_day(&kv, &b, DAY, &ReconstructOptions::default()).unwrap();
    let got: Vec<(&str, &str)> = out
        .iter()
        .map(|e| (e.text.as_str(), e.controller.as_deref().unwrap()))
        .collect();
    assert_eq!(
        got,
        vec![
            ("t1", "controller-a"),
            ("t2", "controller-b"),
            ("t3", "controller-a"),
        ]
    );
}

#[test]
fn reconstruction_is_idempotent() {
    let (_tmp, kv) = setup();
    let a = who("a");
    let b = who("b");
    chain::append(&kv, &a, DAY, entry("2025-10-06T08:00:00Z", "x", &["t"])).unwrap();
    chain::append(&kv, &b, DAY, entry("2025-10-06T08:00:00Z", "y", &[])).unwrap();
    chain::append(&kv, &a, DAY, entry("2025-10-06T07:00:00Z", "z", &[])).unwrap();

    let opts = ReconstructOptions::default();
    let first = timeline::list_day(&kv, &a, DAY, &opts).unwrap();
    let second = timeline::list_day(&kv, &a, DAY, &opts).unwrap();
    assert_eq!(first, second);
    assert_eq!(texts(&first), vec!["z", "x", "y"]);
}

#[test]
fn empty_day_is_empty_not_an_error() {
    let (_tmp, kv) = setup();
    let out = timeline::list_day(&kv, &who("a"), "2099-01-01", &ReconstructOptions::default())
        .unwrap();
    assert!(out.is_empty());
}

#[test]
fn invalid_day_is_rejected() {
    let (_tmp, kv) = setup();
    let err = timeline::list_day(&kv, &who("a"), "10/06/2025", &ReconstructOptions::default())
        .unwrap_err();
    assert!(err.to_string().contains("YYYY-MM-DD"));
}

#[test]
fn corrupt_historical_version_is_skipped() {
    let (_tmp, kv) = setup();
    let me = who("alice");
    let key = chain::day_store_key(DAY);
    let e1 = entry("2025-10-06T09:00:00Z", "E1", &[]);
    let e2 = entry("2025-10-06T10:00:00Z", "E2", &[]);

    let v1 = DayChain {
        key: DAY.into(),
        logs: vec![e1.clone()],
        retracted: vec![],
    };
    let v3 = DayChain {
        key: DAY.into(),
        logs: vec![e1, e2],
        retracted: vec![],
    };
    kv.set(&me, &key, &chain::encode_chain(&v1).unwrap()).unwrap();
    kv.set(&me, &key, "{\"key\": \"2025-10-06\", \"logs\": [").unwrap();
    kv.set(&me, &key, &chain::encode_chain(&v3).unwrap()).unwrap();

    let other = who("bob");
    kv.set(&other, &key, "not even json").unwrap();

    let report =
        timeline::list_day_report(&kv, &me, DAY, &ReconstructOptions::default()).unwrap();
    assert_eq!(texts(&report.entries), vec!["E1", "E2"]);
    assert!(report.is_degraded());
    assert_eq!(report.skipped.len(), 2);
    assert!(report.skipped.iter().any(|s| s.controller == "alice" && s.version == 2));
    assert!(report.skipped.iter().any(|s| s.controller == "bob" && s.version == 1));
}

#[test]
fn get_matches_list_day() {
    let (_tmp, kv) = setup();
    let me = who("alice");
    chain::append(&kv, &me, DAY, entry("2025-10-06T09:00:00Z", "E1", &[])).unwrap();
    let opts = ReconstructOptions::default();
    assert_eq!(
        timeline::get(&kv, &me, DAY, &opts).unwrap(),
        timeline::list_day(&kv, &me, DAY, &opts).unwrap()
    );
}

#[test]
fn controller_scoped_dedup_keeps_coincident_entries() {
    let (_tmp, kv) = setup();
    let a = who("a");
    let b = who("b");
    chain::append(&kv, &a, DAY, entry("2025-10-06T09:00:00Z", "standup", &[])).unwrap();
    chain::append(&kv, &b, DAY, entry("2025-10-06T09:00:00Z", "standup", &[])).unwrap();

    let merged = timeline::list_day(&kv, &a, DAY, &ReconstructOptions::default()).unwrap();
    assert_eq!(merged.len(), 1);

    let scoped = ReconstructOptions {
        dedup: DedupIdentity::ControllerScoped,
        ..Default::default()
    };
    let kept = timeline::list_day(&kv, &a, DAY, &scoped).unwrap();
    assert_eq!(kept.len(), 2);
}

#[test]
fn current_only_mode_matches_history_for_plain_appends() {
    let (_tmp, kv) = setup();
    let a = who("a");
    let b = who("b");
    chain::append(&kv, &a, DAY, entry("2025-10-06T09:00:00Z", "1", &[])).unwrap();
    chain::append(&kv, &a, DAY, entry("2025-10-06T11:00:00Z", "3", &[])).unwrap();
    chain::append(&kv, &b, DAY, entry("2025-10-06T10:00:00Z", "2", &[])).unwrap();

    let current = ReconstructOptions {
        read_mode: ReadMode::CurrentOnly,
        ..Default::default()
    };
    assert_eq!(
        timeline::list_day(&kv, &a, DAY, &current).unwrap(),
        timeline::list_day(&kv, &a, DAY, &ReconstructOptions::default()).unwrap()
    );
}

#[test]
fn filtered_listing_applies_tags_controller_and_limit() {
    let (_tmp, kv) = setup();
    let a = who("aaaa1111");
    let b = who("bbbb2222");
    chain::append(&kv, &a, DAY, entry("2025-10-06T09:00:00Z", "a1", &["infra"])).unwrap();
    chain::append(&kv, &b, DAY, entry("2025-10-06T10:00:00Z", "b1", &["auth"])).unwrap();
    chain::append(&kv, &a, DAY, entry("2025-10-06T11:00:00Z", "a2", &["infra", "auth"])).unwrap();

    let opts = ReconstructOptions::default();
    let by_tag = ListFilter {
        tags: vec!["auth".into()],
        ..Default::default()
    };
    let out = timeline::list_day_filtered(&kv, &a, DAY, &opts, &by_tag).unwrap();
    assert_eq!(texts(&out.entries), vec!["b1", "a2"]);

    let by_controller = ListFilter {
        controller: Some("aaaa".into()),
        limit: Some(1),
        ..Default::default()
    };
    let out = timeline::list_day_filtered(&kv, &a, DAY, &opts, &by_controller).unwrap();
    assert_eq!(texts(&out.entries), vec!["a1"]);
}

#[test]
fn sub_millisecond_timestamps_survive_rewrites_without_duplicates() {
    let (_tmp, kv) = setup();
    let me = who("alice");
    let seeded = r#"{"key":"2025-10-06","logs":[{"key":"2025-10-06","at":"2025-10-06T10:00:00.123456Z","text":"fixed bug"}]}"#;
    kv.set(&me, &chain::day_store_key(DAY), seeded).unwrap();

    chain::append(&kv, &me, DAY, entry("2025-10-06T14:00:00Z", "shipped release", &[])).unwrap();

    let out = timeline::list_day(&kv, &me, DAY, &ReconstructOptions::default()).unwrap();
    assert_eq!(texts(&out), vec!["fixed bug", "shipped release"]);
    assert_eq!(time::format_at(&out[0].at), "2025-10-06T10:00:00.123456Z");

    let own = chain::load_own_chain(&kv, &me, DAY).unwrap();
    let rewritten = chain::encode_chain(&own).unwrap();
    assert!(rewritten.contains("2025-10-06T10:00:00.123456Z"));
}
