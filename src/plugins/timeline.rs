//! Timeline reconstruction.
//!
//! Reads every controller's chain for a day (current value plus history),
//! decodes each stored version independently, stamps entries with the
//! controller the store attributes the version to, drops retracted entries,
//! collapses the overlap that cumulative snapshots produce, and sorts by time.
//!
//! Ordering is `at` ascending, then `text`, then `controller` (all lexical for
//! the tie-breaks). Among duplicates of one identity the copy from the newest
//! version of the lexically first controller wins.

use crate::core::config::GlossConfig;
use crate::core::error::GlossError;
use crate::core::identity::Identity;
use crate::core::kv::{GetOptions, KvRecord, KvVersion, VersionedKv};
use crate::core::time;
use crate::plugins::chain::{self, DayChain, EntryId, EntryRef, LogEntry};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Which stored versions feed reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadMode {
    /// Current value and every superseded value of every controller.
    #[default]
    #[serde(rename = "history")]
    FullHistory,
    /// Each controller's current value only.
    #[serde(rename = "current")]
    CurrentOnly,
}

impl FromStr for ReadMode {
    type Err = GlossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "history" => Ok(ReadMode::FullHistory),
            "current" => Ok(ReadMode::CurrentOnly),
            other => Err(GlossError::ConfigError(format!(
                "Invalid read mode '{}': expected 'history' or 'current'",
                other
            ))),
        }
    }
}

/// What counts as "the same entry" when collapsing duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DedupIdentity {
    /// `(at, text)`; identical entries from different controllers collapse.
    #[default]
    #[serde(rename = "entry")]
    Entry,
    /// `(controller, at, text)`.
    #[serde(rename = "controller")]
    ControllerScoped,
}

impl FromStr for DedupIdentity {
    type Err = GlossError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entry" => Ok(DedupIdentity::Entry),
            "controller" => Ok(DedupIdentity::ControllerScoped),
            other => Err(GlossError::ConfigError(format!(
                "Invalid dedup identity '{}': expected 'entry' or 'controller'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconstructOptions {
    pub read_mode: ReadMode,
    pub dedup: DedupIdentity,
}

impl From<&GlossConfig> for ReconstructOptions {
    fn from(cfg: &GlossConfig) -> Self {
        Self {
            read_mode: cfg.read_mode,
            dedup: cfg.dedup,
        }
    }
}

/// A stored version that could not be decoded and was left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedVersion {
    pub controller: String,
    pub version: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconstruction {
    pub day: String,
    pub entries: Vec<LogEntry>,
    pub skipped: Vec<SkippedVersion>,
}

impl Reconstruction {
    /// True when at least one stored version was unreadable.
    pub fn is_degraded(&self) -> bool {
        !self.skipped.is_empty()
    }
}

type DedupKey = (Option<String>, EntryId);

fn dedup_key(mode: DedupIdentity, entry: &LogEntry) -> DedupKey {
    let controller = match mode {
        DedupIdentity::Entry => None,
        DedupIdentity::ControllerScoped => entry.controller.clone(),
    };
    (controller, entry.id())
}

pub fn compare_timeline(a: &LogEntry, b: &LogEntry) -> Ordering {
    a.at.cmp(&b.at)
        .then_with(|| a.text.cmp(&b.text))
        .then_with(|| a.controller.cmp(&b.controller))
}

fn selected_versions(rec: &KvRecord, mode: ReadMode) -> Vec<&KvVersion> {
    match mode {
        ReadMode::FullHistory => rec.versions_ascending(),
        ReadMode::CurrentOnly => vec![&rec.current],
    }
}

/// Decode a record's versions newest first, recording the ones that fail.
fn decode_newest_first(
    day: &str,
    rec: &KvRecord,
    mode: ReadMode,
    skipped: &mut Vec<SkippedVersion>,
) -> Vec<DayChain> {
    let mut decoded = Vec::new();
    for v in selected_versions(rec, mode).into_iter().rev() {
        match chain::decode_chain(day, &v.value) {
            Ok(c) => decoded.push(c),
            Err(e) => {
                tracing::warn!(
                    day,
                    controller = %rec.controller,
                    version = v.version,
                    error = %e,
                    "skipping unreadable day chain version"
                );
                skipped.push(SkippedVersion {
                    controller: rec.controller.clone(),
                    version: v.version,
                    reason: e.to_string(),
                });
            }
        }
    }
    decoded
}

/// Merge already-fetched records into one timeline. Pure; never fails.
pub fn reconstruct(day: &str, records: &[KvRecord], opts: &ReconstructOptions) -> Reconstruction {
    let mut ordered: Vec<&KvRecord> = records.iter().collect();
    ordered.sort_by(|a, b| a.controller.cmp(&b.controller));

    let mut seen: FxHashSet<DedupKey> = FxHashSet::default();
    let mut entries: Vec<LogEntry> = Vec::new();
    let mut skipped: Vec<SkippedVersion> = Vec::new();
    let mut versions_read = 0usize;

    for rec in ordered {
        let decoded = decode_newest_first(day, rec, opts.read_mode, &mut skipped);
        versions_read += decoded.len();

        // Retractions are cumulative, so the newest readable snapshot is authoritative.
        let retracted: FxHashSet<EntryId> = decoded
            .first()
            .map(|c| c.retracted.iter().cloned().collect())
            .unwrap_or_default();

        for snapshot in decoded {
            for mut entry in snapshot.logs {
                if retracted.contains(&entry.id()) {
                    continue;
                }
                entry.controller = Some(rec.controller.clone());
                if seen.insert(dedup_key(opts.dedup, &entry)) {
                    entries.push(entry);
                }
            }
        }
    }

    entries.sort_by(compare_timeline);
    tracing::debug!(
        day,
        controllers = records.len(),
        versions = versions_read,
        entries = entries.len(),
        skipped = skipped.len(),
        "reconstructed day"
    );

    Reconstruction {
        day: day.to_string(),
        entries,
        skipped,
    }
}

/// Fetch and reconstruct one day, reporting any versions that were skipped.
pub fn list_day_report<K: VersionedKv + ?Sized>(
    kv: &K,
    identity: &Identity,
    day: &str,
    opts: &ReconstructOptions,
) -> Result<Reconstruction, GlossError> {
    time::parse_day(day)?;
    let get_opts = match opts.read_mode {
        ReadMode::FullHistory => GetOptions::all_with_history(),
        ReadMode::CurrentOnly => GetOptions::all_current(),
    };
    let records = kv.get(identity, &chain::day_store_key(day), &get_opts)?;
    Ok(reconstruct(day, &records, opts))
}

/// Deduplicated, time-ordered entries for `day` across all controllers.
pub fn list_day<K: VersionedKv + ?Sized>(
    kv: &K,
    identity: &Identity,
    day: &str,
    opts: &ReconstructOptions,
) -> Result<Vec<LogEntry>, GlossError> {
    Ok(list_day_report(kv, identity, day, opts)?.entries)
}

/// Entries for one record key. Records are keyed by day, so this is `list_day`.
pub fn get<K: VersionedKv + ?Sized>(
    kv: &K,
    identity: &Identity,
    key: &str,
    opts: &ReconstructOptions,
) -> Result<Vec<LogEntry>, GlossError> {
    list_day(kv, identity, key, opts)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Keep entries carrying at least one of these tags. Empty keeps all.
    pub tags: Vec<String>,
    /// Exact controller, or a prefix of one (as shown in short listings).
    pub controller: Option<String>,
    pub limit: Option<usize>,
}

impl ListFilter {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.controller.is_none() && self.limit.is_none()
    }

    pub fn accepts(&self, entry: &LogEntry) -> bool {
        let tags_ok = self.tags.is_empty() || self.tags.iter().any(|t| entry.tags.contains(t));
        let controller_ok = match (&self.controller, &entry.controller) {
            (None, _) => true,
            (Some(want), Some(have)) => have.starts_with(want.as_str()),
            (Some(_), None) => false,
        };
        tags_ok && controller_ok
    }

    pub fn apply(&self, entries: Vec<LogEntry>) -> Vec<LogEntry> {
        let filtered = entries.into_iter().filter(|e| self.accepts(e));
        match self.limit {
            Some(n) => filtered.take(n).collect(),
            None => filtered.collect(),
        }
    }
}

pub fn list_day_filtered<K: VersionedKv + ?Sized>(
    kv: &K,
    identity: &Identity,
    day: &str,
    opts: &ReconstructOptions,
    filter: &ListFilter,
) -> Result<Reconstruction, GlossError> {
    let mut report = list_day_report(kv, identity, day, opts)?;
    if !filter.is_empty() {
        report.entries = filter.apply(std::mem::take(&mut report.entries));
    }
    Ok(report)
}

/// Every distinct content variant ever stored for the entry at `entry_ref`,
/// grouped by controller (lexical) and newest first within each controller.
pub fn entry_history<K: VersionedKv + ?Sized>(
    kv: &K,
    identity: &Identity,
    entry_ref: &EntryRef,
) -> Result<Vec<LogEntry>, GlossError> {
    let day = entry_ref.day.as_str();
    let records = kv.get(
        identity,
        &chain::day_store_key(day),
        &GetOptions::all_with_history(),
    )?;
    let mut ordered: Vec<&KvRecord> = records.iter().collect();
    ordered.sort_by(|a, b| a.controller.cmp(&b.controller));

    let mut out = Vec::new();
    let mut skipped = Vec::new();
    for rec in ordered {
        let mut variants: Vec<LogEntry> = Vec::new();
        // Oldest first so each variant is placed at its first appearance.
        for snapshot in decode_newest_first(day, rec, ReadMode::FullHistory, &mut skipped)
            .into_iter()
            .rev()
        {
            for mut entry in snapshot.logs.into_iter().filter(|e| entry_ref.matches(e)) {
                entry.controller = Some(rec.controller.clone());
                if !variants.contains(&entry) {
                    variants.push(entry);
                }
            }
        }
        variants.reverse();
        out.extend(variants);
    }
    Ok(out)
}
