//! Day chains and the chain writer.
//!
//! A controller's entries for one day live under a single store key,
//! `entry/<YYYY-MM-DD>`. Every write stores the *whole* chain again, so each
//! stored version is a cumulative snapshot: version N holds every entry the
//! controller had appended when version N was written.
//!
//! Retraction (update/remove) is expressed the same way: the new snapshot
//! drops the entry from `logs` and records its [`EntryId`] in `retracted`,
//! which is itself cumulative. Readers that walk history use the newest
//! snapshot's `retracted` list to suppress entries still present in older
//! versions.

use crate::core::error::GlossError;
use crate::core::identity::Identity;
use crate::core::kv::{GetOptions, KvRecord, VersionedKv};
use crate::core::time;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

const STORE_KEY_PREFIX: &str = "entry/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub key: String,
    #[serde(with = "at_format")]
    pub at: DateTime<Utc>,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assets: Vec<String>,
    /// Attached on read from the store's attribution; never persisted by the writer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
}

impl LogEntry {
    /// Build an entry keyed to the UTC day `at` falls on.
    pub fn new(at: DateTime<Utc>, text: &str, tags: Vec<String>, assets: Vec<String>) -> Self {
        Self {
            key: time::day_of(&at),
            at,
            text: text.to_string(),
            tags: normalize_tags(tags),
            assets,
            controller: None,
        }
    }

    pub fn id(&self) -> EntryId {
        EntryId {
            at: self.at,
            text: self.text.clone(),
        }
    }

    pub fn entry_ref(&self) -> EntryRef {
        EntryRef::of(self)
    }
}

/// Trim, drop empties and drop repeats while keeping first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// Split a comma-separated tag list as typed on the command line.
pub fn parse_tags_csv(csv: &str) -> Vec<String> {
    normalize_tags(csv.split(',').map(str::to_string).collect())
}

/// Identity of a logical entry for deduplication: `(at, text)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId {
    #[serde(with = "at_format")]
    pub at: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayChain {
    pub key: String,
    pub logs: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retracted: Vec<EntryId>,
}

impl DayChain {
    pub fn empty(day: &str) -> Self {
        Self {
            key: day.to_string(),
            logs: Vec::new(),
            retracted: Vec::new(),
        }
    }

    fn retract(&mut self, id: EntryId) {
        if !self.retracted.contains(&id) {
            self.retracted.push(id);
        }
    }

    fn unretract(&mut self, id: &EntryId) {
        self.retracted.retain(|r| r != id);
    }

    fn push(&mut self, mut entry: LogEntry) {
        entry.controller = None;
        self.unretract(&entry.id());
        self.logs.push(entry);
    }

    fn position_of(&self, entry_ref: &EntryRef) -> Option<usize> {
        self.logs.iter().position(|e| entry_ref.matches(e))
    }
}

/// Human-addressable handle for an entry: `YYYY-MM-DD/HHmmss-SSS` (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryRef {
    pub day: String,
    pub time: String,
}

fn entry_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2})/(\d{6}-\d{3})$").expect("entry ref pattern is valid")
    })
}

impl EntryRef {
    pub fn of(entry: &LogEntry) -> Self {
        Self {
            day: entry.key.clone(),
            time: entry.at.format("%H%M%S-%3f").to_string(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, GlossError> {
        let caps = entry_ref_re().captures(raw.trim()).ok_or_else(|| {
            GlossError::ValidationError(format!(
                "Invalid entry ref '{}': expected YYYY-MM-DD/HHmmss-SSS",
                raw
            ))
        })?;
        let day = caps[1].to_string();
        time::parse_day(&day)?;
        Ok(Self {
            day,
            time: caps[2].to_string(),
        })
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        entry.key == self.day && entry.at.format("%H%M%S-%3f").to_string() == self.time
    }
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.day, self.time)
    }
}

pub fn day_store_key(day: &str) -> String {
    format!("{}{}", STORE_KEY_PREFIX, day)
}

pub fn encode_chain(chain: &DayChain) -> Result<String, GlossError> {
    serde_json::to_string(chain).map_err(|e| GlossError::ValidationError(e.to_string()))
}

/// Decode one stored value. A value for a different day counts as corrupt.
pub fn decode_chain(day: &str, raw: &str) -> Result<DayChain, GlossError> {
    let chain: DayChain =
        serde_json::from_str(raw).map_err(|e| GlossError::CorruptSnapshot {
            key: day_store_key(day),
            reason: e.to_string(),
        })?;
    if chain.key != day {
        return Err(GlossError::CorruptSnapshot {
            key: day_store_key(day),
            reason: format!("snapshot is for day '{}'", chain.key),
        });
    }
    Ok(chain)
}

fn own_record<K: VersionedKv + ?Sized>(
    kv: &K,
    identity: &Identity,
    day: &str,
) -> Result<Option<KvRecord>, GlossError> {
    let records = kv.get(identity, &day_store_key(day), &GetOptions::own_current())?;
    Ok(records
        .into_iter()
        .find(|r| r.controller == identity.as_str()))
}

/// The caller's current chain for `day`, or an empty one. Corruption is an error.
pub fn load_own_chain<K: VersionedKv + ?Sized>(
    kv: &K,
    identity: &Identity,
    day: &str,
) -> Result<DayChain, GlossError> {
    time::parse_day(day)?;
    match own_record(kv, identity, day)? {
        Some(rec) => decode_chain(day, &rec.current.value),
        None => Ok(DayChain::empty(day)),
    }
}

fn store_chain<K: VersionedKv + ?Sized>(
    kv: &K,
    identity: &Identity,
    chain: &DayChain,
) -> Result<(), GlossError> {
    let value = encode_chain(chain)?;
    kv.set(identity, &day_store_key(&chain.key), &value)
}

/// Append `entry` to the caller's chain for `day` and store the new snapshot.
pub fn append<K: VersionedKv + ?Sized>(
    kv: &K,
    identity: &Identity,
    day: &str,
    entry: LogEntry,
) -> Result<(), GlossError> {
    if entry.key != day {
        return Err(GlossError::ValidationError(format!(
            "Entry key '{}' does not match day '{}'",
            entry.key, day
        )));
    }
    let mut chain = load_own_chain(kv, identity, day)?;
    chain.push(entry);
    tracing::debug!(day, controller = %identity.short(), entries = chain.logs.len(), "append");
    store_chain(kv, identity, &chain)
}

/// Log `text` now, returning the stored entry attributed to the caller.
pub fn log_now<K: VersionedKv + ?Sized>(
    kv: &K,
    identity: &Identity,
    text: &str,
    tags: Vec<String>,
    assets: Vec<String>,
) -> Result<LogEntry, GlossError> {
    let entry = LogEntry::new(time::now_millis(), text, tags, assets);
    let day = entry.key.clone();
    append(kv, identity, &day, entry.clone())?;
    Ok(LogEntry {
        controller: Some(identity.to_string()),
        ..entry
    })
}

/// Replace the caller's entry at `entry_ref` with new text (and optionally new tags).
/// The replacement keeps the original timestamp and assets. `None` when the caller
/// has no live entry at that ref.
pub fn update_entry<K: VersionedKv + ?Sized>(
    kv: &K,
    identity: &Identity,
    entry_ref: &EntryRef,
    new_text: &str,
    new_tags: Option<Vec<String>>,
) -> Result<Option<LogEntry>, GlossError> {
    let mut chain = load_own_chain(kv, identity, &entry_ref.day)?;
    let Some(idx) = chain.position_of(entry_ref) else {
        return Ok(None);
    };
    let old = chain.logs.remove(idx);
    let replacement = LogEntry {
        key: old.key.clone(),
        at: old.at,
        text: new_text.to_string(),
        tags: new_tags.map(normalize_tags).unwrap_or_else(|| old.tags.clone()),
        assets: old.assets.clone(),
        controller: None,
    };
    if replacement.id() != old.id() {
        chain.retract(old.id());
    }
    chain.push(replacement.clone());
    store_chain(kv, identity, &chain)?;
    Ok(Some(LogEntry {
        controller: Some(identity.to_string()),
        ..replacement
    }))
}

/// Retract the caller's entry at `entry_ref`. Returns false if there was none.
pub fn remove_entry<K: VersionedKv + ?Sized>(
    kv: &K,
    identity: &Identity,
    entry_ref: &EntryRef,
) -> Result<bool, GlossError> {
    let mut chain = load_own_chain(kv, identity, &entry_ref.day)?;
    let Some(idx) = chain.position_of(entry_ref) else {
        return Ok(false);
    };
    let old = chain.logs.remove(idx);
    chain.retract(old.id());
    store_chain(kv, identity, &chain)?;
    Ok(true)
}

/// Retract every live entry the caller has for `day`. Returns false if there were none.
pub fn remove_day<K: VersionedKv + ?Sized>(
    kv: &K,
    identity: &Identity,
    day: &str,
) -> Result<bool, GlossError> {
    let mut chain = load_own_chain(kv, identity, day)?;
    if chain.logs.is_empty() {
        return Ok(false);
    }
    for entry in std::mem::take(&mut chain.logs) {
        chain.retract(entry.id());
    }
    store_chain(kv, identity, &chain)?;
    Ok(true)
}

mod at_format {
    use crate::core::time;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&time::format_at(at))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        time::parse_at(&raw).map_err(serde::de::Error::custom)
    }
}
