//! Shared timestamp/day-key helpers and the command response envelope.

use crate::core::error::GlossError;
use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use serde_json::Value as JsonValue;
use ulid::Ulid;

/// Fixed-width day key format (`YYYY-MM-DD`).
pub const DAY_FORMAT: &str = "%Y-%m-%d";

/// Current instant truncated to millisecond resolution, the precision entries are stored at.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// RFC 3339 with a `Z` suffix. Millisecond-aligned instants render with exactly
/// three fraction digits (`2025-10-06T10:00:00.000Z`); finer instants keep every
/// digit so that `parse_at(format_at(t)) == t` always holds.
pub fn format_at(at: &DateTime<Utc>) -> String {
    let precision = if at.timestamp_subsec_nanos() % 1_000_000 == 0 {
        SecondsFormat::Millis
    } else {
        SecondsFormat::AutoSi
    };
    at.to_rfc3339_opts(precision, true)
}

pub fn now_rfc3339() -> String {
    format_at(&now_millis())
}

pub fn parse_at(raw: &str) -> Result<DateTime<Utc>, GlossError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GlossError::ValidationError(format!("Invalid timestamp '{}': {}", raw, e)))
}

/// Validate a day key. Only the canonical zero-padded form is accepted so keys stay
/// lexically sortable.
pub fn parse_day(raw: &str) -> Result<NaiveDate, GlossError> {
    let date = NaiveDate::parse_from_str(raw, DAY_FORMAT).map_err(|_| {
        GlossError::ValidationError(format!("Invalid day '{}': expected YYYY-MM-DD", raw))
    })?;
    if date.format(DAY_FORMAT).to_string() != raw {
        return Err(GlossError::ValidationError(format!(
            "Invalid day '{}': expected YYYY-MM-DD",
            raw
        )));
    }
    Ok(date)
}

/// Day key an instant belongs to (UTC calendar day).
pub fn day_of(at: &DateTime<Utc>) -> String {
    at.date_naive().format(DAY_FORMAT).to_string()
}

pub fn today_key() -> String {
    day_of(&Utc::now())
}

pub fn new_event_id() -> String {
    Ulid::new().to_string()
}

/// Standard command response envelope shape used across CLI surfaces.
pub fn command_envelope(cmd: &str, status: &str, extra: JsonValue) -> JsonValue {
    let mut base = serde_json::json!({
        "envelope_version": "1.0.0",
        "ts": now_rfc3339(),
        "event_id": new_event_id(),
        "cmd": cmd,
        "status": status
    });
    if let (Some(base_obj), Some(extra_obj)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            base_obj.insert(k.clone(), v.clone());
        }
    }
    base
}
