//! Text rendering helpers for CLI surfaces.

use crate::core::identity::short_controller;
use crate::plugins::chain::LogEntry;
use colored::Colorize;
use std::fmt::Write;

pub const RULE_WIDTH: usize = 50;

/// Collapse newlines/extra whitespace and bound length for terminal display.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut chars = collapsed.chars();
    let preview: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", preview)
    } else {
        preview
    }
}

/// Render up to `max_items` messages with compact formatting.
pub fn preview_messages(messages: &[String], max_items: usize, max_chars: usize) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let shown = messages
        .iter()
        .take(max_items)
        .map(|m| compact_line(m, max_chars))
        .collect::<Vec<_>>()
        .join(" | ");
    if messages.len() > max_items {
        format!("{} (+{} more)", shown, messages.len() - max_items)
    } else {
        shown
    }
}

pub fn rule() -> String {
    "─".repeat(RULE_WIDTH)
}

/// One entry as a heading line, its text, and one line per asset.
pub fn render_entry(entry: &LogEntry, time_format: &str) -> String {
    let mut out = String::new();
    let tags = if entry.tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", entry.tags.join(","))
    };
    let controller = entry
        .controller
        .as_deref()
        .map(|c| format!(" ({}...)", short_controller(c)))
        .unwrap_or_default();
    let _ = writeln!(
        out,
        "{} {}{}{}",
        entry.at.format(time_format).to_string().bold(),
        entry.entry_ref(),
        tags.cyan(),
        controller.dimmed()
    );
    let _ = writeln!(out, "  {}", entry.text);
    for asset in &entry.assets {
        let _ = writeln!(out, "  📎 {}", asset);
    }
    out
}

pub fn render_entries(title: &str, entries: &[LogEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", title.bold());
    let _ = writeln!(out, "{}", rule());
    for entry in entries {
        let _ = writeln!(out, "{}", render_entry(entry, "%H:%M"));
    }
    out
}
