//! gloss: build. log. ship.
//!
//! Many writers append timestamped, tagged entries into per-day chains on a
//! versioned key-value store; any reader reconstructs one deduplicated,
//! time-ordered timeline for a day across all writers.
//!
//! # Architecture
//!
//! ## Snapshot chains
//!
//! Each controller (writer identity) owns one value per day under
//! `entry/<YYYY-MM-DD>`. Every append rewrites the whole chain, so the store's
//! version history for that `(key, controller)` is a sequence of cumulative
//! snapshots. See [`plugins::chain`].
//!
//! ## Reconstruction
//!
//! Readers fetch every controller's current value and history, decode each
//! version on its own (unreadable ones are skipped and reported), stamp
//! entries with the store's attribution, collapse duplicates by `(at, text)`
//! and sort by time. See [`plugins::timeline`].
//!
//! ## Stores
//!
//! [`core::kv::VersionedKv`] is the storage contract; [`core::kv_sqlite`]
//! implements it locally. Uploaded assets go through
//! [`plugins::assets::BlobUploader`].
//!
//! # Examples
//!
//! ```bash
//! gloss log "fixed bug" -t infra
//! gloss snap ./screenshot.png -c "new dashboard"
//! gloss today --tags infra
//! gloss list 2025-10-06 --controller 02ab12cd
//! gloss update 2025-10-06/100000-000 "fixed the auth bug"
//! gloss history 2025-10-06/100000-000
//! ```

pub mod cli;
pub mod core;
pub mod plugins;
mod subsystems;

use crate::cli::{Cli, Command, FilterArgs, OutputFormat};
use crate::core::config::GlossConfig;
use crate::core::error::GlossError;
use crate::core::identity::Identity;
use crate::core::kv_sqlite::SqliteKv;
use crate::core::store::Store;
use crate::core::{broker, logging, output, time};
use crate::plugins::assets::LocalBlobStore;
use crate::plugins::chain::{self, EntryRef, LogEntry};
use crate::plugins::timeline::{self, ReconstructOptions, Reconstruction};
use clap::Parser;
use serde_json::Value as JsonValue;
use std::process::ExitCode;

struct Context {
    store: Store,
    config: GlossConfig,
    identity: Identity,
    kv: SqliteKv,
    format: OutputFormat,
}

impl Context {
    fn open(cli: &Cli) -> Result<Self, GlossError> {
        let store = Store::resolve(cli.home.as_deref())?;
        store.ensure_dir()?;
        let config = GlossConfig::load(&store.root)?;
        let identity = match cli.identity.as_deref() {
            Some(raw) => Identity::new(raw)?,
            None => Identity::load_or_create(&store.root)?,
        };
        let kv = SqliteKv::open(&store.root)?;
        Ok(Self {
            store,
            config,
            identity,
            kv,
            format: cli.format,
        })
    }

    fn read_opts(&self) -> ReconstructOptions {
        ReconstructOptions::from(&self.config)
    }

    fn emit(&self, cmd: &str, status: &str, extra: JsonValue, text: impl FnOnce() -> String) {
        match self.format {
            OutputFormat::Json => {
                let envelope = time::command_envelope(cmd, status, extra);
                println!(
                    "{}",
                    serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| envelope.to_string())
                );
            }
            OutputFormat::Text => print!("{}", text()),
        }
    }
}

pub fn run() -> Result<ExitCode, GlossError> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let ctx = Context::open(&cli)?;
    tracing::debug!(root = %ctx.store.root.display(), identity = %ctx.identity.short(), "store opened");

    match &cli.command {
        Command::Init => cmd_init(&ctx),
        Command::Log { message, tags } => cmd_log(&ctx, message, tags.as_deref()),
        Command::Snap { path, caption } => {
            let uploader = LocalBlobStore::new(&ctx.store.root, &ctx.config.uhrp_url);
            let entry = plugins::assets::log_with_asset(
                &ctx.kv,
                &uploader,
                &ctx.identity,
                path,
                caption,
                ctx.config.retention_minutes,
            )?;
            ctx.emit("snap", "ok", serde_json::json!({ "entry": entry }), || {
                format!(
                    "Uploaded ✓  {}\nLogged ✓   Ref: {}\nCaption: {}\n",
                    entry.assets.first().map(String::as_str).unwrap_or(""),
                    entry.entry_ref(),
                    if caption.is_empty() { "none" } else { caption.as_str() }
                )
            });
            Ok(ExitCode::SUCCESS)
        }
        Command::List { day, filter } => cmd_list(&ctx, day, filter, false),
        Command::Today { filter } => cmd_list(&ctx, &time::today_key(), filter, true),
        Command::Get { key } => cmd_get(&ctx, key),
        Command::Update {
            entry_ref,
            new_text,
            tags,
        } => cmd_update(&ctx, entry_ref, new_text, tags.as_deref()),
        Command::Remove { entry_ref } => cmd_remove(&ctx, entry_ref),
        Command::RemoveDay { day, confirm } => cmd_remove_day(&ctx, day, *confirm),
        Command::History { entry_ref } => cmd_history(&ctx, entry_ref),
        Command::Whoami => {
            ctx.emit(
                "whoami",
                "ok",
                serde_json::json!({ "identity": ctx.identity.as_str(), "root": ctx.store.root }),
                || format!("{}\n", ctx.identity),
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Audit { limit } => {
            let events = broker::read_audit_log(&ctx.store.root)?;
            let recent = &events[events.len().saturating_sub(*limit)..];
            ctx.emit("audit", "ok", serde_json::json!({ "events": recent }), || {
                recent
                    .iter()
                    .map(|e| {
                        format!(
                            "{} {} {} {} ({})\n",
                            e.ts,
                            e.op,
                            e.status,
                            e.db_id,
                            crate::core::identity::short_controller(&e.actor)
                        )
                    })
                    .collect()
            });
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn cmd_init(ctx: &Context) -> Result<ExitCode, GlossError> {
    let initialized = subsystems::initialize_all(&ctx.store.root)?;
    ctx.emit(
        "init",
        "ok",
        serde_json::json!({
            "root": ctx.store.root,
            "identity": ctx.identity.as_str(),
            "subsystems": initialized,
        }),
        || {
            format!(
                "Initialized {} ({})\nIdentity: {}\n",
                ctx.store.root.display(),
                initialized.join(", "),
                ctx.identity
            )
        },
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_log(ctx: &Context, message: &[String], tags: Option<&str>) -> Result<ExitCode, GlossError> {
    let text = message.join(" ");
    let tags = tags.map(chain::parse_tags_csv).unwrap_or_default();
    let entry = chain::log_now(&ctx.kv, &ctx.identity, &text, tags, Vec::new())?;
    ctx.emit("log", "ok", serde_json::json!({ "entry": entry }), || {
        let mut out = format!("Logged ✓  Ref: {}\nMessage: {}\n", entry.entry_ref(), entry.text);
        if !entry.tags.is_empty() {
            out.push_str(&format!("Tags: [{}]\n", entry.tags.join(",")));
        }
        out
    });
    Ok(ExitCode::SUCCESS)
}

fn warn_degraded(report: &Reconstruction) {
    if report.is_degraded() {
        let reasons: Vec<String> = report
            .skipped
            .iter()
            .map(|s| format!("{}@v{}: {}", s.controller, s.version, s.reason))
            .collect();
        eprintln!(
            "⚠ skipped {} unreadable version(s): {}",
            report.skipped.len(),
            output::preview_messages(&reasons, 3, 80)
        );
    }
}

fn cmd_list(
    ctx: &Context,
    day: &str,
    filter: &FilterArgs,
    today: bool,
) -> Result<ExitCode, GlossError> {
    let filter = filter.to_filter();
    let report = timeline::list_day_filtered(
        &ctx.kv,
        &ctx.identity,
        day,
        &ctx.read_opts(),
        &filter,
    )?;
    warn_degraded(&report);

    let label = if today {
        format!("today ({})", day)
    } else {
        day.to_string()
    };
    let filter_note = if filter.tags.is_empty() {
        String::new()
    } else {
        format!(" (filtered by tags: {})", filter.tags.join(","))
    };
    let cmd = if today { "today" } else { "list" };
    ctx.emit(
        cmd,
        "ok",
        serde_json::json!({
            "day": day,
            "entries": report.entries,
            "skipped": report.skipped,
        }),
        || {
            if report.entries.is_empty() {
                format!("No entries found for {}{}\n", label, filter_note)
            } else {
                output::render_entries(
                    &format!("📝 {}: {}{}", ctx.config.site_title, label, filter_note),
                    &report.entries,
                )
            }
        },
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_get(ctx: &Context, key: &str) -> Result<ExitCode, GlossError> {
    let report = timeline::list_day_report(&ctx.kv, &ctx.identity, key, &ctx.read_opts())?;
    warn_degraded(&report);
    if report.entries.is_empty() {
        ctx.emit(
            "get",
            "not_found",
            serde_json::json!({ "key": key, "entries": [] }),
            String::new,
        );
        eprintln!("❌ No entries found for: {}", key);
        return Ok(ExitCode::FAILURE);
    }
    ctx.emit(
        "get",
        "ok",
        serde_json::json!({ "key": key, "entries": report.entries }),
        || {
            output::render_entries(
                &format!("📝 Log Entries: {}\n📊 Total logs: {}", key, report.entries.len()),
                &report.entries,
            )
        },
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_update(
    ctx: &Context,
    raw_ref: &str,
    new_text: &str,
    tags: Option<&str>,
) -> Result<ExitCode, GlossError> {
    let entry_ref = EntryRef::parse(raw_ref)?;
    let tags = tags.map(chain::parse_tags_csv);
    let updated = chain::update_entry(&ctx.kv, &ctx.identity, &entry_ref, new_text, tags)?;
    let status = if updated.is_some() { "ok" } else { "not_found" };
    ctx.emit(
        "update",
        status,
        serde_json::json!({ "ref": raw_ref, "entry": updated }),
        || match &updated {
            Some(entry) => {
                let mut out = format!("✅ Updated entry: {}\n📝 New: \"{}\"\n", raw_ref, entry.text);
                if !entry.tags.is_empty() {
                    out.push_str(&format!("🏷️  Tags: [{}]\n", entry.tags.join(",")));
                }
                out
            }
            None => not_found_hint(raw_ref),
        },
    );
    Ok(ExitCode::SUCCESS)
}

fn not_found_hint(what: &str) -> String {
    format!(
        "❌ Entry not found: {}\n💡 Tip: You can only change your own entries\n",
        what
    )
}

fn cmd_remove(ctx: &Context, raw_ref: &str) -> Result<ExitCode, GlossError> {
    let entry_ref = EntryRef::parse(raw_ref)?;
    let removed = chain::remove_entry(&ctx.kv, &ctx.identity, &entry_ref)?;
    ctx.emit(
        "remove",
        if removed { "ok" } else { "not_found" },
        serde_json::json!({ "ref": raw_ref, "removed": removed }),
        || {
            if removed {
                format!("✅ Removed entry: {}\n", raw_ref)
            } else {
                not_found_hint(raw_ref)
            }
        },
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_remove_day(ctx: &Context, day: &str, confirm: bool) -> Result<ExitCode, GlossError> {
    if !confirm {
        eprintln!("❌ This will remove ALL your logs for this date!");
        eprintln!(
            "💡 Add --confirm flag to proceed: gloss remove-day {} --confirm",
            day
        );
        return Ok(ExitCode::FAILURE);
    }
    let removed = chain::remove_day(&ctx.kv, &ctx.identity, day)?;
    ctx.emit(
        "remove-day",
        if removed { "ok" } else { "not_found" },
        serde_json::json!({ "day": day, "removed": removed }),
        || {
            if removed {
                format!("✅ Removed all your entries for {}\n", day)
            } else {
                format!(
                    "❌ No entries found for {}\n💡 Tip: You can only remove your own entries\n",
                    day
                )
            }
        },
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_history(ctx: &Context, raw_ref: &str) -> Result<ExitCode, GlossError> {
    let entry_ref = EntryRef::parse(raw_ref)?;
    let history: Vec<LogEntry> = timeline::entry_history(&ctx.kv, &ctx.identity, &entry_ref)?;
    ctx.emit(
        "history",
        if history.is_empty() { "not_found" } else { "ok" },
        serde_json::json!({ "ref": raw_ref, "versions": history }),
        || {
            if history.is_empty() {
                return format!("❌ No history found for: {}\n", raw_ref);
            }
            let mut out = format!(
                "\n📚 History for: {}\n📊 Total versions: {}\n{}\n",
                raw_ref,
                history.len(),
                output::rule()
            );
            for entry in &history {
                out.push_str(&output::render_entry(entry, "%H:%M:%S"));
                out.push('\n');
            }
            out
        },
    );
    Ok(ExitCode::SUCCESS)
}
