//! CLI struct definitions for the gloss command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use crate::plugins::chain;
use crate::plugins::timeline::ListFilter;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[clap(
    name = "gloss",
    version = env!("CARGO_PKG_VERSION"),
    about = "build. log. ship."
)]
pub struct Cli {
    /// Store directory (defaults to ~/.gloss).
    #[clap(long, global = true, env = "GLOSS_HOME")]
    pub home: Option<PathBuf>,
    /// Controller identity to write as (defaults to the store's identity file).
    #[clap(long, global = true, env = "GLOSS_IDENTITY")]
    pub identity: Option<String>,
    /// Output format for this command.
    #[clap(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
    /// Emit debug diagnostics on stderr (GLOSS_LOG overrides).
    #[clap(short, long, global = true)]
    pub verbose: bool,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug, Default)]
pub struct FilterArgs {
    /// Filter by tags (comma-separated, any match).
    #[clap(long)]
    pub tags: Option<String>,
    /// Filter by controller (full key or prefix).
    #[clap(long)]
    pub controller: Option<String>,
    /// Limit number of results.
    #[clap(long)]
    pub limit: Option<usize>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> ListFilter {
        ListFilter {
            tags: self
                .tags
                .as_deref()
                .map(chain::parse_tags_csv)
                .unwrap_or_default(),
            controller: self.controller.clone().filter(|c| !c.trim().is_empty()),
            limit: self.limit,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the store, identity and databases.
    Init,
    /// Log a message to today's chain.
    Log {
        /// What changed?
        #[clap(required = true, value_name = "MESSAGE")]
        message: Vec<String>,
        /// Tags like auth,infra.
        #[clap(short, long)]
        tags: Option<String>,
    },
    /// Upload a file and log an entry referencing it.
    Snap {
        /// Local file.
        path: PathBuf,
        /// Caption/alt text.
        #[clap(short, long, default_value = "")]
        caption: String,
    },
    /// List entries for a specific day.
    List {
        /// Day to list (YYYY-MM-DD).
        #[clap(value_name = "YYYY-MM-DD")]
        day: String,
        #[clap(flatten)]
        filter: FilterArgs,
    },
    /// List today's entries.
    Today {
        #[clap(flatten)]
        filter: FilterArgs,
    },
    /// Get all log entries for a date; fails when there are none.
    Get {
        /// Date key (YYYY-MM-DD).
        key: String,
    },
    /// Update one of your entries by its ref.
    Update {
        /// Entry ref (YYYY-MM-DD/HHmmss-SSS).
        entry_ref: String,
        /// New text for the entry.
        new_text: String,
        /// New tags for the entry.
        #[clap(short, long)]
        tags: Option<String>,
    },
    /// Remove one of your entries by its ref.
    Remove {
        /// Entry ref (YYYY-MM-DD/HHmmss-SSS).
        entry_ref: String,
    },
    /// Remove all of your entries for a date.
    RemoveDay {
        /// Date (YYYY-MM-DD).
        day: String,
        /// Confirm deletion (required).
        #[clap(long)]
        confirm: bool,
    },
    /// Show every stored variant of an entry.
    History {
        /// Entry ref (YYYY-MM-DD/HHmmss-SSS).
        entry_ref: String,
    },
    /// Print the identity entries are written as.
    Whoami,
    /// Show recent store operations from the audit trail.
    Audit {
        #[clap(long, default_value = "20")]
        limit: usize,
    },
}
