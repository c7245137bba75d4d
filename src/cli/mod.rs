//! CLI command definitions for chore-ledger
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::format::OutputFormat;
use crate::types::{Difficulty, TaskKind, TaskStatus};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format selector for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FormatArg {
    #[default]
    Markdown,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DifficultyArg {
    Easy,
    Medium,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(arg: DifficultyArg) -> Self {
        match arg {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Medium => Difficulty::Medium,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Daily,
    Limited,
}

impl From<KindArg> for TaskKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Daily => TaskKind::Daily,
            KindArg::Limited => TaskKind::Limited,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Available,
    Claimed,
    Completed,
    Verified,
    Expired,
}

impl From<StatusArg> for TaskStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Available => TaskStatus::Available,
            StatusArg::Claimed => TaskStatus::Claimed,
            StatusArg::Completed => TaskStatus::Completed,
            StatusArg::Verified => TaskStatus::Verified,
            StatusArg::Expired => TaskStatus::Expired,
        }
    }
}

/// Chore ledger: daily and one-off chores, claimed, completed and verified for rewards
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (default: ./chore-ledger.yaml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format for query results
    #[arg(short, long, value_enum, default_value_t = FormatArg::Markdown, global = true)]
    pub format: FormatArg,

    /// Admin secret for template management, verification and deletes
    #[arg(long, global = true)]
    pub secret: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the midnight refresh scheduler until interrupted
    Serve,

    /// Run one refresh cycle now (admin)
    Refresh,

    /// Manage task templates
    #[command(subcommand)]
    Template(TemplateCommand),

    /// Work with task instances
    #[command(subcommand)]
    Task(TaskCommand),

    /// Show the player and their balance
    Player,
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommand {
    /// Create a template and generate its first instance (admin)
    Add(TemplateAddArgs),

    /// List templates
    List {
        /// Only templates of this type
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },

    /// Edit a template; existing instances keep their copies (admin)
    Update(TemplateUpdateArgs),

    /// Delete a template; its instances are kept (admin)
    Delete { id: i64 },
}

#[derive(Args, Debug)]
pub struct TemplateAddArgs {
    #[arg(long)]
    pub title: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long, value_enum)]
    pub difficulty: DifficultyArg,

    #[arg(long = "type", value_enum)]
    pub kind: KindArg,

    #[arg(long)]
    pub reward: i64,

    /// Weekdays for daily templates: indices 0-6 (Sunday = 0) or names, comma separated
    #[arg(long)]
    pub repeat_days: Option<String>,

    /// Start time for limited templates (YYYY-MM-DD HH:MM:SS, or ISO with/without seconds)
    #[arg(long)]
    pub start: Option<String>,

    /// Expiry time for limited templates
    #[arg(long)]
    pub expiry: Option<String>,
}

#[derive(Args, Debug)]
pub struct TemplateUpdateArgs {
    pub id: i64,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, value_enum)]
    pub difficulty: Option<DifficultyArg>,

    #[arg(long)]
    pub reward: Option<i64>,

    #[arg(long)]
    pub repeat_days: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Claimable, upcoming and in-progress tasks for the player
    Board,

    /// List tasks with optional filters
    List {
        #[arg(long, value_enum)]
        status: Vec<StatusArg>,

        #[arg(long)]
        template: Option<i64>,

        #[arg(long)]
        player: Option<i64>,
    },

    /// Show a task's status history
    History { id: i64 },

    /// Claim an available task for the player
    Claim { id: i64 },

    /// Mark a claimed task as completed
    Complete { id: i64 },

    /// Verify a completed task and pay its reward (admin)
    Verify { id: i64 },

    /// Delete a task instance (admin)
    Delete { id: i64 },
}
