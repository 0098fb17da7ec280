//! CLI command definitions for polar
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::format::OutputFormat;
use crate::types::OwnerKind;
use crate::views::{ListSelection, ViewFilter};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Output format flag.
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

/// Entity kind flag for trash commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Task,
    Reminder,
}

impl From<KindArg> for OwnerKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Task => OwnerKind::Task,
            KindArg::Reminder => OwnerKind::Reminder,
        }
    }
}

/// Task lifecycle and recurrence engine for polar
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format for command results
    #[arg(short, long, value_enum, default_value_t = FormatArg::Markdown, global = true)]
    pub format: FormatArg,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Re-arm pending triggers and run the reconciler until interrupted (default)
    Serve,

    /// Run one reconcile pass and print its report
    Reconcile,

    /// Print the task view
    Tasks(TasksArgs),

    /// Inspect and manage the trash
    #[command(subcommand)]
    Trash(TrashCommand),
}

/// Arguments for the tasks subcommand
#[derive(Args, Debug, Default)]
pub struct TasksArgs {
    /// Show one list, flat, instead of every list grouped
    #[arg(long, value_name = "ID")]
    pub list: Option<i64>,

    /// Hide completed tasks
    #[arg(long)]
    pub pending: bool,

    /// Show only incomplete tasks due before today
    #[arg(long)]
    pub overdue: bool,
}

impl TasksArgs {
    pub fn filter(&self) -> ViewFilter {
        ViewFilter {
            selection: self.list.map_or(ListSelection::All, ListSelection::List),
            pending_only: self.pending,
            overdue_only: self.overdue,
        }
    }
}

/// Trash subcommands
#[derive(Subcommand, Debug)]
pub enum TrashCommand {
    /// List trashed tasks and reminders
    List,

    /// Take an entry out of the trash
    Restore {
        #[arg(value_enum)]
        kind: KindArg,
        id: i64,
    },

    /// Delete an entry for good
    Purge {
        #[arg(value_enum)]
        kind: KindArg,
        id: i64,
    },

    /// Delete every trashed entry for good
    Empty,
}
