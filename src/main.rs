//! polar: task lifecycle and recurrence engine.
//!
//! `serve` re-arms pending triggers, runs the recurrence reconciler on its
//! interval and logs triggers as they fire. The other subcommands run one
//! operation against the store and print the result.

use anyhow::Result;
use clap::Parser;
use polar_core::cli::{Cli, Command, TasksArgs, TrashCommand};
use polar_core::clock::{Clock, SystemClock};
use polar_core::config::{Config, ConfigLoader, ConfigPaths};
use polar_core::db::Database;
use polar_core::format::{self, OutputFormat};
use polar_core::lifecycle::Lifecycle;
use polar_core::reconciler::Reconciler;
use polar_core::triggers::{MemoryScheduler, TimerScheduler, TriggerScheduler};
use polar_core::types::OwnerKind;
use polar_core::views::compute_view;
use std::fs::OpenOptions;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    // An explicit --config wins over POLAR_CONFIG_PATH and the tiers
    let explicit_config = cli.config.clone();
    let mut loader = ConfigLoader::load_with(ConfigPaths::discover(), |key| {
        if key == "POLAR_CONFIG_PATH" && explicit_config.is_some() {
            return explicit_config.clone();
        }
        std::env::var(key).ok()
    })?;
    if let Some(path) = loader.config_path() {
        info!(path = %path.display(), "Loaded configuration");
    }

    // Override paths from CLI arguments
    if let Some(db_path) = &cli.database {
        loader.config_mut().store.db_path = db_path.into();
    }
    let config = loader.into_config();
    let output = OutputFormat::from(cli.format);

    match cli.command {
        Some(Command::Serve) | None => run_server(config).await?,
        Some(Command::Reconcile) => run_reconcile(&config, output).await?,
        Some(Command::Tasks(args)) => run_tasks(&config, &args, output).await?,
        Some(Command::Trash(command)) => run_trash(&config, command, output).await?,
    }

    Ok(())
}

/// Engine over the configured store with triggers that are recorded but
/// never fire, for one-shot commands.
fn one_shot_lifecycle(config: &Config) -> Result<Lifecycle> {
    let db = Database::open(&config.store.db_path)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let triggers: Arc<dyn TriggerScheduler> = Arc::new(MemoryScheduler::new(clock.clone()));
    Ok(Lifecycle::new(db, triggers, clock).with_snooze_minutes(config.triggers.snooze_minutes))
}

fn print_result<T: serde::Serialize>(output: OutputFormat, value: &T, markdown: String) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", format::to_json(value)?),
        OutputFormat::Markdown => print!("{markdown}"),
    }
    Ok(())
}

/// Run the long-lived service
async fn run_server(config: Config) -> Result<()> {
    info!(db = %config.store.db_path.display(), "Starting polar service");
    let db = Database::open(&config.store.db_path)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (scheduler, mut fired) = TimerScheduler::new(
        clock.clone(),
        config.triggers.exact,
        config.triggers.inexact_slack(),
    );
    let triggers: Arc<dyn TriggerScheduler> = Arc::new(scheduler);
    let lifecycle = Lifecycle::new(db, triggers, clock)
        .with_snooze_minutes(config.triggers.snooze_minutes);

    // Triggers do not survive a restart; arm everything still pending
    if let Err(e) = lifecycle.rearm_pending_triggers().await {
        warn!(error = %e, "Failed to re-arm pending triggers");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = Reconciler::new(lifecycle.clone())
        .with_interval(config.reconciler.interval())
        .with_run_on_startup(config.reconciler.run_on_startup)
        .spawn(shutdown_rx);

    loop {
        tokio::select! {
            event = fired.recv() => {
                let Some(event) = event else { break };
                info!(owner = %event.owner, fire_at = %event.fire_at, "Trigger fired");
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Cannot listen for shutdown signal");
                }
                break;
            }
        }
    }

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    if let Err(e) = reconciler.await {
        warn!(error = %e, "Reconciler task ended abnormally");
    }
    Ok(())
}

/// Run a single reconcile pass
async fn run_reconcile(config: &Config, output: OutputFormat) -> Result<()> {
    let lifecycle = one_shot_lifecycle(config)?;
    let report = Reconciler::new(lifecycle).run_pass().await?;
    print_result(output, &report, format::format_reconcile_markdown(&report))
}

/// Print the task view
async fn run_tasks(config: &Config, args: &TasksArgs, output: OutputFormat) -> Result<()> {
    let lifecycle = one_shot_lifecycle(config)?;
    let clock = lifecycle.clock().clone();
    let tasks = lifecycle.joined_tasks().await?;
    let view = compute_view(&tasks, &args.filter(), clock.today(), clock.zone());
    let markdown = format::format_view_markdown(&view, clock.today(), clock.zone());
    print_result(output, &view, markdown)
}

/// Run a trash subcommand
async fn run_trash(config: &Config, command: TrashCommand, output: OutputFormat) -> Result<()> {
    let lifecycle = one_shot_lifecycle(config)?;
    match command {
        TrashCommand::List => {
            let entries = lifecycle.list_trash().await?;
            let markdown = format::format_trash_markdown(&entries, lifecycle.clock().zone());
            print_result(output, &entries, markdown)
        }
        TrashCommand::Restore { kind, id } => {
            let kind = OwnerKind::from(kind);
            let outcome = lifecycle.restore_from_trash(kind, id).await?;
            let markdown = format::format_outcome_markdown("Restored", kind.as_str(), id, outcome);
            print_result(output, &outcome, markdown)
        }
        TrashCommand::Purge { kind, id } => {
            let kind = OwnerKind::from(kind);
            let outcome = lifecycle.permanent_delete(kind, id).await?;
            let markdown = format::format_outcome_markdown("Deleted", kind.as_str(), id, outcome);
            print_result(output, &outcome, markdown)
        }
        TrashCommand::Empty => {
            let report = lifecycle.empty_trash().await?;
            print_result(output, &report, format::format_empty_trash_markdown(&report))
        }
    }
}
