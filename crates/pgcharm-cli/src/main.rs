mod agent;
mod cli;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use pgcharm_admin::{HookToolPorts, PsqlAdministrator, SystemCommandRunner};
use pgcharm_config::{Settings, load_settings};
use pgcharm_core::NotificationKind;
use pgcharm_reconcile::observability::{apply_logging_level, init_tracing, invocation_span};
use pgcharm_reconcile::{HandlerOutcome, Notification, RelationReconciler, UnitStatus};
use tracing::Instrument;

use agent::AgentState;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound) {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    init_tracing();

    if let Err(e) = run().await {
        eprintln!("{} {:#}", "✗".red(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref()).context("Failed to load settings")?;

    if std::env::var_os("RUST_LOG").is_none() {
        apply_logging_level(cli.log_level.as_deref().unwrap_or(&settings.logging.level));
    }

    match &cli.command {
        Commands::Dispatch(args) => {
            let notification = read_notification(&args.notification)?;
            deliver(&settings, Some(notification)).await
        }
        Commands::Redeliver => deliver(&settings, None).await,
        Commands::Status => {
            let state = AgentState::load(&settings.state.path, settings.postgres.port)?;
            print_status(&state);
            Ok(())
        }
    }
}

fn read_notification(path: &Path) -> Result<Notification> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read notification from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&raw).context("Invalid notification")
}

/// Delivers `notification` if given, then replays earlier deferred notices.
///
/// State is saved even when a handler fails so the deferred queue survives.
async fn deliver(settings: &Settings, notification: Option<Notification>) -> Result<()> {
    let path = &settings.state.path;
    let mut state = AgentState::load(path, settings.postgres.port)?;

    let runner = Arc::new(SystemCommandRunner);
    let admin = PsqlAdministrator::new(settings, runner.clone()).with_port(state.store.listen_port);
    let ports = HookToolPorts::new(runner);
    let mut reconciler = RelationReconciler::new(
        Arc::new(admin),
        Arc::new(ports),
        std::mem::take(&mut state.store),
    )
    .with_leader(state.leader);

    if let Some(notification) = &notification {
        state.observe(notification);
    }

    let result = dispatch_and_replay(&mut state, &mut reconciler, notification).await;

    state.leader = reconciler.is_leader();
    state.store = reconciler.into_store();
    state.save(path)?;

    if let Some((kind, outcome)) = result? {
        let label = match outcome {
            HandlerOutcome::Completed => "completed".green(),
            HandlerOutcome::Deferred => "deferred".yellow(),
            HandlerOutcome::Abandoned => "abandoned".red(),
            HandlerOutcome::Skipped => "skipped".dimmed(),
        };
        println!("{} {}", kind.to_string().cyan(), label);
    }
    Ok(())
}

async fn dispatch_and_replay(
    state: &mut AgentState,
    reconciler: &mut RelationReconciler,
    notification: Option<Notification>,
) -> pgcharm_reconcile::Result<Option<(NotificationKind, HandlerOutcome)>> {
    let kind = notification.as_ref().map(Notification::kind);
    let delivery = state
        .deferred
        .handle(reconciler, &mut state.host, notification)
        .instrument(invocation_span(kind))
        .await?;
    for outcome in delivery.redelivered {
        tracing::info!(?outcome, "Redelivered notification");
    }
    Ok(kind.zip(delivery.outcome))
}

fn print_status(state: &AgentState) {
    let store = &state.store;
    let status = match state.host.status() {
        Some(UnitStatus::Active(msg)) => format!("active: {msg}").green(),
        Some(other) => other.to_string().yellow(),
        None => "unknown".dimmed(),
    };
    println!("{}: {}", "Status".cyan(), status);
    println!("{}: {}", "Leader".cyan(), state.leader);
    println!(
        "{}: installed={} configured={} started={}",
        "Lifecycle".cyan(),
        store.installed,
        store.configured,
        store.started
    );
    let open: Vec<String> = store.open_ports.iter().map(u16::to_string).collect();
    println!(
        "{}: {} (open: {})",
        "Listen port".cyan(),
        store.listen_port,
        open.join(",")
    );
    println!("{}: {}", "Deferred".cyan(), state.deferred.len());

    if store.resources.is_empty() {
        println!("No databases provisioned.");
        return;
    }
    for (name, resource) in &store.resources {
        let relations: Vec<String> = store
            .relation_to_resource
            .iter()
            .filter(|(_, db)| *db == name)
            .map(|(id, _)| id.to_string())
            .collect();
        let uri = resource.connection_descriptor().with("password", "").to_uri();
        println!(
            "  {} {} [relations: {}]",
            name.bold(),
            uri,
            relations.join(",")
        );
    }
}
