//! CLI entrypoint for roundtable
//!
//! Wires the in-memory store, the Gemini client, and the orchestration
//! services together with dependency injection, then plays a scenario file
//! end to end.

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use roundtable_application::ports::broadcast::EventBroadcaster;
use roundtable_application::ports::model_client::ModelClient;
use roundtable_application::ports::notifier::InviteNotifier;
use roundtable_application::ports::store::MeetingStore;
use roundtable_application::use_cases::{
    LifecycleDriver, MeetingService, ReportService, TurnEngine,
};
use roundtable_application::{ModelGateway, PersonaQueue};
use roundtable_infrastructure::{
    BroadcastBus, ConfigLoader, FileConfig, GeminiClient, GeminiConfig, InMemoryStore,
    LogInviteNotifier,
};

mod render;
mod scenario;

use scenario::Scenario;

#[derive(Parser)]
#[command(name = "roundtable", version, about = "Asynchronous AI meeting orchestrator")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Explicit config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ignore config files and use built-in defaults
    #[arg(long, global = true)]
    no_config: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a scenario file end to end and print the transcript and report
    Run {
        /// Path to a scenario TOML file
        scenario: PathBuf,

        /// Give up if the meeting has not concluded after this many minutes
        #[arg(long, default_value_t = 30)]
        timeout_minutes: u64,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Print where configuration is loaded from
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow::anyhow!(e))?
    };

    match cli.command {
        Command::Run {
            scenario,
            timeout_minutes,
        } => run_scenario(config, &scenario, timeout_minutes).await,
        Command::Config { command } => {
            match command {
                ConfigCommand::Show => print_config(&config)?,
                ConfigCommand::Sources => ConfigLoader::print_config_sources(),
            }
            Ok(())
        }
    }
}

fn print_config(config: &FileConfig) -> Result<()> {
    let mut shown = config.clone();
    shown.model.api_key = shown.model.api_key.map(|_| "[redacted]".to_string());
    shown.model.moderator_api_key = shown
        .model
        .moderator_api_key
        .map(|_| "[redacted]".to_string());
    print!("{}", toml::to_string_pretty(&shown)?);
    Ok(())
}

async fn run_scenario(config: FileConfig, path: &PathBuf, timeout_minutes: u64) -> Result<()> {
    let scenario = Scenario::load(path)?;

    let participant_key = config.model.participant_key().context(
        "no API key configured; set GEMINI_API_KEY or [model] api_key in the config file",
    )?;
    let moderator_key = config
        .model
        .moderator_key()
        .unwrap_or_else(|| participant_key.clone());

    let client_for = |api_key: String| -> Arc<dyn ModelClient> {
        Arc::new(GeminiClient::new(GeminiConfig {
            api_key,
            model: config.model.model.clone(),
            base_url: config.model.base_url.clone(),
        }))
    };

    // === Dependency injection ===
    let orchestrator = config.orchestrator();
    let gateway = Arc::new(ModelGateway::with_clients(
        client_for(moderator_key),
        client_for(participant_key),
        orchestrator.limits,
        orchestrator.retry,
    ));
    let store: Arc<dyn MeetingStore> = Arc::new(InMemoryStore::new());
    let bus = Arc::new(BroadcastBus::default());
    let events: Arc<dyn EventBroadcaster> = Arc::clone(&bus) as Arc<dyn EventBroadcaster>;
    let notifier: Arc<dyn InviteNotifier> = Arc::new(LogInviteNotifier::new());
    let personas = PersonaQueue::new(Arc::clone(&store), Arc::clone(&gateway));
    let meetings = MeetingService::new(
        Arc::clone(&store),
        notifier,
        Arc::clone(&events),
        personas,
    );

    render::banner("roundtable");
    println!("Subject: {}", scenario.subject);
    println!("Participants: {}", scenario.contacts().join(", "));
    println!();

    let (meeting, participants) = meetings
        .create_meeting(&scenario.subject, &scenario.details, &scenario.contacts())
        .await?;
    info!(meeting_id = %meeting.id, "meeting created");

    for participant in &participants {
        let input = scenario
            .input_for(&participant.contact)
            .context("participant without scenario input")?;
        meetings.submit_input(&participant.token, input).await?;
        println!("Recorded input from {}", participant.contact);
    }
    println!();

    // Print turns and whiteboard changes as they happen.
    let mut rx = bus.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => render::print_event(&event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let engine = Arc::new(TurnEngine::new(
        Arc::clone(&store),
        Arc::clone(&gateway),
        events,
        orchestrator.engine.clone(),
    ));
    let reports = Arc::new(ReportService::new(Arc::clone(&store), Arc::clone(&gateway)));
    let driver = LifecycleDriver::new(Arc::clone(&store), engine, Arc::clone(&reports));

    let token = CancellationToken::new();
    let driver_task = tokio::spawn({
        let token = token.clone();
        async move { driver.run(token).await }
    });

    let deadline = Instant::now() + Duration::from_secs(timeout_minutes * 60);
    let mut interrupted = false;
    let mut timed_out = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                interrupted = true;
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(2)) => {
                let current = store.meeting(&meeting.id).await?;
                if current.status.is_terminal() {
                    break;
                }
                if Instant::now() >= deadline {
                    timed_out = true;
                    break;
                }
            }
        }
    }

    token.cancel();
    let _ = driver_task.await;
    printer.abort();

    if interrupted || timed_out {
        if !store.meeting(&meeting.id).await?.status.is_terminal() {
            meetings.cancel(&meeting.id).await?;
        }
        if timed_out {
            bail!("meeting did not conclude within {timeout_minutes} minutes; cancelled");
        }
        println!();
        println!("Interrupted; meeting cancelled.");
        return Ok(());
    }

    let turns = store.turns(&meeting.id).await?;
    render::print_transcript(&turns);

    let current = store.meeting(&meeting.id).await?;
    if !current.whiteboard.is_empty() {
        render::banner("Whiteboard");
        render::print_whiteboard(&current.whiteboard, "");
    }

    match reports.report_if_any(&meeting.id).await? {
        Some(report) => render::print_report(&report),
        None => println!("No report was generated."),
    }
    Ok(())
}
