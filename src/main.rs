//! Electorate - Coordination-Service Leader Election
//!
//! Runs a group of candidates over the in-process coordination service and
//! keeps exactly one of them leader through session failures.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use rand::Rng;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use electorate::config::ElectorateConfig;
use electorate::coordination::{MemoryCoordination, MemorySession};
use electorate::election::{spawn_candidate, CandidateHandle, ElectionConfig, ElectionState};
use electorate::error::{Error, Result};

/// Electorate - Coordination-Service Leader Election
#[derive(Parser)]
#[command(name = "electorate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "electorate.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an election group until interrupted
    Run {
        /// Number of candidates (overrides the configuration)
        #[arg(long)]
        candidates: Option<usize>,

        /// Expire the current leader's session at random intervals
        #[arg(long)]
        chaos: bool,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "electorate.toml")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Run { candidates, chaos } => run_group(cli.config, candidates, chaos).await,
        Commands::Init { output } => run_init(output),
        Commands::Validate => run_validate(cli.config),
    }
}

/// Initialize logging
fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// One running candidate in the simulation
struct Candidate {
    label: String,
    session: Arc<MemorySession>,
    handle: CandidateHandle,
}

/// Final per-candidate outcome, printed as JSON on exit
#[derive(Serialize)]
struct CandidateReport {
    name: String,
    outcome: String,
}

#[derive(Serialize)]
struct ElectionReport {
    generated_at: chrono::DateTime<chrono::Utc>,
    candidates: Vec<CandidateReport>,
}

/// Run an election group until interrupted
async fn run_group(
    config_path: PathBuf,
    candidate_override: Option<usize>,
    chaos_override: bool,
) -> Result<()> {
    let config = if config_path.exists() {
        ElectorateConfig::from_file(&config_path)?
    } else {
        tracing::warn!("No configuration at {:?}, using defaults", config_path);
        ElectorateConfig::default()
    };

    let count = candidate_override.unwrap_or(config.simulation.candidates).max(1);
    let chaos = chaos_override || config.simulation.chaos;

    tracing::info!(
        "Starting election group: {} candidates under {} (chaos: {})",
        count,
        config.election.path,
        chaos
    );

    let service = Arc::new(MemoryCoordination::new(config.session_timeout()));
    // The election namespace exists before any candidate shows up;
    // in a real deployment it is provisioned out-of-band.
    service.create_persistent(&config.election.path).await?;

    let election_config = ElectionConfig::from_settings(&config.election);

    let mut group: Vec<Candidate> = Vec::with_capacity(count);
    for index in 0..count {
        let label = format!("candidate-{}", index + 1);
        let session = service.connect().await;
        let handle = spawn_candidate(session.clone(), election_config.clone()).await?;

        // Narrate every transition this candidate goes through.
        let mut states = handle.states();
        let narrate_label = label.clone();
        tokio::spawn(async move {
            loop {
                let state = states.borrow_and_update().clone();
                tracing::info!("{}: {}", narrate_label, state);
                if state == ElectionState::Closed {
                    break;
                }
                if states.changed().await.is_err() {
                    break;
                }
            }
        });

        group.push(Candidate {
            label,
            session,
            handle,
        });
    }

    let chaos_task = chaos.then(|| {
        let targets: Vec<(String, Uuid, tokio::sync::watch::Receiver<ElectionState>)> = group
            .iter()
            .map(|c| (c.label.clone(), c.session.id(), c.handle.states()))
            .collect();
        tokio::spawn(chaos_loop(
            Arc::clone(&service),
            targets,
            config.simulation.chaos_min_interval_ms,
            config.simulation.chaos_max_interval_ms,
        ))
    });

    let observers: Vec<_> = group.iter().map(|c| c.handle.states()).collect();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
        _ = all_closed(observers) => {
            tracing::info!("All candidates have closed");
        }
    }

    if let Some(task) = chaos_task {
        task.abort();
    }

    let mut report = ElectionReport {
        generated_at: chrono::Utc::now(),
        candidates: Vec::new(),
    };
    let mut failure: Option<Error> = None;

    for candidate in group {
        candidate.handle.shutdown();
        match candidate.handle.join().await {
            Ok(()) => report.candidates.push(CandidateReport {
                name: candidate.label,
                outcome: "clean shutdown".to_string(),
            }),
            Err(e) => {
                report.candidates.push(CandidateReport {
                    name: candidate.label,
                    outcome: e.to_string(),
                });
                // Chaos-induced expiries are the point of the exercise, not
                // a failure of the run.
                let induced = chaos && matches!(e, Error::SessionExpired);
                if !induced && failure.is_none() {
                    failure = Some(e);
                }
            }
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&report).expect("report serializes")
    );

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Wait until every candidate has reached its terminal state
async fn all_closed(observers: Vec<tokio::sync::watch::Receiver<ElectionState>>) {
    for mut states in observers {
        // An error means the coordinator is gone, which is closed enough.
        let _ = states.wait_for(|state| *state == ElectionState::Closed).await;
    }
}

/// Periodically expire the current leader's session so the group has to
/// re-elect, stopping once only one candidate is left standing.
async fn chaos_loop(
    service: Arc<MemoryCoordination>,
    targets: Vec<(String, Uuid, tokio::sync::watch::Receiver<ElectionState>)>,
    min_interval_ms: u64,
    max_interval_ms: u64,
) {
    loop {
        let wait_ms = rand::thread_rng().gen_range(min_interval_ms..=max_interval_ms);
        tokio::time::sleep(Duration::from_millis(wait_ms)).await;

        let standing: Vec<_> = targets
            .iter()
            .filter(|(_, _, states)| *states.borrow() != ElectionState::Closed)
            .collect();
        if standing.len() < 2 {
            tracing::info!("Chaos loop stopping: no successor left to promote");
            break;
        }

        if let Some((label, session_id, _)) = standing
            .iter()
            .find(|(_, _, states)| *states.borrow() == ElectionState::Leader)
        {
            tracing::info!("Chaos: expiring the session of {} (current leader)", label);
            service.expire_session(*session_id).await;
        }
    }
}

/// Initialize configuration file
fn run_init(output: PathBuf) -> Result<()> {
    let config_content = r#"# Electorate Configuration
# Generated configuration file

[election]
path = "/election"
candidate_prefix = "c_"

[session]
timeout_ms = 3000

[simulation]
candidates = 3
chaos = false
chaos_min_interval_ms = 2000
chaos_max_interval_ms = 5000

[logging]
level = "info"
"#;

    std::fs::write(&output, config_content)?;
    println!("Configuration file created: {}", output.display());
    println!("\nThen start with: electorate run --config {}", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config_path: PathBuf) -> Result<()> {
    match ElectorateConfig::from_file(&config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Election Path:    {}", config.election.path);
            println!("  Candidate Prefix: {}", config.election.candidate_prefix);
            println!("  Session Timeout:  {} ms", config.session.timeout_ms);
            println!("  Candidates:       {}", config.simulation.candidates);
            println!("  Chaos:            {}", config.simulation.chaos);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}
