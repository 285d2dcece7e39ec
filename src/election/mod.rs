//! Leader Election Module
//!
//! Elects exactly one leader among the candidates registered under a
//! well-known election path. Each candidate watches only the node
//! immediately ahead of it, so one departure wakes one process.

mod coordinator;
mod rank;
mod registrar;
mod session;

pub use coordinator::{Command, ElectionCoordinator, ElectionState};
pub use rank::{evaluate, Standing};
pub use registrar::{CandidateRegistrar, Registration};
pub use session::SessionMonitor;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::ElectionPathConfig;
use crate::coordination::CoordinationClient;
use crate::error::{Error, Result};

/// Configuration for one election group
#[derive(Debug, Clone)]
pub struct ElectionConfig {
    /// Namespace all candidates register under
    pub path: String,
    /// Candidate node name prefix; the service appends the sequence suffix
    pub candidate_prefix: String,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            path: "/election".to_string(),
            candidate_prefix: "c_".to_string(),
        }
    }
}

impl ElectionConfig {
    /// Build from the loaded configuration file section
    pub fn from_settings(settings: &ElectionPathConfig) -> Self {
        Self {
            path: settings.path.clone(),
            candidate_prefix: settings.candidate_prefix.clone(),
        }
    }

    /// The creation prefix handed to the coordination service
    pub fn node_prefix(&self) -> String {
        format!("{}/{}", self.path, self.candidate_prefix)
    }
}

/// Handle to a running candidate stack: coordinator plus session monitor
pub struct CandidateHandle {
    states: watch::Receiver<ElectionState>,
    commands: mpsc::UnboundedSender<Command>,
    coordinator: JoinHandle<Result<()>>,
}

impl CandidateHandle {
    /// Observe this candidate's state transitions
    pub fn states(&self) -> watch::Receiver<ElectionState> {
        self.states.clone()
    }

    /// Request a graceful shutdown
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    /// Whether the coordinator has already terminated
    pub fn is_finished(&self) -> bool {
        self.coordinator.is_finished()
    }

    /// Wait for the coordinator to terminate and return its outcome
    pub async fn join(self) -> Result<()> {
        match self.coordinator.await {
            Ok(outcome) => outcome,
            Err(e) => Err(Error::Coordination(format!("election task failed: {e}"))),
        }
    }
}

/// Wire and spawn a full candidate stack over one coordination session.
///
/// The session's event stream feeds a [`SessionMonitor`], which forwards
/// watch notifications and fatal session transitions to the coordinator's
/// serialized command loop.
pub async fn spawn_candidate(
    client: Arc<dyn CoordinationClient>,
    config: ElectionConfig,
) -> Result<CandidateHandle> {
    let events = client.take_events().await.ok_or_else(|| {
        Error::Coordination("session event stream already taken by another consumer".into())
    })?;

    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let monitor = SessionMonitor::new(events, command_tx.clone());
    tokio::spawn(monitor.run());

    let coordinator = ElectionCoordinator::new(client, config);
    let states = coordinator.subscribe();
    let task = tokio::spawn(coordinator.run(command_rx));

    Ok(CandidateHandle {
        states,
        commands: command_tx,
        coordinator: task,
    })
}
