//! Election Coordination
//!
//! Owns the election state machine: registration, standing evaluation,
//! predecessor watching, and re-election when the predecessor goes away.
//! All transitions run on one task; notifications arriving while a round is
//! in flight queue on the command channel and are handled strictly in
//! order, never interleaved with the round that is already running.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::coordination::{join_path, CoordinationClient, WatchEvent, WatchEventKind};
use crate::error::{Error, Result};

use super::{evaluate, CandidateRegistrar, ElectionConfig, Registration};

/// Election lifecycle states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElectionState {
    /// No membership node exists yet
    Unregistered,
    /// Creating this process's membership node
    Registering,
    /// Fetching a snapshot and computing standing
    Evaluating,
    /// Not the leader; watching the named predecessor and nothing else
    Following {
        /// Local name of the sibling immediately ahead
        predecessor: String,
    },
    /// First in line; nobody left to watch
    Leader,
    /// Terminal: shut down, session expired, or a protocol break
    Closed,
}

impl std::fmt::Display for ElectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElectionState::Unregistered => write!(f, "UNREGISTERED"),
            ElectionState::Registering => write!(f, "REGISTERING"),
            ElectionState::Evaluating => write!(f, "EVALUATING"),
            ElectionState::Following { predecessor } => write!(f, "FOLLOWING({predecessor})"),
            ElectionState::Leader => write!(f, "LEADER"),
            ElectionState::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Commands consumed by the coordinator's serialized loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// A watch fired on some node
    Watch(WatchEvent),
    /// The session is gone and the membership node with it
    SessionExpired,
    /// Graceful shutdown request
    Shutdown,
}

/// Keep fatal conditions (like expiry observed mid-round) as themselves;
/// everything else failing a round is a coordination error.
fn round_error(context: &str, e: Error) -> Error {
    if e.is_fatal() {
        e
    } else {
        Error::Coordination(format!("{context}: {e}"))
    }
}

/// Election coordinator for a single candidate
pub struct ElectionCoordinator {
    /// This candidate's session with the coordination service
    client: Arc<dyn CoordinationClient>,
    /// Election group parameters
    config: ElectionConfig,
    /// Published state label; observers subscribe instead of polling
    state_tx: watch::Sender<ElectionState>,
}

impl ElectionCoordinator {
    /// Create a coordinator for one candidate
    pub fn new(client: Arc<dyn CoordinationClient>, config: ElectionConfig) -> Self {
        let (state_tx, _) = watch::channel(ElectionState::Unregistered);
        Self {
            client,
            config,
            state_tx,
        }
    }

    /// Observe state transitions without polling
    pub fn subscribe(&self) -> watch::Receiver<ElectionState> {
        self.state_tx.subscribe()
    }

    fn transition(&self, next: ElectionState) {
        tracing::debug!("Election state -> {}", next);
        self.state_tx.send_replace(next);
    }

    /// Drive the election until shutdown or a fatal condition, then close.
    ///
    /// Returns `Ok(())` for a requested shutdown. Registration failure,
    /// session expiry, and protocol breaks surface as the corresponding
    /// error after the coordinator has transitioned to `Closed`.
    pub async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) -> Result<()> {
        let outcome = self.drive(&mut commands).await;

        match &outcome {
            Ok(()) => tracing::info!("Election coordinator closed"),
            Err(e) => tracing::error!("Election coordinator closed: {}", e),
        }
        self.transition(ElectionState::Closed);

        // The session dies with the coordinator; the service deletes the
        // membership node, which is what wakes our successor.
        if let Err(e) = self.client.close().await {
            tracing::debug!("Session close failed: {}", e);
        }

        outcome
    }

    async fn drive(&self, commands: &mut mpsc::UnboundedReceiver<Command>) -> Result<()> {
        self.transition(ElectionState::Registering);
        let registrar = CandidateRegistrar::new(Arc::clone(&self.client), self.config.clone());
        let me = registrar.register().await?;

        self.settle(&me).await?;

        while let Some(command) = commands.recv().await {
            match command {
                Command::Watch(event) => {
                    if self.supersedes_watched(&event) {
                        tracing::info!("Predecessor {} is gone, re-evaluating", event.path);
                        self.settle(&me).await?;
                    } else {
                        tracing::debug!("Discarding stale watch event on {}", event.path);
                    }
                }
                Command::SessionExpired => return Err(Error::SessionExpired),
                Command::Shutdown => return Ok(()),
            }
        }

        // Command channel gone means the monitor stopped and nothing can
        // wake us again; treat it as a shutdown.
        Ok(())
    }

    /// A deletion event matters only while following the node it names.
    /// Everything else is a leftover from a predecessor this coordinator
    /// has already stopped watching.
    fn supersedes_watched(&self, event: &WatchEvent) -> bool {
        if event.kind != WatchEventKind::Deleted {
            return false;
        }
        match &*self.state_tx.borrow() {
            ElectionState::Following { predecessor } => {
                event.path == join_path(&self.config.path, predecessor)
            }
            _ => false,
        }
    }

    /// Run evaluation rounds until this candidate either leads or holds a
    /// watch on a predecessor that still existed at watch-install time.
    async fn settle(&self, me: &Registration) -> Result<()> {
        loop {
            self.transition(ElectionState::Evaluating);

            let snapshot = self
                .client
                .list_children(&self.config.path)
                .await
                .map_err(|e| round_error("membership listing failed", e))?;
            let standing = evaluate(&snapshot, &me.local_name)?;

            let Some(predecessor) = standing.predecessor else {
                tracing::info!("{} is the leader", me.local_name);
                self.transition(ElectionState::Leader);
                return Ok(());
            };

            let predecessor_path = join_path(&self.config.path, &predecessor);
            let exists = self
                .client
                .exists_with_watch(&predecessor_path)
                .await
                .map_err(|e| round_error("predecessor watch failed", e))?;

            if exists {
                tracing::info!(
                    "{} at rank {}, watching predecessor {}",
                    me.local_name,
                    standing.rank,
                    predecessor
                );
                self.transition(ElectionState::Following { predecessor });
                return Ok(());
            }

            // The predecessor vanished between the snapshot and the watch
            // install; the deletion we would wait for already happened.
            tracing::debug!(
                "Predecessor {} vanished before the watch armed, re-evaluating",
                predecessor
            );
        }
    }
}
