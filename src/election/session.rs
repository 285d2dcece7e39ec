//! Session Monitoring
//!
//! Translates the coordination service's out-of-band notification stream
//! into coordinator commands. Losing the connection is survivable; losing
//! the session is not, because the membership node dies with it.

use tokio::sync::mpsc;

use crate::coordination::{CoordinationEvent, SessionEvent};

use super::Command;

/// Single consumer of one session's notification stream
pub struct SessionMonitor {
    events: mpsc::UnboundedReceiver<CoordinationEvent>,
    commands: mpsc::UnboundedSender<Command>,
}

impl SessionMonitor {
    /// Wire the session's event stream to the coordinator's command channel
    pub fn new(
        events: mpsc::UnboundedReceiver<CoordinationEvent>,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self { events, commands }
    }

    /// Consume notifications until the stream ends or the session expires.
    ///
    /// Watch notifications are forwarded verbatim; the coordinator decides
    /// relevance. Session-state notifications are interpreted here:
    /// disconnection keeps the process running on the assumption the
    /// connection recovers within the session timeout, expiry shuts the
    /// candidate down.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            match event {
                CoordinationEvent::Session(SessionEvent::Connected) => {
                    tracing::info!("Connected to the coordination service");
                }
                CoordinationEvent::Session(SessionEvent::Disconnected) => {
                    tracing::warn!(
                        "Disconnected from the coordination service, awaiting reconnect"
                    );
                }
                CoordinationEvent::Session(SessionEvent::Expired) => {
                    tracing::error!("Coordination session expired");
                    let _ = self.commands.send(Command::SessionExpired);
                    break;
                }
                CoordinationEvent::Watch(watch) => {
                    if self.commands.send(Command::Watch(watch)).is_err() {
                        // Coordinator already gone; nothing left to notify.
                        break;
                    }
                }
            }
        }
        tracing::debug!("Session monitor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::{WatchEvent, WatchEventKind};

    fn wired() -> (
        mpsc::UnboundedSender<CoordinationEvent>,
        mpsc::UnboundedReceiver<Command>,
        tokio::task::JoinHandle<()>,
    ) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(SessionMonitor::new(event_rx, command_tx).run());
        (event_tx, command_rx, task)
    }

    #[tokio::test]
    async fn test_watch_events_are_forwarded() {
        let (event_tx, mut commands, _task) = wired();

        let watch = WatchEvent {
            path: "/election/c_0000000000".to_string(),
            kind: WatchEventKind::Deleted,
        };
        event_tx
            .send(CoordinationEvent::Watch(watch.clone()))
            .unwrap();

        assert_eq!(commands.recv().await, Some(Command::Watch(watch)));
    }

    #[tokio::test]
    async fn test_connection_churn_produces_no_commands() {
        let (event_tx, mut commands, _task) = wired();

        event_tx
            .send(CoordinationEvent::Session(SessionEvent::Connected))
            .unwrap();
        event_tx
            .send(CoordinationEvent::Session(SessionEvent::Disconnected))
            .unwrap();
        event_tx
            .send(CoordinationEvent::Session(SessionEvent::Connected))
            .unwrap();
        // A later watch event proves the monitor is still running and that
        // nothing was emitted for the connection churn before it.
        event_tx
            .send(CoordinationEvent::Watch(WatchEvent {
                path: "/election/c_0000000001".to_string(),
                kind: WatchEventKind::Deleted,
            }))
            .unwrap();

        assert!(matches!(commands.recv().await, Some(Command::Watch(_))));
    }

    #[tokio::test]
    async fn test_expiry_is_fatal_and_stops_the_monitor() {
        let (event_tx, mut commands, task) = wired();

        event_tx
            .send(CoordinationEvent::Session(SessionEvent::Expired))
            .unwrap();

        assert_eq!(commands.recv().await, Some(Command::SessionExpired));
        task.await.unwrap();

        // The stream is no longer consumed once the monitor stopped.
        event_tx
            .send(CoordinationEvent::Session(SessionEvent::Connected))
            .unwrap_err();
    }

    #[tokio::test]
    async fn test_stream_end_stops_the_monitor() {
        let (event_tx, mut commands, task) = wired();

        drop(event_tx);
        task.await.unwrap();
        assert_eq!(commands.recv().await, None);
    }
}
