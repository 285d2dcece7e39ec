//! Coordination Service Client
//!
//! Defines the contract the election core consumes from a hierarchical,
//! watch-capable coordination service: ephemeral sequential node creation,
//! child listing, one-shot existence watches, and an out-of-band stream of
//! session and watch notifications. The service's storage and consensus
//! internals are deliberately behind this seam.

mod memory;

pub use memory::{MemoryCoordination, MemorySession, NodeStat};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Session lifecycle notification from the coordination service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session (re)connected to the service
    Connected,
    /// The connection dropped; the session may still recover
    Disconnected,
    /// The session is gone and all its ephemeral nodes have been deleted
    Expired,
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::Connected => write!(f, "CONNECTED"),
            SessionEvent::Disconnected => write!(f, "DISCONNECTED"),
            SessionEvent::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// What happened to a watched node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Deleted,
}

/// A one-shot watch firing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// Absolute path of the node the watch was set on
    pub path: String,
    /// What happened to it
    pub kind: WatchEventKind,
}

/// Out-of-band notification delivered on a session's event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinationEvent {
    Session(SessionEvent),
    Watch(WatchEvent),
}

/// Client handle for one session with the coordination service.
///
/// Watch and session notifications are not returned from the calls that
/// request them; they arrive asynchronously on the stream handed out by
/// [`take_events`](CoordinationClient::take_events).
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    /// Create an ephemeral node under `prefix` with a service-assigned,
    /// monotonically increasing suffix. Returns the full assigned path.
    /// The node is deleted by the service when this session terminates.
    async fn create_ephemeral_sequential(&self, prefix: &str, payload: &[u8]) -> Result<String>;

    /// List the names of `parent`'s children. The result is an unordered
    /// set; callers needing a total order must sort it.
    async fn list_children(&self, parent: &str) -> Result<Vec<String>>;

    /// Check whether `path` exists and register a one-shot watch on it.
    /// The watch fires at most once, on deletion or creation, via the
    /// session's event stream.
    async fn exists_with_watch(&self, path: &str) -> Result<bool>;

    /// Take the session's notification stream. Yields `Some` exactly once;
    /// there is a single consumer per session.
    async fn take_events(&self) -> Option<mpsc::UnboundedReceiver<CoordinationEvent>>;

    /// End the session. The service deletes the session's ephemeral nodes.
    async fn close(&self) -> Result<()>;
}

/// Join a parent path and a child name into an absolute path.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Strip the parent prefix from an absolute path, yielding the local name.
pub fn local_name<'a>(full_path: &'a str, parent: &str) -> Option<&'a str> {
    let rest = full_path.strip_prefix(parent)?;
    let rest = rest.strip_prefix('/')?;
    if rest.is_empty() || rest.contains('/') {
        None
    } else {
        Some(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/election", "c_0000000001"), "/election/c_0000000001");
        assert_eq!(join_path("/", "election"), "/election");
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("/election/c_0000000001", "/election"), Some("c_0000000001"));
        assert_eq!(local_name("/election", "/election"), None);
        assert_eq!(local_name("/other/c_0000000001", "/election"), None);
        assert_eq!(local_name("/election/a/b", "/election"), None);
    }
}
