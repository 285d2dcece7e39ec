//! In-Process Coordination Service
//!
//! A single-process implementation of the coordination contract, used by the
//! test suite and the local simulation harness. It models the parts of the
//! service the election core depends on: ephemeral ownership, zero-padded
//! sequence assignment, one-shot watches, and session expiry that deletes a
//! dead session's ephemeral nodes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex, RwLock};
use uuid::Uuid;

use super::{
    local_name, CoordinationClient, CoordinationEvent, SessionEvent, WatchEvent, WatchEventKind,
};
use crate::error::{Error, Result};

/// Width of the sequence suffix. Zero-padding keeps lexicographic order
/// equal to creation order.
const SEQUENCE_WIDTH: usize = 10;

/// Metadata for a stored node
#[derive(Debug, Clone)]
pub struct NodeStat {
    /// Whether the node is bound to a session's lifetime
    pub ephemeral: bool,
    /// When the node was created
    pub created_at: DateTime<Utc>,
}

struct NodeRecord {
    #[allow(dead_code)]
    payload: Vec<u8>,
    /// Owning session for ephemeral nodes; `None` for persistent ones
    owner: Option<Uuid>,
    created_at: DateTime<Utc>,
}

struct SessionRecord {
    events: mpsc::UnboundedSender<CoordinationEvent>,
    connected: bool,
}

#[derive(Default)]
struct Store {
    /// All nodes by absolute path. BTreeMap keeps listings deterministic.
    nodes: BTreeMap<String, NodeRecord>,
    /// Next sequence number per parent path. Never reused, even after deletes.
    sequences: HashMap<String, u64>,
    /// Armed one-shot watches: path -> sessions to notify
    watches: HashMap<String, Vec<Uuid>>,
    sessions: HashMap<Uuid, SessionRecord>,
    /// Sessions the service expired; their calls fail with `SessionExpired`
    /// rather than the generic closed-session error.
    expired: std::collections::HashSet<Uuid>,
}

impl Store {
    /// Reject calls from sessions that are no longer usable.
    fn check_session(&self, id: Uuid) -> Result<()> {
        if self.sessions.contains_key(&id) {
            Ok(())
        } else if self.expired.contains(&id) {
            Err(Error::SessionExpired)
        } else {
            Err(Error::SessionClosed)
        }
    }

    fn notify(&self, session: Uuid, event: CoordinationEvent) {
        if let Some(record) = self.sessions.get(&session) {
            // A send can only fail if the receiver is gone; nothing to do then.
            let _ = record.events.send(event);
        }
    }

    fn fire_watches(&mut self, path: &str, kind: WatchEventKind) {
        if let Some(watchers) = self.watches.remove(path) {
            for session in watchers {
                self.notify(
                    session,
                    CoordinationEvent::Watch(WatchEvent {
                        path: path.to_string(),
                        kind,
                    }),
                );
            }
        }
    }

    fn remove_node(&mut self, path: &str) -> bool {
        if self.nodes.remove(path).is_some() {
            self.fire_watches(path, WatchEventKind::Deleted);
            true
        } else {
            false
        }
    }

    /// Tear down a session: drop its watch registrations, delete its
    /// ephemeral nodes (firing other sessions' watches), deliver the final
    /// event if any, and forget the session.
    fn end_session(&mut self, id: Uuid, final_event: Option<SessionEvent>) {
        for watchers in self.watches.values_mut() {
            watchers.retain(|s| *s != id);
        }
        self.watches.retain(|_, watchers| !watchers.is_empty());

        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.owner == Some(id))
            .map(|(path, _)| path.clone())
            .collect();
        for path in owned {
            self.remove_node(&path);
        }

        if let Some(event) = final_event {
            self.notify(id, CoordinationEvent::Session(event));
            if event == SessionEvent::Expired {
                self.expired.insert(id);
            }
        }
        self.sessions.remove(&id);
    }
}

/// In-process coordination service shared by any number of sessions
pub struct MemoryCoordination {
    store: Arc<RwLock<Store>>,
    session_timeout: Duration,
}

impl MemoryCoordination {
    /// Create an empty service. `session_timeout` bounds how long a
    /// disconnected session survives before the service expires it.
    pub fn new(session_timeout: Duration) -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::default())),
            session_timeout,
        }
    }

    /// Create a persistent node, e.g. the election namespace that exists
    /// for the lifetime of the group.
    pub async fn create_persistent(&self, path: &str) -> Result<()> {
        let mut store = self.store.write().await;
        store.nodes.entry(path.to_string()).or_insert(NodeRecord {
            payload: Vec::new(),
            owner: None,
            created_at: Utc::now(),
        });
        store.fire_watches(path, WatchEventKind::Created);
        Ok(())
    }

    /// Open a new session. The session starts connected and its event
    /// stream begins with `Connected`.
    pub async fn connect(&self) -> Arc<MemorySession> {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut store = self.store.write().await;
        store.sessions.insert(
            id,
            SessionRecord {
                events: tx,
                connected: true,
            },
        );
        store.notify(id, CoordinationEvent::Session(SessionEvent::Connected));

        Arc::new(MemorySession {
            id,
            store: Arc::clone(&self.store),
            events: Mutex::new(Some(rx)),
        })
    }

    /// Expire a session immediately: its ephemeral nodes are deleted (firing
    /// any watches on them) and the session receives `Expired`.
    pub async fn expire_session(&self, id: Uuid) {
        let mut store = self.store.write().await;
        if store.sessions.contains_key(&id) {
            tracing::info!("Expiring session {}", id);
            store.end_session(id, Some(SessionEvent::Expired));
        }
    }

    /// Drop a session's connection without ending the session. If it does
    /// not reconnect within the session timeout, the service expires it.
    pub async fn disconnect(&self, id: Uuid) {
        {
            let mut store = self.store.write().await;
            match store.sessions.get_mut(&id) {
                Some(session) => session.connected = false,
                None => return,
            }
            store.notify(id, CoordinationEvent::Session(SessionEvent::Disconnected));
        }

        let store = Arc::clone(&self.store);
        let timeout = self.session_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let mut store = store.write().await;
            let still_disconnected = store
                .sessions
                .get(&id)
                .is_some_and(|session| !session.connected);
            if still_disconnected {
                tracing::info!("Session {} missed the reconnect window, expiring", id);
                store.end_session(id, Some(SessionEvent::Expired));
            }
        });
    }

    /// Re-establish a disconnected session's connection.
    pub async fn reconnect(&self, id: Uuid) {
        let mut store = self.store.write().await;
        if let Some(session) = store.sessions.get_mut(&id) {
            session.connected = true;
            store.notify(id, CoordinationEvent::Session(SessionEvent::Connected));
        }
    }

    /// Delete a node regardless of ownership, firing watches on it.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let mut store = self.store.write().await;
        if store.remove_node(path) {
            Ok(())
        } else {
            Err(Error::NodeNotFound(path.to_string()))
        }
    }

    /// Look up a node's metadata.
    pub async fn stat(&self, path: &str) -> Option<NodeStat> {
        let store = self.store.read().await;
        store.nodes.get(path).map(|node| NodeStat {
            ephemeral: node.owner.is_some(),
            created_at: node.created_at,
        })
    }
}

/// One session's handle to a [`MemoryCoordination`] service
pub struct MemorySession {
    id: Uuid,
    store: Arc<RwLock<Store>>,
    events: Mutex<Option<mpsc::UnboundedReceiver<CoordinationEvent>>>,
}

impl MemorySession {
    /// The service-assigned session identifier
    pub fn id(&self) -> Uuid {
        self.id
    }
}

#[async_trait::async_trait]
impl CoordinationClient for MemorySession {
    async fn create_ephemeral_sequential(&self, prefix: &str, payload: &[u8]) -> Result<String> {
        let mut store = self.store.write().await;
        store.check_session(self.id)?;

        let (parent, _) = prefix
            .rsplit_once('/')
            .ok_or_else(|| Error::Coordination(format!("invalid node prefix: {prefix}")))?;
        let parent = if parent.is_empty() { "/" } else { parent };
        if parent != "/" && !store.nodes.contains_key(parent) {
            return Err(Error::NodeNotFound(parent.to_string()));
        }

        let sequence = store.sequences.entry(parent.to_string()).or_insert(0);
        let assigned = *sequence;
        *sequence += 1;

        let full_path = format!("{}{:0width$}", prefix, assigned, width = SEQUENCE_WIDTH);
        store.nodes.insert(
            full_path.clone(),
            NodeRecord {
                payload: payload.to_vec(),
                owner: Some(self.id),
                created_at: Utc::now(),
            },
        );
        store.fire_watches(&full_path, WatchEventKind::Created);

        Ok(full_path)
    }

    async fn list_children(&self, parent: &str) -> Result<Vec<String>> {
        let store = self.store.read().await;
        store.check_session(self.id)?;
        if !store.nodes.contains_key(parent) {
            return Err(Error::NodeNotFound(parent.to_string()));
        }

        Ok(store
            .nodes
            .keys()
            .filter_map(|path| local_name(path, parent))
            .map(str::to_string)
            .collect())
    }

    async fn exists_with_watch(&self, path: &str) -> Result<bool> {
        let mut store = self.store.write().await;
        store.check_session(self.id)?;

        store
            .watches
            .entry(path.to_string())
            .or_default()
            .push(self.id);
        Ok(store.nodes.contains_key(path))
    }

    async fn take_events(&self) -> Option<mpsc::UnboundedReceiver<CoordinationEvent>> {
        self.events.lock().await.take()
    }

    async fn close(&self) -> Result<()> {
        let mut store = self.store.write().await;
        if store.sessions.contains_key(&self.id) {
            store.end_session(self.id, None);
        }
        Ok(())
    }
}
