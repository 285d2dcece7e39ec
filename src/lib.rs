//! Electorate - Coordination-Service Leader Election
//!
//! Elects exactly one leader among a group of cooperating processes, using
//! a hierarchical, watch-capable coordination service as the sole source of
//! shared state and notification.
//!
//! # Architecture
//!
//! Every candidate registers an ephemeral, sequentially-named node under a
//! well-known election path. The candidate with the lowest name leads; each
//! of the others watches only the node immediately ahead of it. One
//! departure therefore wakes exactly one process instead of the whole
//! group, and the chain contracts until someone has no predecessor left.
//!
//! # Features
//!
//! - Predecessor-watch chaining (no notification herds)
//! - Automatic re-election on predecessor failure
//! - Session-state driven lifecycle: survive disconnects, die on expiry
//! - Abstract coordination-service contract with an in-process
//!   implementation for tests and local simulation

pub mod config;
pub mod coordination;
pub mod election;
pub mod error;

pub use config::ElectorateConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::ElectorateConfig;
    pub use crate::coordination::{CoordinationClient, MemoryCoordination, MemorySession};
    pub use crate::election::{
        spawn_candidate, CandidateHandle, ElectionConfig, ElectionCoordinator, ElectionState,
        SessionMonitor,
    };
    pub use crate::error::{Error, Result};
}
