//! Candidate Registration
//!
//! Creates this process's ephemeral membership node under the election
//! path and derives the candidate's stable identity from it.

use std::sync::Arc;

use crate::coordination::{local_name, CoordinationClient};
use crate::error::{Error, Result};

use super::ElectionConfig;

/// The identity this process holds for the rest of its lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Full service-assigned path of the membership node
    pub full_path: String,
    /// Path minus the election namespace; the candidate's stable identity
    pub local_name: String,
}

/// One-shot registrar for this process's membership node
pub struct CandidateRegistrar {
    client: Arc<dyn CoordinationClient>,
    config: ElectionConfig,
}

impl CandidateRegistrar {
    /// Create a registrar bound to one session and election group
    pub fn new(client: Arc<dyn CoordinationClient>, config: ElectionConfig) -> Self {
        Self { client, config }
    }

    /// Create exactly one ephemeral sequential node with empty content.
    ///
    /// Consumes the registrar: retrying means a brand-new node identity, so
    /// the caller must build a fresh registrar and restart the election from
    /// scratch. Failure here is fatal for the candidate.
    pub async fn register(self) -> Result<Registration> {
        let full_path = self
            .client
            .create_ephemeral_sequential(&self.config.node_prefix(), &[])
            .await
            .map_err(|e| Error::Registration(e.to_string()))?;

        let name = match local_name(&full_path, &self.config.path) {
            Some(name) => name.to_string(),
            None => {
                return Err(Error::Registration(format!(
                    "service assigned a path outside {}: {}",
                    self.config.path, full_path
                )))
            }
        };

        tracing::info!("Registered candidate {} ({})", name, full_path);

        Ok(Registration {
            full_path,
            local_name: name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::MemoryCoordination;
    use std::time::Duration;

    async fn service_with_path() -> MemoryCoordination {
        let service = MemoryCoordination::new(Duration::from_millis(500));
        service.create_persistent("/election").await.unwrap();
        service
    }

    #[tokio::test]
    async fn test_register_creates_one_sibling() {
        let service = service_with_path().await;
        let session = service.connect().await;

        let registrar =
            CandidateRegistrar::new(session.clone(), ElectionConfig::default());
        let registration = registrar.register().await.unwrap();

        assert_eq!(registration.local_name, "c_0000000000");
        assert_eq!(registration.full_path, "/election/c_0000000000");

        let siblings = session.list_children("/election").await.unwrap();
        assert_eq!(siblings, vec!["c_0000000000"]);
    }

    #[tokio::test]
    async fn test_each_registration_gets_a_new_identity() {
        let service = service_with_path().await;

        let first = CandidateRegistrar::new(service.connect().await, ElectionConfig::default())
            .register()
            .await
            .unwrap();
        let second = CandidateRegistrar::new(service.connect().await, ElectionConfig::default())
            .register()
            .await
            .unwrap();

        assert_ne!(first.local_name, second.local_name);
        assert!(first.local_name < second.local_name);
    }

    #[tokio::test]
    async fn test_register_fails_without_election_path() {
        let service = MemoryCoordination::new(Duration::from_millis(500));
        let session = service.connect().await;

        let registrar = CandidateRegistrar::new(session, ElectionConfig::default());
        assert!(matches!(
            registrar.register().await,
            Err(Error::Registration(_))
        ));
    }

    #[tokio::test]
    async fn test_register_fails_on_dead_session() {
        let service = service_with_path().await;
        let session = service.connect().await;
        session.close().await.unwrap();

        let registrar = CandidateRegistrar::new(session, ElectionConfig::default());
        assert!(matches!(
            registrar.register().await,
            Err(Error::Registration(_))
        ));
    }
}
