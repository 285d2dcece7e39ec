//! Electorate Configuration
//!
//! This module provides configuration structures for the electorate
//! leader-election runtime and its local simulation harness.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main electorate configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ElectorateConfig {
    /// Election namespace configuration
    #[serde(default)]
    pub election: ElectionPathConfig,

    /// Coordination session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Local simulation configuration
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Election namespace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionPathConfig {
    /// Well-known path all candidates register under.
    /// Exists for the lifetime of the election group; created out-of-band.
    #[serde(default = "default_election_path")]
    pub path: String,

    /// Name prefix for candidate nodes; the service appends the sequence suffix
    #[serde(default = "default_candidate_prefix")]
    pub candidate_prefix: String,
}

/// Coordination session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session timeout in milliseconds. A disconnected session that does not
    /// reconnect within this window is expired by the service, which deletes
    /// its ephemeral nodes.
    #[serde(default = "default_session_timeout_ms")]
    pub timeout_ms: u64,
}

/// Local simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of candidate processes to run
    #[serde(default = "default_candidates")]
    pub candidates: usize,

    /// Periodically expire the current leader's session to exercise failover
    #[serde(default)]
    pub chaos: bool,

    /// Minimum interval between chaos kills in milliseconds (randomized)
    #[serde(default = "default_chaos_min_interval_ms")]
    pub chaos_min_interval_ms: u64,

    /// Maximum interval between chaos kills in milliseconds (randomized)
    #[serde(default = "default_chaos_max_interval_ms")]
    pub chaos_max_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_election_path() -> String {
    "/election".to_string()
}

fn default_candidate_prefix() -> String {
    "c_".to_string()
}

fn default_session_timeout_ms() -> u64 {
    3000
}

fn default_candidates() -> usize {
    3
}

fn default_chaos_min_interval_ms() -> u64 {
    2000
}

fn default_chaos_max_interval_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ElectionPathConfig {
    fn default() -> Self {
        Self {
            path: default_election_path(),
            candidate_prefix: default_candidate_prefix(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_session_timeout_ms(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            chaos: false,
            chaos_min_interval_ms: default_chaos_min_interval_ms(),
            chaos_max_interval_ms: default_chaos_max_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ElectorateConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: ElectorateConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if !self.election.path.starts_with('/') {
            return Err(crate::Error::Config(
                "election.path must be absolute (start with '/')".into(),
            ));
        }

        if self.election.path.len() > 1 && self.election.path.ends_with('/') {
            return Err(crate::Error::Config(
                "election.path must not end with '/'".into(),
            ));
        }

        if self.election.candidate_prefix.is_empty() {
            return Err(crate::Error::Config(
                "election.candidate_prefix cannot be empty".into(),
            ));
        }

        if self.election.candidate_prefix.contains('/') {
            return Err(crate::Error::Config(
                "election.candidate_prefix must not contain '/'".into(),
            ));
        }

        if self.session.timeout_ms == 0 {
            return Err(crate::Error::Config(
                "session.timeout_ms must be greater than zero".into(),
            ));
        }

        if self.simulation.candidates == 0 {
            return Err(crate::Error::Config(
                "simulation.candidates must be at least 1".into(),
            ));
        }

        if self.simulation.chaos_min_interval_ms > self.simulation.chaos_max_interval_ms {
            return Err(crate::Error::Config(
                "simulation.chaos_min_interval_ms cannot exceed chaos_max_interval_ms".into(),
            ));
        }

        Ok(())
    }

    /// Get the session timeout as Duration
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session.timeout_ms)
    }

    /// Generate an example configuration file
    pub fn example() -> String {
        let config = ElectorateConfig::default();
        toml::to_string_pretty(&config).expect("default config serializes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[election]
path = "/election"
candidate_prefix = "c_"

[session]
timeout_ms = 3000

[simulation]
candidates = 5
chaos = true
"#;

        let config = ElectorateConfig::from_str(toml).unwrap();
        assert_eq!(config.election.path, "/election");
        assert_eq!(config.simulation.candidates, 5);
        assert!(config.simulation.chaos);
        assert_eq!(config.session_timeout(), Duration::from_millis(3000));
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = ElectorateConfig::from_str("").unwrap();
        assert_eq!(config.election.path, "/election");
        assert_eq!(config.election.candidate_prefix, "c_");
        assert_eq!(config.session.timeout_ms, 3000);
        assert_eq!(config.simulation.candidates, 3);
        assert!(!config.simulation.chaos);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_rejects_relative_election_path() {
        let toml = r#"
[election]
path = "election"
"#;
        assert!(ElectorateConfig::from_str(toml).is_err());
    }

    #[test]
    fn test_rejects_zero_candidates() {
        let toml = r#"
[simulation]
candidates = 0
"#;
        assert!(ElectorateConfig::from_str(toml).is_err());
    }

    #[test]
    fn test_rejects_prefix_with_slash() {
        let toml = r#"
[election]
candidate_prefix = "c/"
"#;
        assert!(ElectorateConfig::from_str(toml).is_err());
    }

    #[test]
    fn test_example_round_trips() {
        let example = ElectorateConfig::example();
        let config = ElectorateConfig::from_str(&example).unwrap();
        assert_eq!(config.election.path, "/election");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("electorate.toml");
        std::fs::write(&path, ElectorateConfig::example()).unwrap();

        let config = ElectorateConfig::from_file(&path).unwrap();
        assert_eq!(config.election.candidate_prefix, "c_");
    }
}
