//! Engine configuration from YAML

use crate::core::node::NodeType;
use crate::transport::{PollSchedule, PollTier, TransportConfig};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level engine configuration loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub services: ServicesConfig,

    #[serde(default)]
    pub transport: TransportSettings,

    #[serde(default)]
    pub persistence: PersistenceSettings,

    /// Forwarded to every job submission; generated when absent
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Where the compute services live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,

    /// Service name overrides keyed by node type
    #[serde(default)]
    pub names: HashMap<NodeType, String>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_request_timeout(),
            names: HashMap::new(),
        }
    }
}

impl ServicesConfig {
    /// Service name for a node type, honoring overrides
    pub fn service_for(&self, node_type: NodeType) -> Option<String> {
        self.names
            .get(&node_type)
            .cloned()
            .or_else(|| node_type.default_service().map(str::to_string))
    }
}

/// Job status transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Try the push channel before polling
    #[serde(default = "default_true")]
    pub push: bool,

    #[serde(default = "default_budget")]
    pub budget_secs: u64,

    #[serde(default = "default_schedule")]
    pub schedule: Vec<TierConfig>,

    #[serde(default = "default_tail_interval")]
    pub tail_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierConfig {
    pub until_secs: u64,
    pub interval_secs: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            push: true,
            budget_secs: default_budget(),
            schedule: default_schedule(),
            tail_interval_secs: default_tail_interval(),
        }
    }
}

impl TransportSettings {
    pub fn to_transport_config(&self) -> TransportConfig {
        let tiers = self
            .schedule
            .iter()
            .map(|t| PollTier {
                until: Duration::from_secs(t.until_secs),
                interval: Duration::from_secs(t.interval_secs),
            })
            .collect();

        TransportConfig {
            schedule: PollSchedule::new(tiers, Duration::from_secs(self.tail_interval_secs)),
            budget: Duration::from_secs(self.budget_secs),
            prefer_push: self.push,
        }
    }
}

/// Which persistence backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackendKind {
    Memory,
    #[default]
    Sqlite,
    Http,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceSettings {
    #[serde(default)]
    pub backend: PersistenceBackendKind,

    /// SQLite database path (defaults under the local data dir)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Base URL of the remote pipeline store
    #[serde(default)]
    pub url: Option<String>,

    /// Send DELETE as POST with an override header
    #[serde(default)]
    pub method_override: bool,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_budget() -> u64 {
    7200
}

fn default_schedule() -> Vec<TierConfig> {
    vec![
        TierConfig { until_secs: 60, interval_secs: 3 },
        TierConfig { until_secs: 300, interval_secs: 5 },
        TierConfig { until_secs: 900, interval_secs: 10 },
    ]
}

fn default_tail_interval() -> u64 {
    30
}

impl EngineConfig {
    /// Load engine configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse engine configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the engine configuration
    pub fn validate(&self) -> Result<()> {
        if self.services.base_url.trim().is_empty() {
            anyhow::bail!("services.base_url must not be empty");
        }

        let transport = &self.transport;
        if transport.budget_secs == 0 {
            anyhow::bail!("transport.budget_secs must be greater than zero");
        }
        if transport.tail_interval_secs == 0 {
            anyhow::bail!("transport.tail_interval_secs must be greater than zero");
        }

        let mut prev: Option<TierConfig> = None;
        for tier in &transport.schedule {
            if tier.interval_secs == 0 {
                anyhow::bail!("Poll tier ending at {}s has a zero interval", tier.until_secs);
            }
            if let Some(prev) = prev {
                if tier.until_secs <= prev.until_secs {
                    anyhow::bail!(
                        "Poll tiers must be strictly increasing: {}s follows {}s",
                        tier.until_secs,
                        prev.until_secs
                    );
                }
                if tier.interval_secs < prev.interval_secs {
                    anyhow::bail!(
                        "Poll intervals must not shrink: {}s follows {}s",
                        tier.interval_secs,
                        prev.interval_secs
                    );
                }
            }
            prev = Some(*tier);
        }
        if let Some(last) = prev {
            if transport.tail_interval_secs < last.interval_secs {
                anyhow::bail!("transport.tail_interval_secs must not be shorter than the last tier");
            }
        }

        if self.persistence.backend == PersistenceBackendKind::Http && self.persistence.url.is_none() {
            anyhow::bail!("persistence.url is required for the http backend");
        }

        Ok(())
    }
}
