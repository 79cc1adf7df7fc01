//! Config schema: context backend, routing defaults, agent identity.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParleyConfig {
    pub context: ContextConfig,
    pub routing: RoutingConfig,
    pub agent: AgentConfig,
}

/// Where contact and thread state is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextBackend {
    /// Process-local; state is lost on exit.
    #[default]
    Memory,
    Sqlite,
}

impl ContextBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for ContextBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub backend: ContextBackend,
    /// SQLite connection URL, e.g. `sqlite://parley.db`. Required for the
    /// sqlite backend.
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Default deadline for `wait_for_message`, in seconds. `0` disables it.
    pub wait_timeout_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: 300,
        }
    }
}

impl RoutingConfig {
    pub fn wait_timeout(&self) -> Option<Duration> {
        (self.wait_timeout_secs > 0).then(|| Duration::from_secs(self.wait_timeout_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Display name used in outbound profile messages.
    pub label: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            label: "parley".into(),
        }
    }
}
