//! Where simulations run
//!
//! Callers talk to a `SimulationBackend` and do not care whether the
//! simulation is hosted by a remote service or runs in this process.

mod error;
mod failover;
mod local;
mod remote;

use log::warn;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use error::BackendError;
pub use failover::FailoverBackend;
pub use local::LocalSimulationBackend;
pub use remote::{ReconnectPolicy, RemoteBackend, RemoteRequest, RemoteResponse, RemoteTransport};

use crate::runtime::{SimulationStatus, SnapshotSubscriber};
use crate::simulation::{PerformanceMetrics, RunRequest, SimulationConfig, SimulationId};

/// Operations every simulation host supports
pub trait SimulationBackend: Send {
    fn name(&self) -> &'static str;

    /// Validate `config` and register a new idle simulation
    fn create_simulation(&mut self, config: SimulationConfig) -> Result<SimulationId, BackendError>;

    fn start(&mut self, id: SimulationId, request: RunRequest) -> Result<(), BackendError>;

    /// Cancel the run, keeping the last state
    fn stop(&mut self, id: SimulationId) -> Result<(), BackendError>;

    fn pause(&mut self, id: SimulationId) -> Result<(), BackendError>;

    fn resume(&mut self, id: SimulationId) -> Result<(), BackendError>;

    fn status(&mut self, id: SimulationId) -> Result<SimulationStatus, BackendError>;

    fn metrics(&mut self, id: SimulationId) -> Result<PerformanceMetrics, BackendError>;

    fn subscribe(
        &mut self,
        id: SimulationId,
        subscriber: Box<dyn SnapshotSubscriber>,
    ) -> Result<(), BackendError>;

    fn delete_simulation(&mut self, id: SimulationId) -> Result<(), BackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(BackendKind::Local),
            "remote" => Ok(BackendKind::Remote),
            other => Err(format!("unknown backend '{other}' (expected local or remote)")),
        }
    }
}

/// `[backend]` section of the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub reconnect_attempts: u32,
    pub reconnect_interval_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Local,
            reconnect_attempts: 10,
            reconnect_interval_ms: 5000,
        }
    }
}

/// Build the backend named by `config`
///
/// A remote backend always comes wrapped in a local fallback. Asking for a
/// remote backend without a transport yields the local one.
pub fn select_backend(
    config: &BackendConfig,
    transport: Option<Box<dyn RemoteTransport>>,
) -> Box<dyn SimulationBackend> {
    match (config.kind, transport) {
        (BackendKind::Remote, Some(transport)) => {
            let remote = RemoteBackend::new(transport, ReconnectPolicy::from(config));
            Box::new(FailoverBackend::new(remote))
        }
        (BackendKind::Remote, None) => {
            warn!("Remote backend requested but no transport is available, using local simulation");
            Box::new(LocalSimulationBackend::new())
        }
        (BackendKind::Local, _) => Box::new(LocalSimulationBackend::new()),
    }
}
