//! Simulations hosted by an external service
//!
//! The wire framing (REST, WebSocket topics) belongs to the surrounding
//! system and is plugged in as a `RemoteTransport`. This module only maps
//! backend operations onto serializable requests and handles reconnection.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

use super::{BackendConfig, BackendError, SimulationBackend};
use crate::runtime::{SimulationStatus, SnapshotSubscriber};
use crate::simulation::{PerformanceMetrics, RunRequest, SimulationConfig, SimulationId};

/// Operation sent to the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RemoteRequest {
    Create { config: SimulationConfig },
    Start { id: SimulationId, request: RunRequest },
    Stop { id: SimulationId },
    Pause { id: SimulationId },
    Resume { id: SimulationId },
    Status { id: SimulationId },
    Metrics { id: SimulationId },
    Delete { id: SimulationId },
}

/// Successful answer from the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteResponse {
    Created { id: SimulationId },
    Ack,
    Status { status: SimulationStatus },
    Metrics { metrics: PerformanceMetrics },
}

/// Connection to a remote simulation service
///
/// Implementations report unreachable peers as `BackendError::Connection`
/// and refused operations as `BackendError::Remote`.
pub trait RemoteTransport: Send {
    fn connect(&mut self) -> Result<(), BackendError>;

    fn is_connected(&self) -> bool;

    fn call(&mut self, request: RemoteRequest) -> Result<RemoteResponse, BackendError>;

    /// Route pushed snapshots of `id` to `subscriber`
    fn subscribe(
        &mut self,
        id: SimulationId,
        subscriber: Box<dyn SnapshotSubscriber>,
    ) -> Result<(), BackendError>;
}

/// How hard to try before declaring the remote unreachable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_millis(5000),
        }
    }
}

impl From<&BackendConfig> for ReconnectPolicy {
    fn from(config: &BackendConfig) -> Self {
        Self {
            max_attempts: config.reconnect_attempts.max(1),
            interval: Duration::from_millis(config.reconnect_interval_ms),
        }
    }
}

/// Forwards every operation to a `RemoteTransport`
pub struct RemoteBackend {
    transport: Box<dyn RemoteTransport>,
    policy: ReconnectPolicy,
}

impl RemoteBackend {
    pub fn new(transport: Box<dyn RemoteTransport>, policy: ReconnectPolicy) -> Self {
        Self { transport, policy }
    }

    fn ensure_connected(&mut self) -> Result<(), BackendError> {
        if self.transport.is_connected() {
            return Ok(());
        }

        let max = self.policy.max_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=max {
            match self.transport.connect() {
                Ok(()) => {
                    info!("Connected to remote simulation backend");
                    return Ok(());
                }
                Err(err) => {
                    warn!("Attempting to reconnect... ({attempt}/{max}): {err}");
                    last_error = Some(err);
                    if attempt < max {
                        thread::sleep(self.policy.interval);
                    }
                }
            }
        }

        Err(BackendError::Connection(format!(
            "max reconnection attempts reached ({max}){}",
            last_error.map(|err| format!(": {err}")).unwrap_or_default()
        )))
    }

    fn call(&mut self, request: RemoteRequest) -> Result<RemoteResponse, BackendError> {
        self.ensure_connected()?;
        self.transport.call(request)
    }

    fn call_ack(&mut self, request: RemoteRequest) -> Result<(), BackendError> {
        match self.call(request)? {
            RemoteResponse::Ack => Ok(()),
            other => Err(unexpected(&other)),
        }
    }
}

fn unexpected(response: &RemoteResponse) -> BackendError {
    BackendError::Remote(format!("unexpected response {response:?}"))
}

impl SimulationBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn create_simulation(
        &mut self,
        config: SimulationConfig,
    ) -> Result<SimulationId, BackendError> {
        config.validate()?;
        match self.call(RemoteRequest::Create { config })? {
            RemoteResponse::Created { id } => Ok(id),
            other => Err(unexpected(&other)),
        }
    }

    fn start(&mut self, id: SimulationId, request: RunRequest) -> Result<(), BackendError> {
        request.validate()?;
        self.call_ack(RemoteRequest::Start { id, request })
    }

    fn stop(&mut self, id: SimulationId) -> Result<(), BackendError> {
        self.call_ack(RemoteRequest::Stop { id })
    }

    fn pause(&mut self, id: SimulationId) -> Result<(), BackendError> {
        self.call_ack(RemoteRequest::Pause { id })
    }

    fn resume(&mut self, id: SimulationId) -> Result<(), BackendError> {
        self.call_ack(RemoteRequest::Resume { id })
    }

    fn status(&mut self, id: SimulationId) -> Result<SimulationStatus, BackendError> {
        match self.call(RemoteRequest::Status { id })? {
            RemoteResponse::Status { status } => Ok(status),
            other => Err(unexpected(&other)),
        }
    }

    fn metrics(&mut self, id: SimulationId) -> Result<PerformanceMetrics, BackendError> {
        match self.call(RemoteRequest::Metrics { id })? {
            RemoteResponse::Metrics { metrics } => Ok(metrics),
            other => Err(unexpected(&other)),
        }
    }

    fn subscribe(
        &mut self,
        id: SimulationId,
        subscriber: Box<dyn SnapshotSubscriber>,
    ) -> Result<(), BackendError> {
        self.ensure_connected()?;
        self.transport.subscribe(id, subscriber)
    }

    fn delete_simulation(&mut self, id: SimulationId) -> Result<(), BackendError> {
        self.call_ack(RemoteRequest::Delete { id })
    }
}
