//! Remote backend with a local stand-in
//!
//! Calls go to the remote backend until it reports a connection failure.
//! From then on every call is served locally: simulations created remotely
//! are re-created under the same id with the same configuration and their
//! subscribers are re-attached, then the failed call is replayed.

use log::warn;
use std::collections::BTreeMap;

use super::local::LocalSimulationBackend;
use super::remote::RemoteBackend;
use super::{BackendError, SimulationBackend};
use crate::runtime::{SharedSubscriber, SimulationStatus, SnapshotSubscriber};
use crate::simulation::{PerformanceMetrics, RunRequest, SimulationConfig, SimulationId};

#[derive(Default)]
struct Tracked {
    config: Option<SimulationConfig>,
    subscribers: Vec<SharedSubscriber>,
}

pub struct FailoverBackend {
    primary: RemoteBackend,
    fallback: LocalSimulationBackend,
    using_fallback: bool,
    tracked: BTreeMap<SimulationId, Tracked>,
}

impl FailoverBackend {
    pub fn new(primary: RemoteBackend) -> Self {
        Self {
            primary,
            fallback: LocalSimulationBackend::new(),
            using_fallback: false,
            tracked: BTreeMap::new(),
        }
    }

    /// Whether calls are currently served by the local backend
    pub fn is_degraded(&self) -> bool {
        self.using_fallback
    }

    pub fn fallback(&mut self) -> &mut LocalSimulationBackend {
        &mut self.fallback
    }

    fn switch_to_fallback(&mut self, reason: &BackendError) {
        warn!("Remote backend unavailable ({reason}), switching to local simulation");
        self.using_fallback = true;

        for (id, tracked) in &self.tracked {
            let Some(config) = tracked.config.clone() else {
                continue;
            };
            if let Err(err) = self.fallback.adopt(*id, config) {
                warn!("Could not re-create {} locally: {}", id, err);
                continue;
            }
            for subscriber in &tracked.subscribers {
                if let Err(err) = self.fallback.subscribe(*id, Box::new(subscriber.clone())) {
                    warn!("Could not re-attach subscriber to {}: {}", id, err);
                }
            }
        }
    }

    fn dispatch<T>(
        &mut self,
        op: impl Fn(&mut dyn SimulationBackend) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        if !self.using_fallback {
            match op(&mut self.primary) {
                Err(err) if err.is_connection() => self.switch_to_fallback(&err),
                result => return result,
            }
        }
        op(&mut self.fallback)
    }
}

impl SimulationBackend for FailoverBackend {
    fn name(&self) -> &'static str {
        if self.using_fallback {
            "local (fallback)"
        } else {
            "remote"
        }
    }

    fn create_simulation(
        &mut self,
        config: SimulationConfig,
    ) -> Result<SimulationId, BackendError> {
        let id = self.dispatch(|backend| backend.create_simulation(config.clone()))?;
        self.tracked.entry(id).or_default().config = Some(config);
        Ok(id)
    }

    fn start(&mut self, id: SimulationId, request: RunRequest) -> Result<(), BackendError> {
        self.dispatch(|backend| backend.start(id, request))
    }

    fn stop(&mut self, id: SimulationId) -> Result<(), BackendError> {
        self.dispatch(|backend| backend.stop(id))
    }

    fn pause(&mut self, id: SimulationId) -> Result<(), BackendError> {
        self.dispatch(|backend| backend.pause(id))
    }

    fn resume(&mut self, id: SimulationId) -> Result<(), BackendError> {
        self.dispatch(|backend| backend.resume(id))
    }

    fn status(&mut self, id: SimulationId) -> Result<SimulationStatus, BackendError> {
        self.dispatch(|backend| backend.status(id))
    }

    fn metrics(&mut self, id: SimulationId) -> Result<PerformanceMetrics, BackendError> {
        self.dispatch(|backend| backend.metrics(id))
    }

    fn subscribe(
        &mut self,
        id: SimulationId,
        subscriber: Box<dyn SnapshotSubscriber>,
    ) -> Result<(), BackendError> {
        let shared = SharedSubscriber::new(subscriber);
        self.dispatch(|backend| backend.subscribe(id, Box::new(shared.clone())))?;
        self.tracked.entry(id).or_default().subscribers.push(shared);
        Ok(())
    }

    fn delete_simulation(&mut self, id: SimulationId) -> Result<(), BackendError> {
        self.dispatch(|backend| backend.delete_simulation(id))?;
        self.tracked.remove(&id);
        Ok(())
    }
}
