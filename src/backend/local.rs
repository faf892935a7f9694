//! In-process simulations

use log::info;
use std::collections::BTreeMap;

use super::{BackendError, SimulationBackend};
use crate::runtime::{SimulationRunner, SimulationStatus, SnapshotSubscriber};
use crate::simulation::{PerformanceMetrics, RunRequest, SimWorld, SimulationConfig, SimulationId};

/// Runs every simulation on a local worker thread
pub struct LocalSimulationBackend {
    simulations: BTreeMap<SimulationId, SimulationRunner>,
    next_id: u64,
}

impl Default for LocalSimulationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSimulationBackend {
    pub fn new() -> Self {
        Self {
            simulations: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Register `config` under an id issued elsewhere
    ///
    /// Replaces any simulation already holding that id.
    pub fn adopt(
        &mut self,
        id: SimulationId,
        config: SimulationConfig,
    ) -> Result<(), BackendError> {
        let runner = SimulationRunner::new(id, config)?;
        self.simulations.insert(id, runner);
        self.next_id = self.next_id.max(id.0 + 1);
        Ok(())
    }

    fn runner(&mut self, id: SimulationId) -> Result<&mut SimulationRunner, BackendError> {
        self.simulations
            .get_mut(&id)
            .ok_or(BackendError::NotFound(id))
    }

    /// Block until the simulation's current run ends
    pub fn wait(&mut self, id: SimulationId) -> Result<SimulationStatus, BackendError> {
        let runner = self.runner(id)?;
        runner.wait()?;
        Ok(runner.status())
    }

    /// Inspect a simulation that is not running
    pub fn world(&self, id: SimulationId) -> Option<&SimWorld> {
        self.simulations.get(&id).and_then(|runner| runner.world())
    }

    pub fn ids(&self) -> Vec<SimulationId> {
        self.simulations.keys().copied().collect()
    }
}

impl SimulationBackend for LocalSimulationBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn create_simulation(
        &mut self,
        config: SimulationConfig,
    ) -> Result<SimulationId, BackendError> {
        let id = SimulationId(self.next_id);
        let name = config.name.clone();
        let runner = SimulationRunner::new(id, config)?;
        self.simulations.insert(id, runner);
        self.next_id += 1;
        info!("Created {} '{}'", id, name);
        Ok(id)
    }

    fn start(&mut self, id: SimulationId, request: RunRequest) -> Result<(), BackendError> {
        self.runner(id)?.start(request)
    }

    fn stop(&mut self, id: SimulationId) -> Result<(), BackendError> {
        self.runner(id)?.stop()
    }

    fn pause(&mut self, id: SimulationId) -> Result<(), BackendError> {
        self.runner(id)?.pause()
    }

    fn resume(&mut self, id: SimulationId) -> Result<(), BackendError> {
        self.runner(id)?.resume()
    }

    fn status(&mut self, id: SimulationId) -> Result<SimulationStatus, BackendError> {
        Ok(self.runner(id)?.status())
    }

    fn metrics(&mut self, id: SimulationId) -> Result<PerformanceMetrics, BackendError> {
        Ok(self.runner(id)?.metrics())
    }

    fn subscribe(
        &mut self,
        id: SimulationId,
        subscriber: Box<dyn SnapshotSubscriber>,
    ) -> Result<(), BackendError> {
        self.runner(id)?.subscribe(subscriber);
        Ok(())
    }

    fn delete_simulation(&mut self, id: SimulationId) -> Result<(), BackendError> {
        let mut runner = self.simulations.remove(&id).ok_or(BackendError::NotFound(id))?;
        runner.stop()?;
        info!("Deleted {}", id);
        Ok(())
    }
}
