//! Tick coordinator for one intersection
//!
//! `SimWorld` glues the queue simulator and the signal controller together.
//! Each tick advances the queues under the current phase, then lets the
//! controller decide on a switch using the densities of the queues it just
//! advanced, then assembles a snapshot from both.

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use super::config::{ConfigError, SimulationConfig};
use super::metrics::{MetricsRecorder, PerformanceMetrics};
use super::queue_simulator::QueueSimulator;
use super::signal_controller::SignalController;
use super::snapshot::TrafficSnapshot;

/// One simulated intersection
pub struct SimWorld {
    config: Arc<SimulationConfig>,
    queues: QueueSimulator,
    controller: SignalController,
    metrics: MetricsRecorder,
    /// Simulation time of the last tick
    time: f64,
    seed: u64,
    switches: u64,
}

impl SimWorld {
    /// Validate `config` and build the initial state
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        Self::from_shared(Arc::new(config))
    }

    pub fn from_shared(config: Arc<SimulationConfig>) -> Result<Self, ConfigError> {
        config.validate()?;

        let seed = match config.seed {
            Some(seed) => seed,
            None => {
                let seed = rand::rng().random::<u64>();
                info!("No seed configured for '{}', using {}", config.name, seed);
                seed
            }
        };

        let queues = QueueSimulator::new(&config, StdRng::seed_from_u64(seed));
        let controller = SignalController::from_config(&config);
        let metrics = MetricsRecorder::new(
            config.vehicle_performance_weight,
            config.pedestrian_performance_weight,
        );

        Ok(Self {
            config,
            queues,
            controller,
            metrics,
            time: 0.0,
            seed,
            switches: 0,
        })
    }

    /// Run one tick ending at simulation time `now` and return its snapshot
    pub fn tick(&mut self, now: f64) -> TrafficSnapshot {
        let phase = self.controller.active_phase();
        let dt = now - self.time;

        self.queues.advance(phase);
        let densities = self.queues.densities();
        let outcome = self.controller.tick(now, densities);
        if outcome.switched {
            self.switches += 1;
        }

        self.metrics.record(
            phase,
            dt,
            &self.queues.vehicles(),
            &self.queues.pedestrians(),
        );
        self.time = now.max(self.time);

        debug_assert_eq!(self.queues.time_step(), self.controller.timing().time_step);
        self.snapshot()
    }

    /// Snapshot of the current state without advancing it
    pub fn snapshot(&self) -> TrafficSnapshot {
        let timing = self.controller.timing();
        let densities = self.queues.densities();
        TrafficSnapshot {
            time_step: timing.time_step,
            timestamp: self.time,
            vehicles: self.queues.vehicles(),
            pedestrians: self.queues.pedestrians(),
            current_phase: timing.active_phase,
            current_green_time: self.controller.elapsed(self.time).floor() as u32,
            calculated_green_time: timing.green_duration,
            phase1_density: densities.phase1,
            phase2_density: densities.phase2,
        }
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        self.metrics.summarize(self.queues.throughput())
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn shared_config(&self) -> Arc<SimulationConfig> {
        Arc::clone(&self.config)
    }

    pub fn queues(&self) -> &QueueSimulator {
        &self.queues
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Seed used for the random draws, for replaying a run
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of phase switches so far
    pub fn phase_switches(&self) -> u64 {
        self.switches
    }
}
