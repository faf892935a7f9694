//! Adaptive signal simulation core
//!
//! Everything needed to simulate one four-way intersection: stochastic
//! queues, the two-phase signal controller and the tick coordinator that
//! turns them into snapshots. No I/O and no threads live here.

mod config;
mod metrics;
mod queue_simulator;
mod signal_controller;
mod snapshot;
mod types;
mod world;

pub use config::{ConfigError, RunRequest, Scenario, SimulationConfig};
pub use metrics::{MetricsRecorder, PerformanceMetrics};
pub use queue_simulator::{DirectionalQueue, PhaseDensities, QueueSimulator, Throughput};
pub use signal_controller::{adaptive_green_time, SignalController, SignalTiming, TickOutcome};
pub use snapshot::{ApproachLight, LightColor, TrafficLightStatus, TrafficSnapshot};
pub use types::{
    Direction, DirectionalCounts, DirectionalRates, Phase, SimulationId, PEDESTRIAN_CAPACITY,
    VEHICLE_CAPACITY,
};
pub use world::SimWorld;
