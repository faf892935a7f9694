//! Performance metrics accumulated over a run
//!
//! Waiting times follow Little's law: total queued time divided by the
//! number of road users that left the queue.

use log::info;
use serde::{Deserialize, Serialize};

use super::queue_simulator::Throughput;
use super::types::{DirectionalCounts, Phase};

/// Summary of how well the signal served its users
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub total_time_steps: u64,
    pub average_vehicle_waiting_time: f64,
    pub average_pedestrian_waiting_time: f64,
    /// Weighted sum of the two average waits; lower is better
    pub combined_performance_index: f64,
    pub total_vehicles_processed: u64,
    pub total_pedestrians_processed: u64,
    pub phase1_total_time: f64,
    pub phase2_total_time: f64,
}

impl PerformanceMetrics {
    pub fn print_summary(&self) {
        info!("Time steps: {}", self.total_time_steps);
        info!("Vehicles processed: {}", self.total_vehicles_processed);
        info!("Pedestrians processed: {}", self.total_pedestrians_processed);
        info!(
            "Average vehicle wait: {:.2}s",
            self.average_vehicle_waiting_time
        );
        info!(
            "Average pedestrian wait: {:.2}s",
            self.average_pedestrian_waiting_time
        );
        info!(
            "Combined performance index: {:.3}",
            self.combined_performance_index
        );
        info!(
            "Phase time: PHASE_1 {:.1}s, PHASE_2 {:.1}s",
            self.phase1_total_time, self.phase2_total_time
        );
    }
}

/// Running totals fed once per tick
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder {
    vehicle_weight: f64,
    pedestrian_weight: f64,
    vehicle_queue_seconds: f64,
    pedestrian_queue_seconds: f64,
    phase1_time: f64,
    phase2_time: f64,
    time_steps: u64,
}

impl MetricsRecorder {
    pub fn new(vehicle_weight: f64, pedestrian_weight: f64) -> Self {
        Self {
            vehicle_weight,
            pedestrian_weight,
            ..Self::default()
        }
    }

    /// Account for `dt` seconds spent in `phase` with the given queues
    pub fn record(
        &mut self,
        phase: Phase,
        dt: f64,
        vehicles: &DirectionalCounts,
        pedestrians: &DirectionalCounts,
    ) {
        let dt = dt.max(0.0);
        self.vehicle_queue_seconds += f64::from(vehicles.total()) * dt;
        self.pedestrian_queue_seconds += f64::from(pedestrians.total()) * dt;
        match phase {
            Phase::Phase1 => self.phase1_time += dt,
            Phase::Phase2 => self.phase2_time += dt,
        }
        self.time_steps += 1;
    }

    pub fn summarize(&self, throughput: Throughput) -> PerformanceMetrics {
        let average = |queued: f64, processed: u64| {
            if processed > 0 {
                queued / processed as f64
            } else {
                0.0
            }
        };
        let vehicle_wait = average(self.vehicle_queue_seconds, throughput.vehicles_served);
        let pedestrian_wait =
            average(self.pedestrian_queue_seconds, throughput.pedestrians_crossed);

        PerformanceMetrics {
            total_time_steps: self.time_steps,
            average_vehicle_waiting_time: vehicle_wait,
            average_pedestrian_waiting_time: pedestrian_wait,
            combined_performance_index: self.vehicle_weight * vehicle_wait
                + self.pedestrian_weight * pedestrian_wait,
            total_vehicles_processed: throughput.vehicles_served,
            total_pedestrians_processed: throughput.pedestrians_crossed,
            phase1_total_time: self.phase1_time,
            phase2_total_time: self.phase2_time,
        }
    }
}
