//! Immutable per-tick output of a simulation

use serde::{Deserialize, Serialize};

use super::queue_simulator::PhaseDensities;
use super::types::{DirectionalCounts, Phase, SimulationId};

/// Full state of the intersection after one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSnapshot {
    pub time_step: u64,
    /// Simulation clock in seconds
    pub timestamp: f64,
    pub vehicles: DirectionalCounts,
    pub pedestrians: DirectionalCounts,
    pub current_phase: Phase,
    /// Whole seconds the current phase has been green
    pub current_green_time: u32,
    /// Green-time budget of the current phase
    pub calculated_green_time: f64,
    pub phase1_density: f64,
    pub phase2_density: f64,
}

impl TrafficSnapshot {
    pub fn densities(&self) -> PhaseDensities {
        PhaseDensities::new(self.phase1_density, self.phase2_density)
    }

    /// Seconds left in the current green budget, never negative
    pub fn remaining_green_time(&self) -> f64 {
        (self.calculated_green_time - f64::from(self.current_green_time)).max(0.0)
    }

    /// One-line human readable form
    pub fn summary(&self) -> String {
        format!(
            "step {:>4} t={:>7.1}s {} green {:>3}/{:<4.1}s | cars N{:>2} S{:>2} E{:>2} W{:>2} | peds N{} S{} E{} W{} | density {:.2}/{:.2}",
            self.time_step,
            self.timestamp,
            self.current_phase,
            self.current_green_time,
            self.calculated_green_time,
            self.vehicles.north,
            self.vehicles.south,
            self.vehicles.east,
            self.vehicles.west,
            self.pedestrians.north,
            self.pedestrians.south,
            self.pedestrians.east,
            self.pedestrians.west,
            self.phase1_density,
            self.phase2_density,
        )
    }
}

/// Colour of one approach's vehicle light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LightColor {
    Red,
    Yellow,
    Green,
}

/// Light shown to one pair of approaches
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproachLight {
    pub color: LightColor,
    /// Seconds until the current phase ends
    pub duration: f64,
    pub pedestrian_crossing: bool,
}

/// Display view of the signal derived from a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficLightStatus {
    pub simulation_id: SimulationId,
    pub time_step: u64,
    pub timestamp: f64,
    pub north_south: ApproachLight,
    pub east_west: ApproachLight,
    pub current_green_time: u32,
    pub remaining_green_time: f64,
    pub next_phase_countdown: f64,
    pub north_south_density: f64,
    pub east_west_density: f64,
}

impl TrafficLightStatus {
    /// Project a snapshot onto per-approach lights
    ///
    /// The green approach turns yellow for the last `yellow_time` seconds of
    /// its budget. Pedestrians cross alongside the red approach.
    pub fn from_snapshot(
        simulation_id: SimulationId,
        snapshot: &TrafficSnapshot,
        yellow_time: f64,
    ) -> Self {
        let remaining = snapshot.remaining_green_time();
        let active_color = if remaining <= yellow_time {
            LightColor::Yellow
        } else {
            LightColor::Green
        };

        let light_for = |phase: Phase| {
            let active = snapshot.current_phase == phase;
            ApproachLight {
                color: if active { active_color } else { LightColor::Red },
                duration: remaining,
                pedestrian_crossing: !active,
            }
        };

        Self {
            simulation_id,
            time_step: snapshot.time_step,
            timestamp: snapshot.timestamp,
            north_south: light_for(Phase::Phase1),
            east_west: light_for(Phase::Phase2),
            current_green_time: snapshot.current_green_time,
            remaining_green_time: remaining,
            next_phase_countdown: remaining,
            north_south_density: snapshot.phase1_density,
            east_west_density: snapshot.phase2_density,
        }
    }
}
