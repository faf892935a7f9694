//! Two-phase signal state machine with adaptive green time
//!
//! The controller alternates PHASE_1 and PHASE_2. A phase ends once it has
//! been green for its budget; the next budget is allocated in proportion to
//! the new phase's share of the queue density, bounded by the configured
//! minimum and maximum green times.

use log::debug;
use serde::{Deserialize, Serialize};

use super::config::SimulationConfig;
use super::queue_simulator::PhaseDensities;
use super::types::Phase;

/// Timing state of the signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalTiming {
    pub active_phase: Phase,
    /// Simulation time (seconds) at which the active phase turned green
    pub phase_start_time: f64,
    /// Green-time budget of the active phase, within `[min_green, max_green]`
    pub green_duration: f64,
    /// Number of controller ticks so far
    pub time_step: u64,
}

/// Result of one controller tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub switched: bool,
}

/// Green-time budget for `new_phase` given the densities captured at the switch
///
/// An empty intersection gets `min_green`.
pub fn adaptive_green_time(
    new_phase: Phase,
    densities: PhaseDensities,
    min_green: f64,
    max_green: f64,
) -> f64 {
    let total = densities.total();
    if total > 0.0 {
        let ratio = densities.for_phase(new_phase) / total;
        (min_green + (max_green - min_green) * ratio).clamp(min_green, max_green)
    } else {
        min_green
    }
}

/// Owns the phase state machine
#[derive(Debug, Clone)]
pub struct SignalController {
    timing: SignalTiming,
    min_green: f64,
    max_green: f64,
}

impl SignalController {
    /// Start in PHASE_1 at time zero with the midpoint budget
    pub fn new(min_green: f64, max_green: f64) -> Self {
        Self {
            timing: SignalTiming {
                active_phase: Phase::Phase1,
                phase_start_time: 0.0,
                green_duration: (min_green + max_green) / 2.0,
                time_step: 0,
            },
            min_green,
            max_green,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.min_green_time, config.max_green_time)
    }

    /// Evaluate the switch guard at `now`
    ///
    /// The budget is only recomputed when the phase flips.
    pub fn tick(&mut self, now: f64, densities: PhaseDensities) -> TickOutcome {
        self.timing.time_step += 1;

        if self.elapsed(now) < self.timing.green_duration {
            return TickOutcome { switched: false };
        }

        let next = self.timing.active_phase.other();
        self.timing.active_phase = next;
        self.timing.phase_start_time = now;
        self.timing.green_duration =
            adaptive_green_time(next, densities, self.min_green, self.max_green);

        debug!(
            "Phase switched to {} at {:.1}s, green budget {:.1}s (densities {:.2}/{:.2})",
            next, now, self.timing.green_duration, densities.phase1, densities.phase2
        );

        TickOutcome { switched: true }
    }

    /// Seconds the active phase has been green at `now`
    pub fn elapsed(&self, now: f64) -> f64 {
        (now - self.timing.phase_start_time).max(0.0)
    }

    pub fn timing(&self) -> &SignalTiming {
        &self.timing
    }

    pub fn active_phase(&self) -> Phase {
        self.timing.active_phase
    }

    pub fn green_bounds(&self) -> (f64, f64) {
        (self.min_green, self.max_green)
    }
}
