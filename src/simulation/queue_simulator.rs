//! Stochastic vehicle and pedestrian queues
//!
//! Eight bounded counters, one vehicle queue and one pedestrian queue per
//! approach, advanced once per tick by Bernoulli arrival and service draws.
//! Which queues are serviced depends on the active phase.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::config::SimulationConfig;
use super::types::{Direction, DirectionalCounts, DirectionalRates, Phase};

/// A bounded queue on one approach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionalQueue {
    count: u32,
    capacity: u32,
}

impl DirectionalQueue {
    /// Create a queue; `count` is clamped to `capacity`
    pub fn new(count: u32, capacity: u32) -> Self {
        Self {
            count: count.min(capacity),
            capacity,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Add arrivals, saturating at capacity
    fn accumulate(&mut self, arrivals: u32) {
        self.count = self.count.saturating_add(arrivals).min(self.capacity);
    }

    /// Birth-death step for a direction with right-of-way.
    /// Returns how many left the queue.
    fn service(&mut self, arrivals: u32, served: u32) -> u32 {
        let before = self.count.saturating_add(arrivals);
        self.count = before.saturating_sub(served).min(self.capacity);
        before - before.saturating_sub(served)
    }

    /// Empty the queue, returning how many left it
    fn drain(&mut self) -> u32 {
        let drained = self.count;
        // The dashboard mock wrote this as `max(0, count - count)`; it is a plain reset.
        self.count = 0;
        drained
    }
}

/// Vehicle density of each phase group
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseDensities {
    pub phase1: f64,
    pub phase2: f64,
}

impl PhaseDensities {
    pub fn new(phase1: f64, phase2: f64) -> Self {
        Self { phase1, phase2 }
    }

    pub fn for_phase(&self, phase: Phase) -> f64 {
        match phase {
            Phase::Phase1 => self.phase1,
            Phase::Phase2 => self.phase2,
        }
    }

    pub fn total(&self) -> f64 {
        self.phase1 + self.phase2
    }
}

/// Cumulative number of road users that left their queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Throughput {
    pub vehicles_served: u64,
    pub pedestrians_crossed: u64,
}

/// Clamp a configured rate into a Bernoulli probability
fn probability(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

/// Owns all eight queues and the random source that drives them
pub struct QueueSimulator {
    vehicles: [DirectionalQueue; 4],
    pedestrians: [DirectionalQueue; 4],
    vehicle_arrival: DirectionalRates,
    pedestrian_arrival: DirectionalRates,
    service: DirectionalRates,
    vehicle_capacity: u32,
    throughput: Throughput,
    time_step: u64,
    rng: StdRng,
}

impl QueueSimulator {
    pub fn new(config: &SimulationConfig, rng: StdRng) -> Self {
        let vehicles = Direction::ALL.map(|d| {
            DirectionalQueue::new(config.initial_vehicles.get(d), config.vehicle_capacity)
        });
        let pedestrians = Direction::ALL.map(|d| {
            DirectionalQueue::new(config.initial_pedestrians.get(d), config.pedestrian_capacity)
        });

        Self {
            vehicles,
            pedestrians,
            vehicle_arrival: config.vehicle_arrival,
            pedestrian_arrival: config.pedestrian_arrival,
            service: config.service,
            vehicle_capacity: config.vehicle_capacity,
            throughput: Throughput::default(),
            time_step: 0,
            rng,
        }
    }

    fn draw(&mut self, rate: f64) -> u32 {
        u32::from(self.rng.random_bool(probability(rate)))
    }

    /// Advance every queue by one tick under `active_phase`
    ///
    /// Serviced (green) directions gain an arrival and lose a service draw,
    /// blocked (red) directions only gain arrivals. Pedestrians on the red
    /// vehicle axis cross and their queues empty; the others wait.
    pub fn advance(&mut self, active_phase: Phase) {
        for direction in Direction::ALL {
            let arrivals = self.draw(self.vehicle_arrival.get(direction));
            let queue = direction.index();
            if active_phase.serves(direction) {
                let served = self.draw(self.service.get(direction));
                let left = self.vehicles[queue].service(arrivals, served);
                self.throughput.vehicles_served += u64::from(left);
            } else {
                self.vehicles[queue].accumulate(arrivals);
            }
        }

        for direction in Direction::ALL {
            let queue = direction.index();
            if active_phase.serves(direction) {
                let arrivals = self.draw(self.pedestrian_arrival.get(direction));
                self.pedestrians[queue].accumulate(arrivals);
            } else {
                let crossed = self.pedestrians[queue].drain();
                self.throughput.pedestrians_crossed += u64::from(crossed);
            }
        }

        self.time_step += 1;
    }

    pub fn vehicle_queue(&self, direction: Direction) -> &DirectionalQueue {
        &self.vehicles[direction.index()]
    }

    pub fn pedestrian_queue(&self, direction: Direction) -> &DirectionalQueue {
        &self.pedestrians[direction.index()]
    }

    pub fn vehicles(&self) -> DirectionalCounts {
        let mut counts = DirectionalCounts::default();
        for direction in Direction::ALL {
            counts.set(direction, self.vehicle_queue(direction).count());
        }
        counts
    }

    pub fn pedestrians(&self) -> DirectionalCounts {
        let mut counts = DirectionalCounts::default();
        for direction in Direction::ALL {
            counts.set(direction, self.pedestrian_queue(direction).count());
        }
        counts
    }

    /// Vehicles of each phase group divided by the per-approach capacity
    pub fn densities(&self) -> PhaseDensities {
        let vehicles = self.vehicles();
        let capacity = f64::from(self.vehicle_capacity.max(1));
        PhaseDensities::new(
            f64::from(vehicles.phase_total(Phase::Phase1)) / capacity,
            f64::from(vehicles.phase_total(Phase::Phase2)) / capacity,
        )
    }

    pub fn throughput(&self) -> Throughput {
        self.throughput
    }

    /// Number of `advance` calls so far
    pub fn time_step(&self) -> u64 {
        self.time_step
    }
}
