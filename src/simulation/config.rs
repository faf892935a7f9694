//! Simulation configuration, scenario presets and validation
//!
//! A `SimulationConfig` is checked once when a simulation is created and is
//! read-only afterwards. Out-of-range values are rejected, never clamped.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use super::types::{
    Direction, DirectionalCounts, DirectionalRates, PEDESTRIAN_CAPACITY, VEHICLE_CAPACITY,
};

const VEHICLE_ARRIVAL_RANGE: RangeInclusive<f64> = 0.0..=10.0;
const PEDESTRIAN_ARRIVAL_RANGE: RangeInclusive<f64> = 0.0..=5.0;
const SERVICE_RANGE: RangeInclusive<f64> = 0.1..=10.0;
const MIN_GREEN_RANGE: RangeInclusive<f64> = 5.0..=30.0;
const MAX_GREEN_RANGE: RangeInclusive<f64> = 30.0..=120.0;
const YELLOW_RANGE: RangeInclusive<f64> = 1.0..=10.0;
const RED_CLEARANCE_RANGE: RangeInclusive<f64> = 1.0..=10.0;
const WEIGHT_RANGE: RangeInclusive<f64> = 0.0..=1.0;
const SWITCHING_THRESHOLD_RANGE: RangeInclusive<f64> = 1.0..=5.0;

const CAPACITY_RANGE: RangeInclusive<u32> = 1..=1000;

const DURATION_RANGE: RangeInclusive<u32> = 1..=3600;
const TIME_STEP_RANGE: RangeInclusive<u64> = 100..=10_000;

/// Rejected configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A numeric field lies outside its documented range
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
    /// A numeric field is NaN or infinite
    NotFinite { field: String },
    /// `min_green_time` is larger than `max_green_time`
    GreenBounds { min_green: f64, max_green: f64 },
    /// An initial queue count above its capacity
    InitialQueueOverCapacity {
        field: String,
        count: u32,
        capacity: u32,
    },
    /// The simulation name is empty
    EmptyName,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{field} must be between {min} and {max}, got {value}"),
            ConfigError::NotFinite { field } => write!(f, "{field} must be a finite number"),
            ConfigError::GreenBounds {
                min_green,
                max_green,
            } => write!(
                f,
                "min_green_time ({min_green}) must not exceed max_green_time ({max_green})"
            ),
            ConfigError::InitialQueueOverCapacity {
                field,
                count,
                capacity,
            } => write!(f, "{field} is {count}, above its capacity of {capacity}"),
            ConfigError::EmptyName => write!(f, "simulation name must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}

fn check_range(field: &str, value: f64, range: &RangeInclusive<f64>) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite {
            field: field.to_string(),
        });
    }
    if !range.contains(&value) {
        return Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value,
            min: *range.start(),
            max: *range.end(),
        });
    }
    Ok(())
}

fn check_capacity(field: &str, capacity: u32) -> Result<(), ConfigError> {
    if !CAPACITY_RANGE.contains(&capacity) {
        return Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value: f64::from(capacity),
            min: f64::from(*CAPACITY_RANGE.start()),
            max: f64::from(*CAPACITY_RANGE.end()),
        });
    }
    Ok(())
}

fn check_rates(
    field: &str,
    rates: &DirectionalRates,
    range: &RangeInclusive<f64>,
) -> Result<(), ConfigError> {
    for direction in Direction::ALL {
        check_range(&format!("{field}.{direction}"), rates.get(direction), range)?;
    }
    Ok(())
}

fn check_initial(
    field: &str,
    counts: &DirectionalCounts,
    capacity: u32,
) -> Result<(), ConfigError> {
    for direction in Direction::ALL {
        let count = counts.get(direction);
        if count > capacity {
            return Err(ConfigError::InitialQueueOverCapacity {
                field: format!("{field}.{direction}"),
                count,
                capacity,
            });
        }
    }
    Ok(())
}

/// Pre-configured traffic patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// Equal flow in all directions
    #[default]
    Balanced,
    /// Heavier flow on the north-south corridor
    HeavyNs,
    /// Peak flow in every direction
    RushHour,
}

impl Scenario {
    pub fn display_name(self) -> &'static str {
        match self {
            Scenario::Balanced => "Balanced Traffic",
            Scenario::HeavyNs => "Heavy North-South",
            Scenario::RushHour => "Rush Hour",
        }
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "balanced" => Ok(Scenario::Balanced),
            "heavy-ns" => Ok(Scenario::HeavyNs),
            "rush-hour" => Ok(Scenario::RushHour),
            other => Err(format!(
                "unknown scenario '{other}' (expected balanced, heavy-ns or rush-hour)"
            )),
        }
    }
}

/// Immutable input of one simulation
///
/// Rates are per-tick probabilities. Values above 1 are valid and mean the
/// event happens on every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub name: String,
    pub scenario: Scenario,
    /// Vehicle arrival rate per direction (lambda)
    pub vehicle_arrival: DirectionalRates,
    /// Pedestrian arrival rate per direction (mu)
    pub pedestrian_arrival: DirectionalRates,
    /// Vehicle service rate per direction while green (sigma)
    pub service: DirectionalRates,
    pub min_green_time: f64,
    pub max_green_time: f64,
    pub yellow_time: f64,
    pub red_clearance_time: f64,
    pub pedestrian_weight: f64,
    pub switching_threshold: f64,
    pub vehicle_performance_weight: f64,
    pub pedestrian_performance_weight: f64,
    /// Queue capacity per approach, 1 to 1000
    pub vehicle_capacity: u32,
    pub pedestrian_capacity: u32,
    pub initial_vehicles: DirectionalCounts,
    pub initial_pedestrians: DirectionalCounts,
    /// Seed for the arrival/service draws; drawn at creation when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::from_scenario(Scenario::Balanced)
    }
}

impl SimulationConfig {
    /// Build the preset configuration for a scenario
    pub fn from_scenario(scenario: Scenario) -> Self {
        let (vehicle_arrival, pedestrian_arrival, service) = match scenario {
            Scenario::Balanced => (
                DirectionalRates::uniform(0.3),
                DirectionalRates::uniform(0.1),
                DirectionalRates::uniform(0.5),
            ),
            Scenario::HeavyNs => (
                DirectionalRates::new(0.6, 0.6, 0.3, 0.3),
                DirectionalRates::uniform(0.15),
                DirectionalRates::uniform(0.5),
            ),
            Scenario::RushHour => (
                DirectionalRates::uniform(0.8),
                DirectionalRates::uniform(0.2),
                DirectionalRates::uniform(0.6),
            ),
        };

        Self {
            name: scenario.display_name().to_string(),
            scenario,
            vehicle_arrival,
            pedestrian_arrival,
            service,
            min_green_time: 15.0,
            max_green_time: 45.0,
            yellow_time: 3.0,
            red_clearance_time: 2.0,
            pedestrian_weight: 0.3,
            switching_threshold: 2.0,
            vehicle_performance_weight: 0.7,
            pedestrian_performance_weight: 0.3,
            vehicle_capacity: VEHICLE_CAPACITY,
            pedestrian_capacity: PEDESTRIAN_CAPACITY,
            initial_vehicles: DirectionalCounts::default(),
            initial_pedestrians: DirectionalCounts::default(),
            seed: None,
        }
    }

    /// Same configuration with a fixed seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject any value outside its documented range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }

        check_rates("vehicle_arrival", &self.vehicle_arrival, &VEHICLE_ARRIVAL_RANGE)?;
        check_rates("pedestrian_arrival", &self.pedestrian_arrival, &PEDESTRIAN_ARRIVAL_RANGE)?;
        check_rates("service", &self.service, &SERVICE_RANGE)?;

        if self.min_green_time > self.max_green_time {
            return Err(ConfigError::GreenBounds {
                min_green: self.min_green_time,
                max_green: self.max_green_time,
            });
        }
        check_range("min_green_time", self.min_green_time, &MIN_GREEN_RANGE)?;
        check_range("max_green_time", self.max_green_time, &MAX_GREEN_RANGE)?;

        check_range("yellow_time", self.yellow_time, &YELLOW_RANGE)?;
        check_range("red_clearance_time", self.red_clearance_time, &RED_CLEARANCE_RANGE)?;
        check_range("pedestrian_weight", self.pedestrian_weight, &WEIGHT_RANGE)?;
        check_range("switching_threshold", self.switching_threshold, &SWITCHING_THRESHOLD_RANGE)?;
        check_range(
            "vehicle_performance_weight",
            self.vehicle_performance_weight,
            &WEIGHT_RANGE,
        )?;
        check_range(
            "pedestrian_performance_weight",
            self.pedestrian_performance_weight,
            &WEIGHT_RANGE,
        )?;

        check_capacity("vehicle_capacity", self.vehicle_capacity)?;
        check_capacity("pedestrian_capacity", self.pedestrian_capacity)?;
        check_initial("initial_vehicles", &self.initial_vehicles, self.vehicle_capacity)?;
        check_initial(
            "initial_pedestrians",
            &self.initial_pedestrians,
            self.pedestrian_capacity,
        )?;

        Ok(())
    }
}

/// Payload of the `start` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(alias = "duration_seconds")]
    pub duration_seconds: u32,
    #[serde(alias = "time_step_millis")]
    pub time_step_millis: u64,
    /// Pace ticks against the wall clock; when false ticks run back to back
    #[serde(alias = "real_time")]
    pub real_time: bool,
}

impl Default for RunRequest {
    fn default() -> Self {
        Self {
            duration_seconds: 300,
            time_step_millis: 1000,
            real_time: true,
        }
    }
}

impl RunRequest {
    pub fn new(duration_seconds: u32, time_step_millis: u64, real_time: bool) -> Self {
        Self {
            duration_seconds,
            time_step_millis,
            real_time,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !DURATION_RANGE.contains(&self.duration_seconds) {
            return Err(ConfigError::OutOfRange {
                field: "duration_seconds".to_string(),
                value: f64::from(self.duration_seconds),
                min: f64::from(*DURATION_RANGE.start()),
                max: f64::from(*DURATION_RANGE.end()),
            });
        }
        if !TIME_STEP_RANGE.contains(&self.time_step_millis) {
            return Err(ConfigError::OutOfRange {
                field: "time_step_millis".to_string(),
                value: self.time_step_millis as f64,
                min: *TIME_STEP_RANGE.start() as f64,
                max: *TIME_STEP_RANGE.end() as f64,
            });
        }
        Ok(())
    }

    /// Number of ticks needed to cover the requested duration
    pub fn total_steps(&self) -> u64 {
        let duration_ms = u64::from(self.duration_seconds) * 1000;
        duration_ms.div_ceil(self.time_step_millis.max(1))
    }

    /// Simulated seconds per tick
    pub fn step_seconds(&self) -> f64 {
        self.time_step_millis as f64 / 1000.0
    }
}
