//! Core types for the signal simulation
//!
//! Plain value types shared by the queue simulator, the signal controller
//! and the snapshots they produce.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default maximum number of vehicles waiting on one approach
pub const VEHICLE_CAPACITY: u32 = 15;

/// Default maximum number of pedestrians waiting at one crossing
pub const PEDESTRIAN_CAPACITY: u32 = 8;

/// One of the four approaches to the intersection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// All directions in the fixed order used for random draws
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// The phase in which this direction has the green vehicle light
    pub fn phase(self) -> Phase {
        match self {
            Direction::North | Direction::South => Phase::Phase1,
            Direction::East | Direction::West => Phase::Phase2,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Direction::North => 0,
            Direction::South => 1,
            Direction::East => 2,
            Direction::West => 3,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        };
        f.write_str(name)
    }
}

/// Which pair of directions currently has the green vehicle light
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// North-south green, east-west red
    #[serde(rename = "PHASE_1")]
    Phase1,
    /// East-west green, north-south red
    #[serde(rename = "PHASE_2")]
    Phase2,
}

impl Phase {
    /// The phase that follows this one
    pub fn other(self) -> Phase {
        match self {
            Phase::Phase1 => Phase::Phase2,
            Phase::Phase2 => Phase::Phase1,
        }
    }

    /// The two directions aligned with this phase
    pub fn directions(self) -> [Direction; 2] {
        match self {
            Phase::Phase1 => [Direction::North, Direction::South],
            Phase::Phase2 => [Direction::East, Direction::West],
        }
    }

    /// Whether `direction` has right-of-way during this phase
    pub fn serves(self, direction: Direction) -> bool {
        direction.phase() == self
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Phase1 => f.write_str("PHASE_1"),
            Phase::Phase2 => f.write_str("PHASE_2"),
        }
    }
}

/// A count per direction (queue lengths)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalCounts {
    pub north: u32,
    pub south: u32,
    pub east: u32,
    pub west: u32,
}

impl DirectionalCounts {
    pub fn new(north: u32, south: u32, east: u32, west: u32) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    pub fn get(&self, direction: Direction) -> u32 {
        match direction {
            Direction::North => self.north,
            Direction::South => self.south,
            Direction::East => self.east,
            Direction::West => self.west,
        }
    }

    pub fn set(&mut self, direction: Direction, value: u32) {
        match direction {
            Direction::North => self.north = value,
            Direction::South => self.south = value,
            Direction::East => self.east = value,
            Direction::West => self.west = value,
        }
    }

    pub fn total(&self) -> u32 {
        Direction::ALL
            .iter()
            .fold(0, |sum, d| sum.saturating_add(self.get(*d)))
    }

    /// Sum of the two directions aligned with `phase`
    pub fn phase_total(&self, phase: Phase) -> u32 {
        phase
            .directions()
            .iter()
            .fold(0, |sum, d| sum.saturating_add(self.get(*d)))
    }
}

/// A rate per direction (arrival or service probability per tick)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalRates {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl DirectionalRates {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// Same rate on every approach
    pub fn uniform(rate: f64) -> Self {
        Self::new(rate, rate, rate, rate)
    }

    pub fn get(&self, direction: Direction) -> f64 {
        match direction {
            Direction::North => self.north,
            Direction::South => self.south,
            Direction::East => self.east,
            Direction::West => self.west,
        }
    }

    pub fn set(&mut self, direction: Direction, value: f64) {
        match direction {
            Direction::North => self.north = value,
            Direction::South => self.south = value,
            Direction::East => self.east = value,
            Direction::West => self.west = value,
        }
    }
}

/// Identifier of a simulation instance held by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimulationId(pub u64);

impl fmt::Display for SimulationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sim-{}", self.0)
    }
}
