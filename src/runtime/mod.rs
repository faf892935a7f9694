//! Scheduling and snapshot delivery around the simulation core

mod runner;
mod subscriber;

pub use runner::{RunStatus, SimulationRunner, SimulationStatus};
pub use subscriber::{ChannelSubscriber, SharedSubscriber, SnapshotSubscriber, SubscriberList};
