//! Adaptive Traffic Signal Simulation Library
//!
//! Simulates a single four-way intersection whose green time is split
//! between the north-south and east-west axes in proportion to queue
//! density. The `simulation` module holds the headless model; `runtime`
//! drives it on worker threads and `backend` hides where it runs.

pub mod backend;
pub mod config;
pub mod runtime;
pub mod simulation;
