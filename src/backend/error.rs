use std::fmt;

use crate::simulation::{ConfigError, SimulationId};

/// Failure of a backend operation
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The configuration or run request was rejected
    Config(ConfigError),
    /// No simulation with this id
    NotFound(SimulationId),
    /// The operation does not fit the simulation's current state
    InvalidState(String),
    /// The remote backend could not be reached
    Connection(String),
    /// The remote backend answered with an error or an unexpected response
    Remote(String),
    /// The simulation worker thread failed
    Worker(String),
}

impl BackendError {
    pub fn is_connection(&self) -> bool {
        matches!(self, BackendError::Connection(_))
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Config(err) => write!(f, "invalid configuration: {err}"),
            BackendError::NotFound(id) => write!(f, "simulation {id} not found"),
            BackendError::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            BackendError::Connection(msg) => write!(f, "connection failed: {msg}"),
            BackendError::Remote(msg) => write!(f, "remote backend error: {msg}"),
            BackendError::Worker(msg) => write!(f, "simulation worker error: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BackendError::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for BackendError {
    fn from(err: ConfigError) -> Self {
        BackendError::Config(err)
    }
}
