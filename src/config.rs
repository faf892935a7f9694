//! Configuration file
//!
//! Every section is optional; missing values fall back to the balanced
//! scenario, a five minute real-time run and the local backend.
//!
//! ```toml
//! [simulation]
//! scenario = "heavy-ns"
//! min_green_time = 10.0
//! max_green_time = 60.0
//!
//! [run]
//! duration_seconds = 120
//! time_step_millis = 500
//! real_time = false
//!
//! [backend]
//! kind = "local"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::backend::BackendConfig;
use crate::simulation::{RunRequest, Scenario, SimulationConfig};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub run: RunRequest,
    #[serde(default)]
    pub backend: BackendConfig,
}

impl AppConfig {
    /// Parse a configuration; `[simulation]` values override the preset of
    /// the scenario it names
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut raw: toml::Table = toml::from_str(text).context("invalid TOML")?;

        if let Some(simulation) = raw.remove("simulation") {
            let scenario = match simulation.get("scenario").and_then(toml::Value::as_str) {
                Some(name) => name.parse::<Scenario>().map_err(anyhow::Error::msg)?,
                None => Scenario::default(),
            };
            let mut merged = toml::Value::try_from(SimulationConfig::from_scenario(scenario))
                .context("failed to encode scenario preset")?;
            merge(&mut merged, simulation);
            if let toml::Value::Table(table) = &mut merged {
                table.insert(
                    "scenario".to_string(),
                    toml::Value::try_from(scenario).context("failed to encode scenario")?,
                );
            }
            raw.insert("simulation".to_string(), merged);
        }

        toml::Value::Table(raw)
            .try_into()
            .context("invalid configuration")
    }

    /// Read and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.simulation
            .validate()
            .context("invalid [simulation] section")?;
        self.run.validate().context("invalid [run] section")?;
        Ok(())
    }
}

/// Overlay `overlay` onto `base`, recursing into tables
fn merge(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
