//! Microgrid configuration: allocation policy, tariffs, simulation events,
//! and the TOML-based scenario file format.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sim::clock::SimMode;

/// Community pool allocation policy.
///
/// Only equal-share allocation is implemented; `need` and `cap` are accepted
/// for forward compatibility and currently dispatch to the same routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationPolicy {
    #[default]
    Equal,
    Need,
    Cap,
}

/// Disruption categories that can be injected while the simulation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Outage,
    Cloudburst,
    Heatwave,
    EvSurge,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Outage => "OUTAGE",
            Self::Cloudburst => "CLOUDBURST",
            Self::Heatwave => "HEATWAVE",
            Self::EvSurge => "EV_SURGE",
        };
        write!(f, "{name}")
    }
}

/// Optional per-event overrides for the built-in modifier defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EventParams {
    /// PV multiplier during a CLOUDBURST (default 0.4).
    pub pv_multiplier: Option<f64>,
    /// Load multiplier during a HEATWAVE (default 1.15).
    pub load_multiplier: Option<f64>,
    /// Additive demand during an EV_SURGE, in kW (default 3.0).
    pub ev_surge_kw: Option<f64>,
}

/// A disruption window in minute-of-day space.
///
/// `end_minute` is exclusive and may exceed 1439 when an event is injected
/// near midnight; such a tail can never match the next day's minute-of-day,
/// so the event silently expires at the day boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationEvent {
    pub kind: EventKind,
    /// Start minute of day (inclusive).
    pub start_minute: u32,
    /// End minute (exclusive, not wrapped at midnight).
    pub end_minute: u32,
    #[serde(default)]
    pub params: EventParams,
}

impl SimulationEvent {
    /// Returns `true` when `minute_of_day` falls within `[start, end)`.
    pub fn is_active(&self, minute_of_day: u32) -> bool {
        minute_of_day >= self.start_minute && minute_of_day < self.end_minute
    }
}

/// Live microgrid configuration owned by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MicrogridConfig {
    /// Pool allocation policy selector.
    pub allocation: AllocationPolicy,
    /// Community fair rate for pooled energy (cents/kWh).
    pub fair_rate_cents_per_kwh: f64,
    /// Grid import tariff (cents/kWh).
    pub import_price_cents: f64,
    /// Grid export remuneration (cents/kWh).
    pub export_price_cents: f64,
    /// Append-only list of injected events; stale windows simply stop
    /// matching, nothing prunes them.
    pub events: Vec<SimulationEvent>,
}

impl Default for MicrogridConfig {
    fn default() -> Self {
        Self {
            allocation: AllocationPolicy::Equal,
            fair_rate_cents_per_kwh: 18.0,
            import_price_cents: 30.0,
            export_price_cents: 7.0,
            events: Vec::new(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, Error)]
#[error("config error: {field} — {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.seed"` or `"homes[3].battery_kwh"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub(crate) fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Simulation timing and reproducibility parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSettings {
    /// Master random seed for the dispatch noise generator.
    pub seed: u64,
    /// Clock mode: `"realtime"` (1:1) or `"accelerated"` (120:1).
    pub mode: SimMode,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            mode: SimMode::Accelerated,
        }
    }
}

/// Tariff rates applied by billing collaborators; the core only carries them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TariffSettings {
    pub fair_rate_cents_per_kwh: f64,
    pub import_price_cents: f64,
    pub export_price_cents: f64,
}

impl Default for TariffSettings {
    fn default() -> Self {
        Self {
            fair_rate_cents_per_kwh: 18.0,
            import_price_cents: 30.0,
            export_price_cents: 7.0,
        }
    }
}

/// Static description of one home in the roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HomeSpec {
    pub id: String,
    /// PV nameplate capacity (kWp).
    pub pv_kwp: f64,
    /// Battery capacity (kWh). Charge/discharge rates derive as 0.5C.
    pub battery_kwh: f64,
    /// Load scale factor relative to the normalized curve.
    pub scale: f64,
    /// Marks a home whose unmet demand matters most during outages.
    #[serde(default)]
    pub critical: bool,
}

/// Top-level scenario configuration parsed from TOML.
///
/// All fields default to the built-in neighborhood: 20 homes with varied PV,
/// battery, and load parameters. Load from TOML with
/// [`ScenarioConfig::from_toml_file`] or use [`ScenarioConfig::default`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Simulation timing and seed.
    pub simulation: SimulationSettings,
    /// Tariff rates.
    pub tariffs: TariffSettings,
    /// Home roster; replaces the default neighborhood entirely when present.
    pub homes: Vec<HomeSpec>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationSettings::default(),
            tariffs: TariffSettings::default(),
            homes: default_roster(),
        }
    }
}

impl ScenarioConfig {
    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Builds the live config carried by the engine from the tariff section.
    pub fn microgrid_config(&self) -> MicrogridConfig {
        MicrogridConfig {
            allocation: AllocationPolicy::Equal,
            fair_rate_cents_per_kwh: self.tariffs.fair_rate_cents_per_kwh,
            import_price_cents: self.tariffs.import_price_cents,
            export_price_cents: self.tariffs.export_price_cents,
            events: Vec::new(),
        }
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let t = &self.tariffs;
        if t.fair_rate_cents_per_kwh < 0.0 {
            errors.push(ConfigError::new(
                "tariffs.fair_rate_cents_per_kwh",
                "must be >= 0",
            ));
        }
        if t.import_price_cents < 0.0 {
            errors.push(ConfigError::new("tariffs.import_price_cents", "must be >= 0"));
        }
        if t.export_price_cents < 0.0 {
            errors.push(ConfigError::new("tariffs.export_price_cents", "must be >= 0"));
        }

        if self.homes.is_empty() {
            errors.push(ConfigError::new("homes", "at least one home is required"));
        }
        for (i, home) in self.homes.iter().enumerate() {
            if home.id.is_empty() {
                errors.push(ConfigError::new(format!("homes[{i}].id"), "must not be empty"));
            }
            if home.pv_kwp < 0.0 {
                errors.push(ConfigError::new(format!("homes[{i}].pv_kwp"), "must be >= 0"));
            }
            if home.battery_kwh <= 0.0 {
                errors.push(ConfigError::new(
                    format!("homes[{i}].battery_kwh"),
                    "must be > 0",
                ));
            }
            if home.scale <= 0.0 {
                errors.push(ConfigError::new(format!("homes[{i}].scale"), "must be > 0"));
            }
        }
        for (i, home) in self.homes.iter().enumerate() {
            if self.homes[..i].iter().any(|h| h.id == home.id) {
                errors.push(ConfigError::new(
                    format!("homes[{i}].id"),
                    format!("duplicate id \"{}\"", home.id),
                ));
            }
        }

        errors
    }
}

/// The built-in neighborhood: 20 homes with varied PV sizing, storage, and
/// household scale; a handful carry critical loads.
pub fn default_roster() -> Vec<HomeSpec> {
    let table: [(&str, f64, f64, f64, bool); 20] = [
        ("H1", 8.0, 13.5, 1.0, false),
        ("H2", 6.5, 10.0, 1.1, false),
        ("H3", 7.5, 12.0, 0.9, false),
        ("H4", 5.0, 8.0, 1.3, true),
        ("H5", 6.0, 10.0, 1.0, false),
        ("H6", 4.5, 7.0, 1.4, true),
        ("H7", 5.5, 9.0, 1.2, false),
        ("H8", 7.0, 11.0, 0.9, false),
        ("H9", 3.5, 5.0, 1.5, true),
        ("H10", 6.5, 10.5, 1.1, false),
        ("H11", 7.0, 11.0, 1.0, false),
        ("H12", 5.5, 9.0, 1.2, false),
        ("H13", 6.0, 10.0, 1.1, true),
        ("H14", 4.0, 6.0, 1.4, false),
        ("H15", 7.5, 12.0, 0.9, false),
        ("H16", 5.0, 8.0, 1.3, true),
        ("H17", 6.5, 10.0, 1.0, false),
        ("H18", 8.0, 13.5, 0.8, false),
        ("H19", 4.5, 7.0, 1.5, true),
        ("H20", 6.0, 10.0, 1.1, false),
    ];

    table
        .into_iter()
        .map(|(id, pv_kwp, battery_kwh, scale, critical)| HomeSpec {
            id: id.to_string(),
            pv_kwp,
            battery_kwh,
            scale,
            critical,
        })
        .collect()
}
