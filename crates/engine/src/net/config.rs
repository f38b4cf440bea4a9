use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::emission::{EmissionHandler, EmissionRegistry};
use crate::error::ConfigError;
use crate::pdu::{DEFAULT_PROTOCOL_VERSION, MAX_PROTOCOL_VERSION};
use crate::threshold::{parse_slot, slot_specificity, ThresholdTable, Thresholds};
use crate::trie::TypeMapping;

/// Threshold overrides in configuration units: seconds, meters and degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdSpec {
    pub max_dr_time: Option<f64>,
    pub max_position_error: Option<f64>,
    pub max_orientation_error: Option<f64>,
    pub max_age: Option<f64>,
    pub max_range: Option<f64>,
}

impl ThresholdSpec {
    /// Converts to runtime units, filling unset fields from the built-in defaults.
    pub fn to_thresholds(&self) -> Result<Thresholds, ConfigError> {
        let mut out = Thresholds::default();

        if let Some(secs) = self.max_dr_time {
            out.max_dr_time = seconds("max_dr_time", secs)?;
        }
        if let Some(meters) = self.max_position_error {
            out.max_position_error = non_negative("max_position_error", meters)?;
        }
        if let Some(degrees) = self.max_orientation_error {
            out.max_orientation_error =
                non_negative("max_orientation_error", degrees)?.to_radians() as f32;
        }
        if let Some(secs) = self.max_age {
            out.max_age = seconds("max_age", secs)?;
        }
        if let Some(meters) = self.max_range {
            if meters.is_nan() || meters <= 0.0 {
                return Err(ConfigError::BadThreshold {
                    field: "max_range",
                    value: meters,
                });
            }
            out = out.with_max_range(meters);
        }
        Ok(out)
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::BadThreshold { field, value })
    }
}

fn seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(non_negative(field, value)?)
        .map_err(|_| ConfigError::BadThreshold { field, value })
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub site: u32,
    pub application: u32,
    pub exercise: u32,
    pub protocol_version: u8,
    pub thresholds: BTreeMap<String, ThresholdSpec>,
    pub emission_handlers: Vec<EmissionHandler>,
    pub entity_types: Vec<TypeMapping>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            site: 0,
            application: 0,
            exercise: 0,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            thresholds: BTreeMap::new(),
            emission_handlers: Vec::new(),
            entity_types: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn site_id(&self) -> Result<u16, ConfigError> {
        u16::try_from(self.site).map_err(|_| ConfigError::SiteOutOfRange(self.site))
    }

    pub fn application_id(&self) -> Result<u16, ConfigError> {
        u16::try_from(self.application)
            .map_err(|_| ConfigError::ApplicationOutOfRange(self.application))
    }

    pub fn exercise_id(&self) -> Result<u8, ConfigError> {
        u8::try_from(self.exercise).map_err(|_| ConfigError::ExerciseOutOfRange(self.exercise))
    }

    pub fn version(&self) -> Result<u8, ConfigError> {
        if (1..=MAX_PROTOCOL_VERSION).contains(&self.protocol_version) {
            Ok(self.protocol_version)
        } else {
            Err(ConfigError::UnsupportedVersion(self.protocol_version))
        }
    }

    /// Builds the table with broader slots applied before narrower ones.
    pub fn threshold_table(&self) -> Result<ThresholdTable, ConfigError> {
        let mut slots = self
            .thresholds
            .iter()
            .map(|(token, spec)| Ok((parse_slot(token)?, spec.to_thresholds()?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        slots.sort_by_key(|(slot, _)| slot_specificity(*slot));

        let mut table = ThresholdTable::default();
        for ((kind, domain), value) in slots {
            table.set(value, kind, domain)?;
        }
        Ok(table)
    }

    pub fn emission_registry(&self) -> Result<EmissionRegistry, ConfigError> {
        let mut registry = EmissionRegistry::new();
        for handler in &self.emission_handlers {
            registry.register(handler.clone())?;
        }
        Ok(registry)
    }
}
