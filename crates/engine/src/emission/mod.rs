mod pool;

use serde::Deserialize;

pub use pool::{EmissionQuery, QueryPool, Reset};

use crate::error::ConfigError;
use crate::pdu::{EmitterSystem, EmitterSystemType, FundamentalParameters};

pub const MAX_EMISSION_HANDLERS: usize = 16;

/// Which emitter systems a handler claims. A zero function matches any function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EmitterMatch {
    pub name: u16,
    #[serde(default)]
    pub function: u8,
}

impl EmitterMatch {
    pub fn accepts(&self, system: &EmitterSystemType) -> bool {
        self.name == system.name && (self.function == 0 || self.function == system.function)
    }
}

/// RF interaction settings for one class of emitter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EmissionHandler {
    pub name: String,
    #[serde(default)]
    pub system: Option<EmitterMatch>,
    #[serde(default)]
    pub default_incoming: bool,
    #[serde(default)]
    pub default_outgoing: bool,
    #[serde(default)]
    pub frequency: f32,
    #[serde(default)]
    pub effective_radiated_power: f32,
    #[serde(default)]
    pub pulse_repetition_frequency: f32,
    #[serde(default)]
    pub pulse_width: f32,
}

impl EmissionHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn matching(mut self, name: u16, function: u8) -> Self {
        self.system = Some(EmitterMatch { name, function });
        self
    }

    pub fn default_incoming(mut self) -> Self {
        self.default_incoming = true;
        self
    }

    pub fn default_outgoing(mut self) -> Self {
        self.default_outgoing = true;
        self
    }

    pub fn accepts(&self, system: &EmitterSystemType) -> bool {
        self.system.is_some_and(|m| m.accepts(system))
    }

    pub fn beam_parameters(&self) -> FundamentalParameters {
        FundamentalParameters {
            frequency: self.frequency,
            effective_radiated_power: self.effective_radiated_power,
            pulse_repetition_frequency: self.pulse_repetition_frequency,
            pulse_width: self.pulse_width,
            ..Default::default()
        }
    }
}

/// Bounded, ordered handler table. Earlier entries win ties.
#[derive(Debug, Clone, Default)]
pub struct EmissionRegistry {
    handlers: Vec<EmissionHandler>,
}

impl EmissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: EmissionHandler) -> Result<usize, ConfigError> {
        if self.handlers.len() >= MAX_EMISSION_HANDLERS {
            return Err(ConfigError::TooManyHandlers(MAX_EMISSION_HANDLERS));
        }
        self.handlers.push(handler);
        Ok(self.handlers.len() - 1)
    }

    pub fn get(&self, index: usize) -> Option<&EmissionHandler> {
        self.handlers.get(index)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Handler for one of our own sensors, falling back to the default-outgoing entry.
    pub fn find_for_local_sensor(&self, system: &EmitterSystemType) -> Option<usize> {
        self.find(system)
            .or_else(|| self.handlers.iter().position(|h| h.default_outgoing))
    }

    /// Handler for a system reported by a peer, falling back to the default-incoming entry.
    pub fn find_for_remote_system(&self, system: &EmitterSystem) -> Option<usize> {
        self.find(&system.system_type)
            .or_else(|| self.handlers.iter().position(|h| h.default_incoming))
    }

    fn find(&self, system: &EmitterSystemType) -> Option<usize> {
        self.handlers.iter().position(|h| h.accepts(system))
    }
}
