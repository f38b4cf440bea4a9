use std::time::Duration;

use crate::error::ConfigError;

/// Kind/domain sentinel meaning "every value not configured more specifically".
pub const ANY: u8 = 255;
pub const MAX_KINDS: usize = 16;
pub const MAX_DOMAINS: usize = 16;

pub const DEFAULT_MAX_DR_TIME: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_POSITION_ERROR: f64 = 1.0;
pub const DEFAULT_MAX_ORIENTATION_ERROR_DEG: f32 = 3.0;
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(12);

/// Synchronization tunables for one entity class. Orientation error is in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub max_dr_time: Duration,
    pub max_position_error: f64,
    pub max_orientation_error: f32,
    pub max_age: Duration,
    pub(crate) max_range: f64,
    pub(crate) max_range_sq: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_dr_time: DEFAULT_MAX_DR_TIME,
            max_position_error: DEFAULT_MAX_POSITION_ERROR,
            max_orientation_error: DEFAULT_MAX_ORIENTATION_ERROR_DEG.to_radians(),
            max_age: DEFAULT_MAX_AGE,
            max_range: f64::INFINITY,
            max_range_sq: f64::INFINITY,
        }
    }
}

impl Thresholds {
    pub fn with_max_range(mut self, max_range: f64) -> Self {
        self.max_range = max_range;
        self.max_range_sq = max_range * max_range;
        self
    }

    pub fn max_range(&self) -> f64 {
        self.max_range
    }

    pub fn max_range_sq(&self) -> f64 {
        self.max_range_sq
    }
}

/// Per (kind, domain) thresholds. `set` propagates broadcast values into every
/// matching cell, so `get` is a single index.
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    cells: Vec<Thresholds>,
    fallback: Thresholds,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

impl ThresholdTable {
    pub fn new(initial: Thresholds) -> Self {
        Self {
            cells: vec![initial; MAX_KINDS * MAX_DOMAINS],
            fallback: initial,
        }
    }

    pub fn set(&mut self, value: Thresholds, kind: u8, domain: u8) -> Result<(), ConfigError> {
        let kinds = Self::range(kind, MAX_KINDS).ok_or(ConfigError::SlotOutOfRange { kind, domain })?;
        let domains =
            Self::range(domain, MAX_DOMAINS).ok_or(ConfigError::SlotOutOfRange { kind, domain })?;

        for k in kinds {
            for d in domains.clone() {
                self.cells[k * MAX_DOMAINS + d] = value;
            }
        }
        if kind == ANY && domain == ANY {
            self.fallback = value;
        }
        Ok(())
    }

    pub fn get(&self, kind: u8, domain: u8) -> &Thresholds {
        let (k, d) = (kind as usize, domain as usize);
        if k < MAX_KINDS && d < MAX_DOMAINS {
            &self.cells[k * MAX_DOMAINS + d]
        } else {
            &self.fallback
        }
    }

    fn range(value: u8, max: usize) -> Option<std::ops::Range<usize>> {
        match value {
            ANY => Some(0..max),
            v if (v as usize) < max => Some(v as usize..v as usize + 1),
            _ => None,
        }
    }
}

/// Parses `K<kind>`, `K<kind>D<domain>` or `default` into a (kind, domain) slot.
pub fn parse_slot(token: &str) -> Result<(u8, u8), ConfigError> {
    let bad = || ConfigError::BadSlotToken(token.to_string());
    let token = token.trim();
    if token.eq_ignore_ascii_case("default") {
        return Ok((ANY, ANY));
    }

    let rest = token.strip_prefix(['K', 'k']).ok_or_else(bad)?;
    let (kind, domain) = match rest.split_once(['D', 'd']) {
        Some((kind, domain)) => (kind, Some(domain)),
        None => (rest, None),
    };
    let parse = |digits: &str| -> Result<u8, ConfigError> {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        digits.parse().map_err(|_| bad())
    };

    let kind = parse(kind)?;
    let domain = match domain {
        Some(domain) => parse(domain)?,
        None => ANY,
    };
    Ok((kind, domain))
}

/// How specific a slot is: 0 for the global default, 1 for a whole kind, 2 for a cell.
pub fn slot_specificity((kind, domain): (u8, u8)) -> u8 {
    (kind != ANY) as u8 + (domain != ANY) as u8
}
