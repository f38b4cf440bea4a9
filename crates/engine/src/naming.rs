//! Session names derived from the numeric site/application/exercise identity.

pub const MARKING_LEN: usize = 11;

/// `S<site>A<application>`, or empty while either id is unset.
pub fn federate_name(site: u16, application: u16) -> String {
    if site == 0 || application == 0 {
        return String::new();
    }
    format!("S{}A{}", site, application)
}

/// `E<exercise>`, or empty while the exercise is unset.
pub fn federation_name(exercise: u8) -> String {
    if exercise == 0 {
        return String::new();
    }
    format!("E{}", exercise)
}

pub fn parse_federate_name(name: &str) -> Option<(u16, u16)> {
    let rest = name.strip_prefix('S')?;
    let (site, application) = rest.split_once('A')?;
    let site = parse_minimal(site)?;
    let application = parse_minimal(application)?;
    (site != 0 && application != 0).then_some((site, application))
}

pub fn parse_federation_name(name: &str) -> Option<u8> {
    let exercise: u8 = parse_minimal(name.strip_prefix('E')?)?;
    (exercise != 0).then_some(exercise)
}

// Rejects signs, empty strings and leading zeros so each name has one spelling.
fn parse_minimal<T: std::str::FromStr>(digits: &str) -> Option<T> {
    if digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || (digits.len() > 1 && digits.starts_with('0'))
    {
        return None;
    }
    digits.parse().ok()
}

/// Eleven-character ASCII entity marking carried in entity state PDUs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityMarking {
    pub character_set: u8,
    pub chars: [u8; MARKING_LEN],
}

impl EntityMarking {
    pub const ASCII: u8 = 1;

    pub fn from_str_lossy(text: &str) -> Self {
        let mut chars = [0u8; MARKING_LEN];
        for (slot, byte) in chars
            .iter_mut()
            .zip(text.bytes().filter(|b| b.is_ascii() && !b.is_ascii_control()))
        {
            *slot = byte;
        }
        Self {
            character_set: Self::ASCII,
            chars,
        }
    }

    pub fn as_string(&self) -> String {
        self.chars
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect()
    }
}
