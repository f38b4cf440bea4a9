use std::io;

#[derive(Debug, thiserror::Error)]
pub enum PduError {
    #[error("buffer truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("length field {declared} invalid for {available} byte buffer")]
    BadLength { declared: usize, available: usize },
    #[error("record count {count} exceeds field capacity")]
    TooManyRecords { count: usize },
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    #[error("encoded pdu of {0} bytes exceeds maximum length")]
    TooLarge(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("site id {0} outside 0-65535")]
    SiteOutOfRange(u32),
    #[error("application id {0} outside 0-65535")]
    ApplicationOutOfRange(u32),
    #[error("exercise id {0} outside 0-255")]
    ExerciseOutOfRange(u32),
    #[error("protocol version {0} outside 1-7")]
    UnsupportedVersion(u8),
    #[error("malformed threshold slot token {0:?}")]
    BadSlotToken(String),
    #[error("threshold slot kind {kind} domain {domain} outside table")]
    SlotOutOfRange { kind: u8, domain: u8 },
    #[error("invalid threshold value for {field}: {value}")]
    BadThreshold { field: &'static str, value: f64 },
    #[error("emission handler table full ({0} entries)")]
    TooManyHandlers(usize),
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("type {0} already registered")]
    Duplicate(crate::TypeCode),
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport io error: {0}")]
    Io(#[from] io::Error),
    #[error("transport closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("failed to encode pdu: {0}")]
    Encode(#[from] PduError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
