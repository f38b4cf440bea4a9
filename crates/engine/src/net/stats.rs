#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub datagrams_received: u64,
    pub bytes_received: u64,
    pub pdus_decoded: u64,
    pub dropped_malformed: u64,
    pub dropped_exercise: u64,
    pub dropped_self: u64,
    pub filtered_range: u64,
    pub unrecognized: u64,
    pub pdus_sent: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
}

impl EngineStats {
    pub fn dropped(&self) -> u64 {
        self.dropped_malformed + self.dropped_exercise + self.dropped_self
    }
}
