mod config;
mod engine;
mod events;
mod stats;
mod transport;

pub use config::{EngineConfig, ThresholdSpec};
pub use engine::{ProtocolEngine, MAX_DATAGRAMS_PER_TICK, RECV_BUFFER_SIZE};
pub use events::{NetEvent, RemovalReason};
pub use stats::EngineStats;
pub use transport::{MemoryTransport, Transport, UdpTransport, DEFAULT_PORT};
