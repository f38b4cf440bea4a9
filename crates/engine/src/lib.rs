pub mod emission;
pub mod error;
pub mod naming;
pub mod net;
pub mod nib;
pub mod pdu;
pub mod threshold;
pub mod trie;
pub mod types;

pub use emission::{EmissionHandler, EmissionQuery, EmissionRegistry, QueryPool};
pub use error::{ConfigError, PduError, RegisterError, SendError, TransportError};
pub use naming::{federate_name, federation_name, EntityMarking};
pub use net::{
    EngineConfig, EngineStats, MemoryTransport, NetEvent, ProtocolEngine, RemovalReason,
    ThresholdSpec, Transport, UdpTransport, DEFAULT_PORT,
};
pub use nib::{DeadReckoningModels, Extrapolator, Kinematics, Nib, Role};
pub use pdu::{dis_timestamp, EntityStatePdu, Pdu, PduHeader, PduKind, Timestamp};
pub use threshold::{ThresholdTable, Thresholds};
pub use trie::{TypeMapping, TypeTrie};
pub use types::{EntityId, EventId, ForceId, TypeCode, TypeLevel};
