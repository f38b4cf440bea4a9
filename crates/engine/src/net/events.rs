use bytes::Bytes;

use crate::pdu::{
    AcknowledgePdu, ActionRequestPdu, ActionRequestReliablePdu, ActionResponsePdu, CommentPdu,
    DataPdu, DataQueryPdu, DetonationPdu, EmissionPdu, FirePdu, PduHeader, SignalPdu, StartPdu,
    StopPdu, TransmitterPdu,
};
use crate::types::{EntityId, TypeCode};

#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    EntityDiscovered {
        id: EntityId,
        entity_type: TypeCode,
        untyped: bool,
    },
    EntityUpdated {
        id: EntityId,
    },
    EntityRemoved {
        id: EntityId,
        reason: RemovalReason,
    },
    Fire(FirePdu),
    Detonation(DetonationPdu),
    Signal(SignalPdu),
    Transmitter(TransmitterPdu),
    /// `handlers` holds the matched registry index for each emitter system, in order.
    Emission {
        pdu: EmissionPdu,
        handlers: Vec<Option<usize>>,
    },
    DataQuery(DataQueryPdu),
    Data(DataPdu),
    Comment(CommentPdu),
    Start(StartPdu),
    Stop(StopPdu),
    Acknowledge(AcknowledgePdu),
    ActionRequest(ActionRequestPdu),
    ActionResponse(ActionResponsePdu),
    ActionRequestReliable(ActionRequestReliablePdu),
    ActionResponseReliable(ActionResponsePdu),
    /// Body still in wire byte order.
    Unrecognized {
        header: PduHeader,
        body: Bytes,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Stale,
    Deactivated,
}

impl RemovalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalReason::Stale => "timed out",
            RemovalReason::Deactivated => "deactivated",
        }
    }
}
