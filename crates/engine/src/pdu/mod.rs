mod codec;
mod emission;
mod entity;
mod header;
mod radio;
mod siman;
mod warfare;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::PduError;

pub use codec::{ArticulationParameter, BurstDescriptor, EulerAngles, WireRecord};
pub use emission::{
    Beam, EmissionPdu, EmitterSystem, EmitterSystemType, FundamentalParameters, TrackJamTarget,
};
pub use entity::{Appearance, DeadReckoningParams, EntityStatePdu};
pub use header::{
    dis_timestamp, frames, originator, ByteOrder, Frames, PduHeader, PduKind, ProtocolFamily,
    Timestamp, DEFAULT_PROTOCOL_VERSION, HEADER_LEN, HOST_BYTE_ORDER, MAX_PDU_SIZE,
    MAX_PROTOCOL_VERSION,
};
pub use radio::{ModulationType, RadioType, SignalPdu, TransmitState, TransmitterPdu};
pub use siman::{
    AcknowledgePdu, ActionRequestPdu, ActionRequestReliablePdu, ActionResponsePdu, ClockTime,
    CommentPdu, DataPdu, DataQueryPdu, Datums, FixedDatum, SimanHeader, StartPdu, StopPdu,
    VariableDatum,
};
pub use warfare::{DetonationPdu, DetonationResult, FirePdu};

/// Every PDU the engine understands, plus a raw fallback for the rest.
#[derive(Debug, Clone, PartialEq)]
pub enum Pdu {
    EntityState(EntityStatePdu),
    Fire(FirePdu),
    Detonation(DetonationPdu),
    Signal(SignalPdu),
    Transmitter(TransmitterPdu),
    Emission(EmissionPdu),
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
    /// Body left in wire byte order.
    Other { pdu_type: u8, family: u8, body: Bytes },
}

impl Pdu {
    pub fn pdu_type(&self) -> u8 {
        match self.kind() {
            Some(kind) => kind as u8,
            None => match self {
                Pdu::Other { pdu_type, .. } => *pdu_type,
                _ => 0,
            },
        }
    }

    pub fn kind(&self) -> Option<PduKind> {
        Some(match self {
            Pdu::EntityState(_) => PduKind::EntityState,
            Pdu::Fire(_) => PduKind::Fire,
            Pdu::Detonation(_) => PduKind::Detonation,
            Pdu::Signal(_) => PduKind::Signal,
            Pdu::Transmitter(_) => PduKind::Transmitter,
            Pdu::Emission(_) => PduKind::ElectromagneticEmission,
            Pdu::DataQuery(_) => PduKind::DataQuery,
            Pdu::Data(_) => PduKind::Data,
            Pdu::Comment(_) => PduKind::Comment,
            Pdu::Start(_) => PduKind::StartResume,
            Pdu::Stop(_) => PduKind::StopFreeze,
            Pdu::Acknowledge(_) => PduKind::Acknowledge,
            Pdu::ActionRequest(_) => PduKind::ActionRequest,
            Pdu::ActionResponse(_) => PduKind::ActionResponse,
            Pdu::ActionRequestReliable(_) => PduKind::ActionRequestR,
            Pdu::ActionResponseReliable(_) => PduKind::ActionResponseR,
            Pdu::Other { .. } => return None,
        })
    }

    pub fn family(&self) -> u8 {
        match (self.kind(), self) {
            (Some(kind), _) => kind.family() as u8,
            (None, Pdu::Other { family, .. }) => *family,
            (None, _) => ProtocolFamily::Other as u8,
        }
    }

    /// Decodes a body (the bytes after the header, up to the header length) into host order.
    pub fn decode(header: &PduHeader, body: &[u8]) -> Result<Self, PduError> {
        let buf = &mut &body[..];
        let Some(kind) = header.kind() else {
            return Ok(Pdu::Other {
                pdu_type: header.pdu_type,
                family: header.family,
                body: Bytes::copy_from_slice(body),
            });
        };

        Ok(match kind {
            PduKind::EntityState => Pdu::EntityState(EntityStatePdu::decode(buf)?),
            PduKind::Fire => Pdu::Fire(FirePdu::decode(buf)?),
            PduKind::Detonation => Pdu::Detonation(DetonationPdu::decode(buf)?),
            PduKind::Signal => Pdu::Signal(SignalPdu::decode(buf)?),
            PduKind::Transmitter => Pdu::Transmitter(TransmitterPdu::decode(buf)?),
            PduKind::ElectromagneticEmission => Pdu::Emission(EmissionPdu::decode(buf)?),
            PduKind::DataQuery => Pdu::DataQuery(DataQueryPdu::decode(buf)?),
            PduKind::Data => Pdu::Data(DataPdu::decode(buf)?),
            PduKind::Comment => Pdu::Comment(CommentPdu::decode(buf)?),
            PduKind::StartResume => Pdu::Start(StartPdu::decode(buf)?),
            PduKind::StopFreeze => Pdu::Stop(StopPdu::decode(buf)?),
            PduKind::Acknowledge => Pdu::Acknowledge(AcknowledgePdu::decode(buf)?),
            PduKind::ActionRequest => Pdu::ActionRequest(ActionRequestPdu::decode(buf)?),
            PduKind::ActionResponse => Pdu::ActionResponse(ActionResponsePdu::decode(buf)?),
            PduKind::ActionRequestR => {
                Pdu::ActionRequestReliable(ActionRequestReliablePdu::decode(buf)?)
            }
            PduKind::ActionResponseR => {
                Pdu::ActionResponseReliable(ActionResponsePdu::decode(buf)?)
            }
        })
    }

    /// Serializes header and body; the header length is filled in from the encoded size.
    pub fn encode(
        &self,
        version: u8,
        exercise: u8,
        timestamp: Timestamp,
    ) -> Result<BytesMut, PduError> {
        let mut buf = BytesMut::with_capacity(256);
        PduHeader {
            version,
            exercise,
            pdu_type: self.pdu_type(),
            family: self.family(),
            timestamp,
            length: 0,
        }
        .write(&mut buf);

        match self {
            Pdu::EntityState(pdu) => pdu.encode(&mut buf)?,
            Pdu::Fire(pdu) => pdu.encode(&mut buf)?,
            Pdu::Detonation(pdu) => pdu.encode(&mut buf)?,
            Pdu::Signal(pdu) => pdu.encode(&mut buf)?,
            Pdu::Transmitter(pdu) => pdu.encode(&mut buf)?,
            Pdu::Emission(pdu) => pdu.encode(&mut buf)?,
            Pdu::DataQuery(pdu) => pdu.encode(&mut buf)?,
            Pdu::Data(pdu) => pdu.encode(&mut buf)?,
            Pdu::Comment(pdu) => pdu.encode(&mut buf)?,
            Pdu::Start(pdu) => pdu.encode(&mut buf)?,
            Pdu::Stop(pdu) => pdu.encode(&mut buf)?,
            Pdu::Acknowledge(pdu) => pdu.encode(&mut buf)?,
            Pdu::ActionRequest(pdu) => pdu.encode(&mut buf)?,
            Pdu::ActionResponse(pdu) => pdu.encode(&mut buf)?,
            Pdu::ActionRequestReliable(pdu) => pdu.encode(&mut buf)?,
            Pdu::ActionResponseReliable(pdu) => pdu.encode(&mut buf)?,
            Pdu::Other { body, .. } => buf.put_slice(body),
        }

        let length = buf.len();
        if length > MAX_PDU_SIZE {
            return Err(PduError::TooLarge(length));
        }
        buf[8..10].copy_from_slice(&(length as u16).to_be_bytes());
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntityId, TypeCode};

    fn decode_one(bytes: &[u8]) -> Pdu {
        let (header, pdu) = frames(bytes).next().unwrap().unwrap();
        Pdu::decode(&header, &pdu[HEADER_LEN..]).unwrap()
    }

    #[test]
    fn entity_state_total_length_is_144() {
        let pdu = Pdu::EntityState(EntityStatePdu::new(
            EntityId::new(1, 2, 3),
            TypeCode::new(1, 2, 225, 1, 0, 0, 0),
        ));
        let bytes = pdu.encode(DEFAULT_PROTOCOL_VERSION, 7, Timestamp(0)).unwrap();
        assert_eq!(bytes.len(), 144);
        assert_eq!(&bytes[8..10], &[0, 144]);
        assert_eq!(bytes[2], 1);
        assert_eq!(bytes[3], ProtocolFamily::EntityInformation as u8);
        assert_eq!(decode_one(&bytes), pdu);
    }

    #[test]
    fn unknown_type_keeps_wire_bytes() {
        let pdu = Pdu::Other {
            pdu_type: 200,
            family: 129,
            body: Bytes::from_static(&[0, 9, 0, 9, 0xDE, 0xAD]),
        };
        let bytes = pdu.encode(DEFAULT_PROTOCOL_VERSION, 1, Timestamp(0)).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 6);
        match decode_one(&bytes) {
            Pdu::Other { pdu_type, family, body } => {
                assert_eq!(pdu_type, 200);
                assert_eq!(family, 129);
                assert_eq!(&body[..], &[0, 9, 0, 9, 0xDE, 0xAD]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn reliable_response_uses_its_own_type() {
        let pdu = Pdu::ActionResponseReliable(ActionResponsePdu {
            header: SimanHeader::default(),
            request_id: 1,
            request_status: 2,
            datums: Datums::default(),
        });
        assert_eq!(pdu.pdu_type(), 57);
        assert_eq!(pdu.family(), 10);
        let bytes = pdu.encode(DEFAULT_PROTOCOL_VERSION, 1, Timestamp(0)).unwrap();
        assert_eq!(bytes.len(), 40);
        assert_eq!(decode_one(&bytes), pdu);
    }

    #[test]
    fn truncated_body_is_error() {
        let pdu = Pdu::EntityState(EntityStatePdu::new(EntityId::new(1, 2, 3), TypeCode::default()));
        let bytes = pdu.encode(DEFAULT_PROTOCOL_VERSION, 7, Timestamp(0)).unwrap();
        let (header, _) = frames(&bytes).next().unwrap().unwrap();
        assert!(Pdu::decode(&header, &bytes[HEADER_LEN..100]).is_err());
    }
}
