use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut};

use super::codec::{ensure, WireRecord};
use crate::error::PduError;
use crate::types::EntityId;

pub const HEADER_LEN: usize = 12;
pub const MAX_PDU_SIZE: usize = 8192;
/// IEEE 1278.1-1995.
pub const DEFAULT_PROTOCOL_VERSION: u8 = 6;
/// IEEE 1278.1-2012.
pub const MAX_PROTOCOL_VERSION: u8 = 7;

const TIMESTAMP_UNITS: u32 = 0x7FFF_FFFF;
const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// Whether fields read natively on this host must be swapped to match the wire.
    pub fn differs_from_wire(self) -> bool {
        self != ByteOrder::Big
    }
}

pub const HOST_BYTE_ORDER: ByteOrder = if cfg!(target_endian = "big") {
    ByteOrder::Big
} else {
    ByteOrder::Little
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PduKind {
    EntityState = 1,
    Fire = 2,
    Detonation = 3,
    StartResume = 13,
    StopFreeze = 14,
    Acknowledge = 15,
    ActionRequest = 16,
    ActionResponse = 17,
    DataQuery = 18,
    Data = 20,
    Comment = 22,
    ElectromagneticEmission = 23,
    Transmitter = 25,
    Signal = 26,
    ActionRequestR = 56,
    ActionResponseR = 57,
}

impl PduKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => PduKind::EntityState,
            2 => PduKind::Fire,
            3 => PduKind::Detonation,
            13 => PduKind::StartResume,
            14 => PduKind::StopFreeze,
            15 => PduKind::Acknowledge,
            16 => PduKind::ActionRequest,
            17 => PduKind::ActionResponse,
            18 => PduKind::DataQuery,
            20 => PduKind::Data,
            22 => PduKind::Comment,
            23 => PduKind::ElectromagneticEmission,
            25 => PduKind::Transmitter,
            26 => PduKind::Signal,
            56 => PduKind::ActionRequestR,
            57 => PduKind::ActionResponseR,
            _ => return None,
        })
    }

    pub fn family(self) -> ProtocolFamily {
        match self {
            PduKind::EntityState => ProtocolFamily::EntityInformation,
            PduKind::Fire | PduKind::Detonation => ProtocolFamily::Warfare,
            PduKind::Transmitter | PduKind::Signal => ProtocolFamily::RadioCommunications,
            PduKind::ElectromagneticEmission => ProtocolFamily::EmissionRegeneration,
            PduKind::ActionRequestR | PduKind::ActionResponseR => {
                ProtocolFamily::SimulationManagementReliable
            }
            _ => ProtocolFamily::SimulationManagement,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProtocolFamily {
    Other = 0,
    EntityInformation = 1,
    Warfare = 2,
    Logistics = 3,
    RadioCommunications = 4,
    SimulationManagement = 5,
    EmissionRegeneration = 6,
    SimulationManagementReliable = 10,
}

/// DIS timestamp: bit 0 flags absolute time, bits 1..32 are the fraction of the
/// current hour scaled to 2^31 - 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Timestamp(pub u32);

impl Timestamp {
    pub fn now(absolute: bool) -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        dis_timestamp(since_epoch.as_secs_f64() % SECONDS_PER_HOUR, absolute)
    }

    pub fn is_absolute(self) -> bool {
        self.0 & 1 == 1
    }

    pub fn seconds_past_hour(self) -> f64 {
        (self.0 >> 1) as f64 / TIMESTAMP_UNITS as f64 * SECONDS_PER_HOUR
    }
}

pub fn dis_timestamp(seconds_past_hour: f64, absolute: bool) -> Timestamp {
    let fraction = (seconds_past_hour / SECONDS_PER_HOUR).clamp(0.0, 1.0);
    let units = (fraction * TIMESTAMP_UNITS as f64) as u32;
    Timestamp((units << 1) | absolute as u32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    pub version: u8,
    pub exercise: u8,
    pub pdu_type: u8,
    pub family: u8,
    pub timestamp: Timestamp,
    pub length: u16,
}

impl PduHeader {
    pub fn kind(&self) -> Option<PduKind> {
        PduKind::from_u8(self.pdu_type)
    }

    pub fn read(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, HEADER_LEN)?;
        let header = Self {
            version: buf.get_u8(),
            exercise: buf.get_u8(),
            pdu_type: buf.get_u8(),
            family: buf.get_u8(),
            timestamp: Timestamp(buf.get_u32()),
            length: buf.get_u16(),
        };
        buf.advance(2);
        if header.version == 0 || header.version > MAX_PROTOCOL_VERSION {
            return Err(PduError::UnsupportedVersion(header.version));
        }
        Ok(header)
    }

    pub fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.version);
        buf.put_u8(self.exercise);
        buf.put_u8(self.pdu_type);
        buf.put_u8(self.family);
        buf.put_u32(self.timestamp.0);
        buf.put_u16(self.length);
        buf.put_u16(0);
    }
}

/// Site and application of the entity that originated a PDU.
///
/// Every supported layout starts its body with the originating entity id.
pub fn originator(pdu: &[u8]) -> Option<(u16, u16)> {
    let mut body = pdu.get(HEADER_LEN..)?;
    if body.len() < EntityId::SIZE {
        return None;
    }
    Some(EntityId::read(&mut body).originator())
}

/// Splits a datagram into the PDUs bundled inside it.
pub fn frames(datagram: &[u8]) -> Frames<'_> {
    Frames { rest: datagram }
}

pub struct Frames<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Frames<'a> {
    type Item = Result<(PduHeader, &'a [u8]), PduError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }

        let mut cursor = self.rest;
        let header = match PduHeader::read(&mut cursor) {
            Ok(header) => header,
            Err(e) => {
                self.rest = &[];
                return Some(Err(e));
            }
        };

        let length = header.length as usize;
        if length < HEADER_LEN || length > self.rest.len() {
            let available = self.rest.len();
            self.rest = &[];
            return Some(Err(PduError::BadLength {
                declared: length,
                available,
            }));
        }

        let (pdu, rest) = self.rest.split_at(length);
        self.rest = rest;
        Some(Ok((header, pdu)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(pdu_type: u8, length: u16) -> Vec<u8> {
        let mut out = Vec::new();
        PduHeader {
            version: DEFAULT_PROTOCOL_VERSION,
            exercise: 7,
            pdu_type,
            family: 1,
            timestamp: Timestamp(0),
            length,
        }
        .write(&mut out);
        out
    }

    #[test]
    fn timestamp_encodes_fraction_of_hour() {
        assert_eq!(dis_timestamp(0.0, false).0, 0);
        assert_eq!(dis_timestamp(0.0, true).0, 1);

        let half = dis_timestamp(1800.0, false);
        assert!(!half.is_absolute());
        assert_eq!(half.0 >> 1, TIMESTAMP_UNITS / 2);

        let full = dis_timestamp(3600.0, true);
        assert_eq!(full.0, u32::MAX);
    }

    #[test]
    fn timestamp_inverts() {
        let stamp = dis_timestamp(1234.5, true);
        assert!(stamp.is_absolute());
        assert!((stamp.seconds_past_hour() - 1234.5).abs() < 1e-3);
    }

    #[test]
    fn header_layout() {
        let bytes = header(1, 144);
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(&bytes[..4], &[6, 7, 1, 1]);
        assert_eq!(&bytes[8..10], &[0, 144]);
    }

    #[test]
    fn frames_split_bundled_datagram() {
        let mut datagram = header(1, 16);
        datagram.extend_from_slice(&[0, 9, 0, 9]);
        datagram.extend(header(2, 12));

        let parsed: Vec<_> = frames(&datagram).collect();
        assert_eq!(parsed.len(), 2);
        let (first, bytes) = parsed[0].as_ref().unwrap();
        assert_eq!(first.pdu_type, 1);
        assert_eq!(bytes.len(), 16);
        assert_eq!(originator(bytes), None);
        assert_eq!(parsed[1].as_ref().unwrap().0.pdu_type, 2);
    }

    #[test]
    fn frames_stop_on_overrun() {
        let mut datagram = header(1, 200);
        datagram.extend_from_slice(&[0; 20]);
        let parsed: Vec<_> = frames(&datagram).collect();
        assert_eq!(parsed.len(), 1);
        assert!(matches!(parsed[0], Err(PduError::BadLength { .. })));
    }

    #[test]
    fn short_datagram_is_error() {
        let parsed: Vec<_> = frames(&[6, 7, 1]).collect();
        assert!(matches!(parsed[0], Err(PduError::Truncated { .. })));
    }

    #[test]
    fn unknown_version_rejected() {
        let mut datagram = header(1, 12);
        datagram[0] = MAX_PROTOCOL_VERSION + 1;
        let parsed: Vec<_> = frames(&datagram).collect();
        assert!(matches!(parsed[0], Err(PduError::UnsupportedVersion(8))));
    }

    #[test]
    fn originator_reads_first_body_id() {
        let mut pdu = header(1, 18);
        pdu.extend_from_slice(&[0, 9, 0, 8, 0, 1]);
        assert_eq!(originator(&pdu), Some((9, 8)));
    }
}
