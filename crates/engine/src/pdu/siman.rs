use bytes::{Buf, BufMut};

use super::codec::{count_u32, ensure, padding_for, put_padding, read_records, WireRecord};
use crate::error::PduError;
use crate::types::EntityId;

/// Originating and receiving entity pair that opens every simulation management body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimanHeader {
    pub originating: EntityId,
    pub receiving: EntityId,
}

impl WireRecord for SimanHeader {
    const SIZE: usize = 12;

    fn read(buf: &mut impl Buf) -> Self {
        Self {
            originating: EntityId::read(buf),
            receiving: EntityId::read(buf),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        self.originating.write(buf);
        self.receiving.write(buf);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockTime {
    pub hour: u32,
    pub time_past_hour: u32,
}

impl WireRecord for ClockTime {
    const SIZE: usize = 8;

    fn read(buf: &mut impl Buf) -> Self {
        Self {
            hour: buf.get_u32(),
            time_past_hour: buf.get_u32(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.hour);
        buf.put_u32(self.time_past_hour);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedDatum {
    pub id: u32,
    pub value: u32,
}

impl WireRecord for FixedDatum {
    const SIZE: usize = 8;

    fn read(buf: &mut impl Buf) -> Self {
        Self {
            id: buf.get_u32(),
            value: buf.get_u32(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.id);
        buf.put_u32(self.value);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableDatum {
    pub id: u32,
    /// Length of `data` in bits.
    pub bits: u32,
    pub data: Vec<u8>,
}

impl VariableDatum {
    pub fn from_bytes(id: u32, data: Vec<u8>) -> Self {
        Self {
            id,
            bits: (data.len() * 8) as u32,
            data,
        }
    }

    fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, 8)?;
        let id = buf.get_u32();
        let bits = buf.get_u32();
        let byte_len = (bits as usize).div_ceil(8);
        let padded = byte_len + padding_for(byte_len, 8);
        ensure(buf, byte_len)?;
        let mut data = vec![0u8; byte_len];
        buf.copy_to_slice(&mut data);
        buf.advance((padded - byte_len).min(buf.remaining()));
        Ok(Self { id, bits, data })
    }

    fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        let byte_len = (self.bits as usize).div_ceil(8);
        if byte_len > self.data.len() {
            return Err(PduError::BadLength {
                declared: byte_len,
                available: self.data.len(),
            });
        }
        buf.put_u32(self.id);
        buf.put_u32(self.bits);
        buf.put_slice(&self.data[..byte_len]);
        put_padding(buf, padding_for(byte_len, 8));
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Datums {
    pub fixed: Vec<FixedDatum>,
    pub variable: Vec<VariableDatum>,
}

impl Datums {
    fn decode(buf: &mut impl Buf, fixed: usize, variable: usize) -> Result<Self, PduError> {
        let fixed = read_records(buf, fixed)?;
        let variable = (0..variable)
            .map(|_| VariableDatum::decode(buf))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { fixed, variable })
    }

    fn put_counts(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        buf.put_u32(count_u32(self.fixed.len())?);
        buf.put_u32(count_u32(self.variable.len())?);
        Ok(())
    }

    fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        for datum in &self.fixed {
            datum.write(buf);
        }
        for datum in &self.variable {
            datum.encode(buf)?;
        }
        Ok(())
    }
}

fn read_counts(buf: &mut impl Buf) -> (usize, usize) {
    (buf.get_u32() as usize, buf.get_u32() as usize)
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartPdu {
    pub header: SimanHeader,
    pub real_world_time: ClockTime,
    pub simulation_time: ClockTime,
    pub request_id: u32,
}

impl StartPdu {
    pub const BODY_LEN: usize = 32;

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, Self::BODY_LEN)?;
        Ok(Self {
            header: SimanHeader::read(buf),
            real_world_time: ClockTime::read(buf),
            simulation_time: ClockTime::read(buf),
            request_id: buf.get_u32(),
        })
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        self.header.write(buf);
        self.real_world_time.write(buf);
        self.simulation_time.write(buf);
        buf.put_u32(self.request_id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StopPdu {
    pub header: SimanHeader,
    pub real_world_time: ClockTime,
    pub reason: u8,
    pub frozen_behavior: u8,
    pub request_id: u32,
}

impl StopPdu {
    pub const BODY_LEN: usize = 28;

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, Self::BODY_LEN)?;
        let header = SimanHeader::read(buf);
        let real_world_time = ClockTime::read(buf);
        let reason = buf.get_u8();
        let frozen_behavior = buf.get_u8();
        buf.advance(2);
        Ok(Self {
            header,
            real_world_time,
            reason,
            frozen_behavior,
            request_id: buf.get_u32(),
        })
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        self.header.write(buf);
        self.real_world_time.write(buf);
        buf.put_u8(self.reason);
        buf.put_u8(self.frozen_behavior);
        buf.put_u16(0);
        buf.put_u32(self.request_id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcknowledgePdu {
    pub header: SimanHeader,
    pub acknowledge_flag: u16,
    pub response_flag: u16,
    pub request_id: u32,
}

impl AcknowledgePdu {
    pub const BODY_LEN: usize = 20;

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, Self::BODY_LEN)?;
        Ok(Self {
            header: SimanHeader::read(buf),
            acknowledge_flag: buf.get_u16(),
            response_flag: buf.get_u16(),
            request_id: buf.get_u32(),
        })
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        self.header.write(buf);
        buf.put_u16(self.acknowledge_flag);
        buf.put_u16(self.response_flag);
        buf.put_u32(self.request_id);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequestPdu {
    pub header: SimanHeader,
    pub request_id: u32,
    pub action_id: u32,
    pub datums: Datums,
}

impl ActionRequestPdu {
    pub const BODY_LEN: usize = 28;

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, Self::BODY_LEN)?;
        let header = SimanHeader::read(buf);
        let request_id = buf.get_u32();
        let action_id = buf.get_u32();
        let (fixed, variable) = read_counts(buf);
        Ok(Self {
            header,
            request_id,
            action_id,
            datums: Datums::decode(buf, fixed, variable)?,
        })
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        self.header.write(buf);
        buf.put_u32(self.request_id);
        buf.put_u32(self.action_id);
        self.datums.put_counts(buf)?;
        self.datums.encode(buf)
    }
}

/// Shared by the plain and reliable action response layouts.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResponsePdu {
    pub header: SimanHeader,
    pub request_id: u32,
    pub request_status: u32,
    pub datums: Datums,
}

impl ActionResponsePdu {
    pub const BODY_LEN: usize = 28;

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, Self::BODY_LEN)?;
        let header = SimanHeader::read(buf);
        let request_id = buf.get_u32();
        let request_status = buf.get_u32();
        let (fixed, variable) = read_counts(buf);
        Ok(Self {
            header,
            request_id,
            request_status,
            datums: Datums::decode(buf, fixed, variable)?,
        })
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        self.header.write(buf);
        buf.put_u32(self.request_id);
        buf.put_u32(self.request_status);
        self.datums.put_counts(buf)?;
        self.datums.encode(buf)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequestReliablePdu {
    pub header: SimanHeader,
    pub reliability: u8,
    pub request_id: u32,
    pub action_id: u32,
    pub datums: Datums,
}

impl ActionRequestReliablePdu {
    pub const BODY_LEN: usize = 32;

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, Self::BODY_LEN)?;
        let header = SimanHeader::read(buf);
        let reliability = buf.get_u8();
        buf.advance(3);
        let request_id = buf.get_u32();
        let action_id = buf.get_u32();
        let (fixed, variable) = read_counts(buf);
        Ok(Self {
            header,
            reliability,
            request_id,
            action_id,
            datums: Datums::decode(buf, fixed, variable)?,
        })
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        self.header.write(buf);
        buf.put_u8(self.reliability);
        put_padding(buf, 3);
        buf.put_u32(self.request_id);
        buf.put_u32(self.action_id);
        self.datums.put_counts(buf)?;
        self.datums.encode(buf)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataQueryPdu {
    pub header: SimanHeader,
    pub request_id: u32,
    pub time_interval: u32,
    pub fixed_ids: Vec<u32>,
    pub variable_ids: Vec<u32>,
}

impl DataQueryPdu {
    pub const BODY_LEN: usize = 28;

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, Self::BODY_LEN)?;
        let header = SimanHeader::read(buf);
        let request_id = buf.get_u32();
        let time_interval = buf.get_u32();
        let (fixed, variable) = read_counts(buf);
        ensure(buf, fixed.saturating_add(variable).saturating_mul(4))?;
        Ok(Self {
            header,
            request_id,
            time_interval,
            fixed_ids: (0..fixed).map(|_| buf.get_u32()).collect(),
            variable_ids: (0..variable).map(|_| buf.get_u32()).collect(),
        })
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        self.header.write(buf);
        buf.put_u32(self.request_id);
        buf.put_u32(self.time_interval);
        buf.put_u32(count_u32(self.fixed_ids.len())?);
        buf.put_u32(count_u32(self.variable_ids.len())?);
        for id in self.fixed_ids.iter().chain(&self.variable_ids) {
            buf.put_u32(*id);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataPdu {
    pub header: SimanHeader,
    pub request_id: u32,
    pub datums: Datums,
}

impl DataPdu {
    pub const BODY_LEN: usize = 28;

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, Self::BODY_LEN)?;
        let header = SimanHeader::read(buf);
        let request_id = buf.get_u32();
        buf.advance(4);
        let (fixed, variable) = read_counts(buf);
        Ok(Self {
            header,
            request_id,
            datums: Datums::decode(buf, fixed, variable)?,
        })
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        self.header.write(buf);
        buf.put_u32(self.request_id);
        buf.put_u32(0);
        self.datums.put_counts(buf)?;
        self.datums.encode(buf)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentPdu {
    pub header: SimanHeader,
    pub datums: Datums,
}

impl CommentPdu {
    pub const BODY_LEN: usize = 20;

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, Self::BODY_LEN)?;
        let header = SimanHeader::read(buf);
        let (fixed, variable) = read_counts(buf);
        Ok(Self {
            header,
            datums: Datums::decode(buf, fixed, variable)?,
        })
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        self.header.write(buf);
        self.datums.put_counts(buf)?;
        self.datums.encode(buf)
    }

    /// Text carried in the variable datums, one string per datum.
    pub fn messages(&self) -> Vec<String> {
        self.datums
            .variable
            .iter()
            .map(|datum| String::from_utf8_lossy(&datum.data).trim_end_matches('\0').to_string())
            .collect()
    }
}
