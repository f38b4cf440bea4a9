use bytes::{Buf, BufMut};
use glam::{DVec3, Vec3};

use super::codec::{count_u16, count_u8, ensure, padding_for, put_padding, WireRecord};
use crate::error::PduError;
use crate::types::EntityId;

#[derive(Debug, Clone, PartialEq)]
pub struct SignalPdu {
    pub entity_id: EntityId,
    pub radio_id: u16,
    pub encoding_scheme: u16,
    pub tdl_type: u16,
    pub sample_rate: u32,
    pub samples: u16,
    /// Length of `data` in bits; the trailing byte may be partially used.
    pub data_bits: u16,
    pub data: Vec<u8>,
}

impl SignalPdu {
    pub const BODY_LEN: usize = 20;

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, Self::BODY_LEN)?;
        let entity_id = EntityId::read(buf);
        let radio_id = buf.get_u16();
        let encoding_scheme = buf.get_u16();
        let tdl_type = buf.get_u16();
        let sample_rate = buf.get_u32();
        let data_bits = buf.get_u16();
        let samples = buf.get_u16();

        let byte_len = (data_bits as usize).div_ceil(8);
        ensure(buf, byte_len)?;
        let mut data = vec![0u8; byte_len];
        buf.copy_to_slice(&mut data);
        let pad = padding_for(byte_len, 4).min(buf.remaining());
        buf.advance(pad);

        Ok(Self {
            entity_id,
            radio_id,
            encoding_scheme,
            tdl_type,
            sample_rate,
            samples,
            data_bits,
            data,
        })
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        let byte_len = (self.data_bits as usize).div_ceil(8);
        if byte_len > self.data.len() {
            return Err(PduError::BadLength {
                declared: byte_len,
                available: self.data.len(),
            });
        }
        self.entity_id.write(buf);
        buf.put_u16(self.radio_id);
        buf.put_u16(self.encoding_scheme);
        buf.put_u16(self.tdl_type);
        buf.put_u32(self.sample_rate);
        buf.put_u16(self.data_bits);
        buf.put_u16(self.samples);
        buf.put_slice(&self.data[..byte_len]);
        put_padding(buf, padding_for(byte_len, 4));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RadioType {
    pub kind: u8,
    pub domain: u8,
    pub country: u16,
    pub category: u8,
    pub nomenclature_version: u8,
    pub nomenclature: u16,
}

impl WireRecord for RadioType {
    const SIZE: usize = 8;

    fn read(buf: &mut impl Buf) -> Self {
        Self {
            kind: buf.get_u8(),
            domain: buf.get_u8(),
            country: buf.get_u16(),
            category: buf.get_u8(),
            nomenclature_version: buf.get_u8(),
            nomenclature: buf.get_u16(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.kind);
        buf.put_u8(self.domain);
        buf.put_u16(self.country);
        buf.put_u8(self.category);
        buf.put_u8(self.nomenclature_version);
        buf.put_u16(self.nomenclature);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModulationType {
    pub spread_spectrum: u16,
    pub major: u16,
    pub detail: u16,
    pub system: u16,
}

impl WireRecord for ModulationType {
    const SIZE: usize = 8;

    fn read(buf: &mut impl Buf) -> Self {
        Self {
            spread_spectrum: buf.get_u16(),
            major: buf.get_u16(),
            detail: buf.get_u16(),
            system: buf.get_u16(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.spread_spectrum);
        buf.put_u16(self.major);
        buf.put_u16(self.detail);
        buf.put_u16(self.system);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransmitState {
    Off = 0,
    OnNotTransmitting = 1,
    OnTransmitting = 2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransmitterPdu {
    pub entity_id: EntityId,
    pub radio_id: u16,
    pub radio_type: RadioType,
    pub transmit_state: u8,
    pub input_source: u8,
    pub antenna_location: DVec3,
    pub relative_antenna_location: Vec3,
    pub antenna_pattern_type: u16,
    pub frequency: u64,
    pub bandwidth: f32,
    pub power: f32,
    pub modulation: ModulationType,
    pub crypto_system: u16,
    pub crypto_key_id: u16,
    pub modulation_parameters: Vec<u8>,
    pub antenna_pattern: Vec<u8>,
}

impl TransmitterPdu {
    pub const BODY_LEN: usize = 92;

    pub fn transmit_state(&self) -> Option<TransmitState> {
        match self.transmit_state {
            0 => Some(TransmitState::Off),
            1 => Some(TransmitState::OnNotTransmitting),
            2 => Some(TransmitState::OnTransmitting),
            _ => None,
        }
    }

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, Self::BODY_LEN)?;
        let entity_id = EntityId::read(buf);
        let radio_id = buf.get_u16();
        let radio_type = RadioType::read(buf);
        let transmit_state = buf.get_u8();
        let input_source = buf.get_u8();
        buf.advance(2);
        let antenna_location = DVec3::read(buf);
        let relative_antenna_location = Vec3::read(buf);
        let antenna_pattern_type = buf.get_u16();
        let pattern_len = buf.get_u16() as usize;
        let frequency = buf.get_u64();
        let bandwidth = buf.get_f32();
        let power = buf.get_f32();
        let modulation = ModulationType::read(buf);
        let crypto_system = buf.get_u16();
        let crypto_key_id = buf.get_u16();
        let modulation_len = buf.get_u8() as usize;
        buf.advance(3);

        ensure(buf, modulation_len + pattern_len)?;
        let mut modulation_parameters = vec![0u8; modulation_len];
        buf.copy_to_slice(&mut modulation_parameters);
        let mut antenna_pattern = vec![0u8; pattern_len];
        buf.copy_to_slice(&mut antenna_pattern);

        Ok(Self {
            entity_id,
            radio_id,
            radio_type,
            transmit_state,
            input_source,
            antenna_location,
            relative_antenna_location,
            antenna_pattern_type,
            frequency,
            bandwidth,
            power,
            modulation,
            crypto_system,
            crypto_key_id,
            modulation_parameters,
            antenna_pattern,
        })
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        self.entity_id.write(buf);
        buf.put_u16(self.radio_id);
        self.radio_type.write(buf);
        buf.put_u8(self.transmit_state);
        buf.put_u8(self.input_source);
        buf.put_u16(0);
        self.antenna_location.write(buf);
        self.relative_antenna_location.write(buf);
        buf.put_u16(self.antenna_pattern_type);
        buf.put_u16(count_u16(self.antenna_pattern.len())?);
        buf.put_u64(self.frequency);
        buf.put_f32(self.bandwidth);
        buf.put_f32(self.power);
        self.modulation.write(buf);
        buf.put_u16(self.crypto_system);
        buf.put_u16(self.crypto_key_id);
        buf.put_u8(count_u8(self.modulation_parameters.len())?);
        put_padding(buf, 3);
        buf.put_slice(&self.modulation_parameters);
        buf.put_slice(&self.antenna_pattern);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_data_padded_to_word() {
        let pdu = SignalPdu {
            entity_id: EntityId::new(1, 2, 3),
            radio_id: 1,
            encoding_scheme: 0x4001,
            tdl_type: 0,
            sample_rate: 8000,
            samples: 5,
            data_bits: 40,
            data: vec![1, 2, 3, 4, 5],
        };
        let mut out = Vec::new();
        pdu.encode(&mut out).unwrap();
        assert_eq!(out.len(), SignalPdu::BODY_LEN + 8);

        let decoded = SignalPdu::decode(&mut out.as_slice()).unwrap();
        assert_eq!(decoded, pdu);
    }

    #[test]
    fn signal_rejects_short_payload() {
        let pdu = SignalPdu {
            entity_id: EntityId::new(1, 2, 3),
            radio_id: 1,
            encoding_scheme: 0,
            tdl_type: 0,
            sample_rate: 0,
            samples: 0,
            data_bits: 64,
            data: vec![0; 2],
        };
        assert!(pdu.encode(&mut Vec::new()).is_err());
    }

    #[test]
    fn transmitter_variable_tail() {
        let pdu = TransmitterPdu {
            entity_id: EntityId::new(1, 2, 3),
            radio_id: 2,
            radio_type: RadioType {
                kind: 7,
                ..Default::default()
            },
            transmit_state: 2,
            input_source: 1,
            antenna_location: DVec3::new(1.0, 2.0, 3.0),
            relative_antenna_location: Vec3::ZERO,
            antenna_pattern_type: 0,
            frequency: 243_000_000,
            bandwidth: 25_000.0,
            power: 40.0,
            modulation: ModulationType::default(),
            crypto_system: 0,
            crypto_key_id: 0,
            modulation_parameters: vec![9; 4],
            antenna_pattern: vec![7; 8],
        };
        let mut out = Vec::new();
        pdu.encode(&mut out).unwrap();
        assert_eq!(out.len(), TransmitterPdu::BODY_LEN + 12);

        let decoded = TransmitterPdu::decode(&mut out.as_slice()).unwrap();
        assert_eq!(decoded.transmit_state(), Some(TransmitState::OnTransmitting));
        assert_eq!(decoded, pdu);
    }
}
