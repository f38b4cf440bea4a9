use bytes::{Buf, BufMut};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::codec::{count_u8, ensure, WireRecord};
use crate::error::PduError;
use crate::types::{EntityId, EventId};

const WORD: usize = 4;
const SYSTEM_HEADER_LEN: usize = 20;
const BEAM_HEADER_LEN: usize = 52;
const TRACK_JAM_LEN: usize = 8;

/// Identity an emission handler matches on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmitterSystemType {
    pub name: u16,
    pub function: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FundamentalParameters {
    pub frequency: f32,
    pub frequency_range: f32,
    pub effective_radiated_power: f32,
    pub pulse_repetition_frequency: f32,
    pub pulse_width: f32,
    pub azimuth_center: f32,
    pub azimuth_sweep: f32,
    pub elevation_center: f32,
    pub elevation_sweep: f32,
    pub sweep_sync: f32,
}

impl WireRecord for FundamentalParameters {
    const SIZE: usize = 40;

    fn read(buf: &mut impl Buf) -> Self {
        Self {
            frequency: buf.get_f32(),
            frequency_range: buf.get_f32(),
            effective_radiated_power: buf.get_f32(),
            pulse_repetition_frequency: buf.get_f32(),
            pulse_width: buf.get_f32(),
            azimuth_center: buf.get_f32(),
            azimuth_sweep: buf.get_f32(),
            elevation_center: buf.get_f32(),
            elevation_sweep: buf.get_f32(),
            sweep_sync: buf.get_f32(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_f32(self.frequency);
        buf.put_f32(self.frequency_range);
        buf.put_f32(self.effective_radiated_power);
        buf.put_f32(self.pulse_repetition_frequency);
        buf.put_f32(self.pulse_width);
        buf.put_f32(self.azimuth_center);
        buf.put_f32(self.azimuth_sweep);
        buf.put_f32(self.elevation_center);
        buf.put_f32(self.elevation_sweep);
        buf.put_f32(self.sweep_sync);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackJamTarget {
    pub entity: EntityId,
    pub emitter_id: u8,
    pub beam_id: u8,
}

impl WireRecord for TrackJamTarget {
    const SIZE: usize = TRACK_JAM_LEN;

    fn read(buf: &mut impl Buf) -> Self {
        Self {
            entity: EntityId::read(buf),
            emitter_id: buf.get_u8(),
            beam_id: buf.get_u8(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        self.entity.write(buf);
        buf.put_u8(self.emitter_id);
        buf.put_u8(self.beam_id);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Beam {
    pub beam_id: u8,
    pub parameter_index: u16,
    pub parameters: FundamentalParameters,
    pub function: u8,
    pub high_density_track: bool,
    pub jamming_mode: u32,
    pub targets: Vec<TrackJamTarget>,
}

impl Beam {
    fn wire_len(&self) -> usize {
        BEAM_HEADER_LEN + self.targets.len() * TRACK_JAM_LEN
    }

    fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        let start = buf.remaining();
        ensure(buf, BEAM_HEADER_LEN)?;
        let declared = buf.get_u8() as usize * WORD;
        let beam_id = buf.get_u8();
        let parameter_index = buf.get_u16();
        let parameters = FundamentalParameters::read(buf);
        let function = buf.get_u8();
        let target_count = buf.get_u8() as usize;
        let high_density_track = buf.get_u8() != 0;
        buf.advance(1);
        let jamming_mode = buf.get_u32();

        ensure(buf, target_count * TRACK_JAM_LEN)?;
        let targets = (0..target_count).map(|_| TrackJamTarget::read(buf)).collect();

        skip_extension(buf, declared, start)?;
        Ok(Self {
            beam_id,
            parameter_index,
            parameters,
            function,
            high_density_track,
            jamming_mode,
            targets,
        })
    }

    fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        buf.put_u8(count_u8(self.wire_len() / WORD)?);
        buf.put_u8(self.beam_id);
        buf.put_u16(self.parameter_index);
        self.parameters.write(buf);
        buf.put_u8(self.function);
        buf.put_u8(count_u8(self.targets.len())?);
        buf.put_u8(self.high_density_track as u8);
        buf.put_u8(0);
        buf.put_u32(self.jamming_mode);
        for target in &self.targets {
            target.write(buf);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmitterSystem {
    pub system_type: EmitterSystemType,
    pub id_number: u8,
    pub location: Vec3,
    pub beams: Vec<Beam>,
}

impl EmitterSystem {
    fn wire_len(&self) -> usize {
        SYSTEM_HEADER_LEN + self.beams.iter().map(Beam::wire_len).sum::<usize>()
    }

    fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        let start = buf.remaining();
        ensure(buf, SYSTEM_HEADER_LEN)?;
        let declared = buf.get_u8() as usize * WORD;
        let beam_count = buf.get_u8() as usize;
        buf.advance(2);
        let system_type = EmitterSystemType {
            name: buf.get_u16(),
            function: buf.get_u8(),
        };
        let id_number = buf.get_u8();
        let location = Vec3::read(buf);

        let beams = (0..beam_count)
            .map(|_| Beam::decode(buf))
            .collect::<Result<Vec<_>, _>>()?;

        skip_extension(buf, declared, start)?;
        Ok(Self {
            system_type,
            id_number,
            location,
            beams,
        })
    }

    fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        buf.put_u8(count_u8(self.wire_len() / WORD)?);
        buf.put_u8(count_u8(self.beams.len())?);
        buf.put_u16(0);
        buf.put_u16(self.system_type.name);
        buf.put_u8(self.system_type.function);
        buf.put_u8(self.id_number);
        self.location.write(buf);
        for beam in &self.beams {
            beam.encode(buf)?;
        }
        Ok(())
    }
}

// Peers may append fields we do not model; the declared length lets us step over them.
fn skip_extension(buf: &mut impl Buf, declared: usize, start: usize) -> Result<(), PduError> {
    let consumed = start - buf.remaining();
    if declared > consumed {
        let extra = declared - consumed;
        ensure(buf, extra)?;
        buf.advance(extra);
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmissionPdu {
    pub emitting_entity: EntityId,
    pub event: EventId,
    pub state_update: u8,
    pub systems: Vec<EmitterSystem>,
}

impl EmissionPdu {
    pub const BODY_LEN: usize = 16;

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, Self::BODY_LEN)?;
        let emitting_entity = EntityId::read(buf);
        let event = EventId::read(buf);
        let state_update = buf.get_u8();
        let system_count = buf.get_u8() as usize;
        buf.advance(2);

        let systems = (0..system_count)
            .map(|_| EmitterSystem::decode(buf))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            emitting_entity,
            event,
            state_update,
            systems,
        })
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        self.emitting_entity.write(buf);
        self.event.write(buf);
        buf.put_u8(self.state_update);
        buf.put_u8(count_u8(self.systems.len())?);
        buf.put_u16(0);
        for system in &self.systems {
            system.encode(buf)?;
        }
        Ok(())
    }
}
