use bytes::{Buf, BufMut};
use glam::{DVec3, Vec3};

use super::codec::{
    count_u8, ensure, read_records, ArticulationParameter, BurstDescriptor, WireRecord,
};
use crate::error::PduError;
use crate::types::{EntityId, EventId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FirePdu {
    pub firing_entity: EntityId,
    pub target_entity: EntityId,
    pub munition: EntityId,
    pub event: EventId,
    pub fire_mission_index: u32,
    pub location: DVec3,
    pub burst: BurstDescriptor,
    pub velocity: Vec3,
    pub range: f32,
}

impl FirePdu {
    pub const BODY_LEN: usize = 84;

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, Self::BODY_LEN)?;
        Ok(Self {
            firing_entity: EntityId::read(buf),
            target_entity: EntityId::read(buf),
            munition: EntityId::read(buf),
            event: EventId::read(buf),
            fire_mission_index: buf.get_u32(),
            location: DVec3::read(buf),
            burst: BurstDescriptor::read(buf),
            velocity: Vec3::read(buf),
            range: buf.get_f32(),
        })
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        self.firing_entity.write(buf);
        self.target_entity.write(buf);
        self.munition.write(buf);
        self.event.write(buf);
        buf.put_u32(self.fire_mission_index);
        self.location.write(buf);
        self.burst.write(buf);
        self.velocity.write(buf);
        buf.put_f32(self.range);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DetonationResult {
    Other = 0,
    EntityImpact = 1,
    EntityProximate = 2,
    GroundImpact = 3,
    GroundProximate = 4,
    Detonation = 5,
    None = 6,
}

impl DetonationResult {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::EntityImpact,
            2 => Self::EntityProximate,
            3 => Self::GroundImpact,
            4 => Self::GroundProximate,
            5 => Self::Detonation,
            6 => Self::None,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetonationPdu {
    pub firing_entity: EntityId,
    pub target_entity: EntityId,
    pub munition: EntityId,
    pub event: EventId,
    pub velocity: Vec3,
    pub location: DVec3,
    pub burst: BurstDescriptor,
    pub location_in_entity: Vec3,
    pub result: u8,
    pub articulations: Vec<ArticulationParameter>,
}

impl DetonationPdu {
    pub const BODY_LEN: usize = 92;

    pub fn result(&self) -> DetonationResult {
        DetonationResult::from_u8(self.result)
    }

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, Self::BODY_LEN)?;
        let firing_entity = EntityId::read(buf);
        let target_entity = EntityId::read(buf);
        let munition = EntityId::read(buf);
        let event = EventId::read(buf);
        let velocity = Vec3::read(buf);
        let location = DVec3::read(buf);
        let burst = BurstDescriptor::read(buf);
        let location_in_entity = Vec3::read(buf);
        let result = buf.get_u8();
        let count = buf.get_u8() as usize;
        buf.advance(2);

        Ok(Self {
            firing_entity,
            target_entity,
            munition,
            event,
            velocity,
            location,
            burst,
            location_in_entity,
            result,
            articulations: read_records(buf, count)?,
        })
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        self.firing_entity.write(buf);
        self.target_entity.write(buf);
        self.munition.write(buf);
        self.event.write(buf);
        self.velocity.write(buf);
        self.location.write(buf);
        self.burst.write(buf);
        self.location_in_entity.write(buf);
        buf.put_u8(self.result);
        buf.put_u8(count_u8(self.articulations.len())?);
        buf.put_u16(0);
        for articulation in &self.articulations {
            articulation.write(buf);
        }
        Ok(())
    }
}
