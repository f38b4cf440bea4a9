use bitflags::bitflags;
use bytes::{Buf, BufMut};
use glam::{DVec3, Vec3};

use super::codec::{count_u8, ensure, read_records, ArticulationParameter, EulerAngles, WireRecord};
use crate::error::PduError;
use crate::naming::{EntityMarking, MARKING_LEN};
use crate::types::{EntityId, ForceId, TypeCode};

bitflags! {
    /// Platform appearance word. Only the bits the engine reacts to are named.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Appearance: u32 {
        const MOBILITY_KILL = 1 << 1;
        const FIREPOWER_KILL = 1 << 2;
        const DAMAGE = 0b11 << 3;
        const SMOKE = 0b11 << 5;
        const FLAMING = 1 << 15;
        const FROZEN = 1 << 21;
        const POWER_PLANT_ON = 1 << 22;
        const DEACTIVATED = 1 << 23;

        const _ = !0;
    }
}

impl Appearance {
    pub fn is_destroyed(self) -> bool {
        self.bits() & Self::DAMAGE.bits() == Self::DAMAGE.bits()
    }

    pub fn is_smoking(self) -> bool {
        self.intersects(Self::SMOKE)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeadReckoningParams {
    pub algorithm: u8,
    pub other: [u8; 15],
    pub linear_acceleration: Vec3,
    pub angular_velocity: Vec3,
}

impl WireRecord for DeadReckoningParams {
    const SIZE: usize = 40;

    fn read(buf: &mut impl Buf) -> Self {
        let algorithm = buf.get_u8();
        let mut other = [0u8; 15];
        buf.copy_to_slice(&mut other);
        Self {
            algorithm,
            other,
            linear_acceleration: Vec3::read(buf),
            angular_velocity: Vec3::read(buf),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.algorithm);
        buf.put_slice(&self.other);
        self.linear_acceleration.write(buf);
        self.angular_velocity.write(buf);
    }
}

impl WireRecord for EntityMarking {
    const SIZE: usize = 1 + MARKING_LEN;

    fn read(buf: &mut impl Buf) -> Self {
        let character_set = buf.get_u8();
        let mut chars = [0u8; MARKING_LEN];
        buf.copy_to_slice(&mut chars);
        Self {
            character_set,
            chars,
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.character_set);
        buf.put_slice(&self.chars);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityStatePdu {
    pub entity_id: EntityId,
    pub force_id: ForceId,
    pub entity_type: TypeCode,
    pub alternative_type: TypeCode,
    pub linear_velocity: Vec3,
    pub location: DVec3,
    pub orientation: EulerAngles,
    pub appearance: Appearance,
    pub dead_reckoning: DeadReckoningParams,
    pub marking: EntityMarking,
    pub capabilities: u32,
    pub articulations: Vec<ArticulationParameter>,
}

impl EntityStatePdu {
    pub const BODY_LEN: usize = 132;

    pub fn new(entity_id: EntityId, entity_type: TypeCode) -> Self {
        Self {
            entity_id,
            force_id: ForceId::Other,
            entity_type,
            alternative_type: entity_type,
            linear_velocity: Vec3::ZERO,
            location: DVec3::ZERO,
            orientation: EulerAngles::default(),
            appearance: Appearance::empty(),
            dead_reckoning: DeadReckoningParams::default(),
            marking: EntityMarking::default(),
            capabilities: 0,
            articulations: Vec::new(),
        }
    }

    pub(crate) fn decode(buf: &mut impl Buf) -> Result<Self, PduError> {
        ensure(buf, Self::BODY_LEN)?;
        let entity_id = EntityId::read(buf);
        let force_id = ForceId::from(buf.get_u8());
        let articulation_count = buf.get_u8() as usize;
        let entity_type = TypeCode::read(buf);
        let alternative_type = TypeCode::read(buf);
        let linear_velocity = Vec3::read(buf);
        let location = DVec3::read(buf);
        let orientation = EulerAngles::read(buf);
        let appearance = Appearance::from_bits_retain(buf.get_u32());
        let dead_reckoning = DeadReckoningParams::read(buf);
        let marking = EntityMarking::read(buf);
        let capabilities = buf.get_u32();
        let articulations = read_records(buf, articulation_count)?;

        Ok(Self {
            entity_id,
            force_id,
            entity_type,
            alternative_type,
            linear_velocity,
            location,
            orientation,
            appearance,
            dead_reckoning,
            marking,
            capabilities,
            articulations,
        })
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) -> Result<(), PduError> {
        self.entity_id.write(buf);
        buf.put_u8(self.force_id as u8);
        buf.put_u8(count_u8(self.articulations.len())?);
        self.entity_type.write(buf);
        self.alternative_type.write(buf);
        self.linear_velocity.write(buf);
        self.location.write(buf);
        self.orientation.write(buf);
        buf.put_u32(self.appearance.bits());
        self.dead_reckoning.write(buf);
        self.marking.write(buf);
        buf.put_u32(self.capabilities);
        for articulation in &self.articulations {
            articulation.write(buf);
        }
        Ok(())
    }
}
