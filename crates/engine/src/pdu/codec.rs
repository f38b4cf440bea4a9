use bytes::{Buf, BufMut};
use glam::{DVec3, EulerRot, Quat, Vec3};

use crate::error::PduError;
use crate::types::{EntityId, EventId, TypeCode};

/// A fixed-size field group shared between PDU layouts.
///
/// `read` assumes the caller already checked `SIZE` bytes are available.
pub trait WireRecord: Sized {
    const SIZE: usize;

    fn read(buf: &mut impl Buf) -> Self;
    fn write(&self, buf: &mut impl BufMut);
}

#[inline]
pub(crate) fn ensure(buf: &impl Buf, needed: usize) -> Result<(), PduError> {
    if buf.remaining() < needed {
        return Err(PduError::Truncated {
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

pub(crate) fn read_records<T: WireRecord>(
    buf: &mut impl Buf,
    count: usize,
) -> Result<Vec<T>, PduError> {
    ensure(buf, count.saturating_mul(T::SIZE))?;
    Ok((0..count).map(|_| T::read(buf)).collect())
}

pub(crate) fn count_u8(count: usize) -> Result<u8, PduError> {
    u8::try_from(count).map_err(|_| PduError::TooManyRecords { count })
}

pub(crate) fn count_u16(count: usize) -> Result<u16, PduError> {
    u16::try_from(count).map_err(|_| PduError::TooManyRecords { count })
}

pub(crate) fn count_u32(count: usize) -> Result<u32, PduError> {
    u32::try_from(count).map_err(|_| PduError::TooManyRecords { count })
}

pub(crate) fn put_padding(buf: &mut impl BufMut, len: usize) {
    buf.put_bytes(0, len);
}

/// Bytes needed to round `len` up to a multiple of `align`.
pub(crate) fn padding_for(len: usize, align: usize) -> usize {
    (align - len % align) % align
}

impl WireRecord for EntityId {
    const SIZE: usize = 6;

    fn read(buf: &mut impl Buf) -> Self {
        Self {
            site: buf.get_u16(),
            application: buf.get_u16(),
            entity: buf.get_u16(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.site);
        buf.put_u16(self.application);
        buf.put_u16(self.entity);
    }
}

impl WireRecord for EventId {
    const SIZE: usize = 6;

    fn read(buf: &mut impl Buf) -> Self {
        Self {
            site: buf.get_u16(),
            application: buf.get_u16(),
            event: buf.get_u16(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u16(self.site);
        buf.put_u16(self.application);
        buf.put_u16(self.event);
    }
}

impl WireRecord for TypeCode {
    const SIZE: usize = 8;

    fn read(buf: &mut impl Buf) -> Self {
        Self {
            kind: buf.get_u8(),
            domain: buf.get_u8(),
            country: buf.get_u16(),
            category: buf.get_u8(),
            subcategory: buf.get_u8(),
            specific: buf.get_u8(),
            extra: buf.get_u8(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.kind);
        buf.put_u8(self.domain);
        buf.put_u16(self.country);
        buf.put_u8(self.category);
        buf.put_u8(self.subcategory);
        buf.put_u8(self.specific);
        buf.put_u8(self.extra);
    }
}

impl WireRecord for Vec3 {
    const SIZE: usize = 12;

    fn read(buf: &mut impl Buf) -> Self {
        Vec3::new(buf.get_f32(), buf.get_f32(), buf.get_f32())
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_f32(self.x);
        buf.put_f32(self.y);
        buf.put_f32(self.z);
    }
}

impl WireRecord for DVec3 {
    const SIZE: usize = 24;

    fn read(buf: &mut impl Buf) -> Self {
        DVec3::new(buf.get_f64(), buf.get_f64(), buf.get_f64())
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_f64(self.x);
        buf.put_f64(self.y);
        buf.put_f64(self.z);
    }
}

/// Euler angles in radians: heading `psi` about z, pitch `theta` about y, roll `phi` about x.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EulerAngles {
    pub psi: f32,
    pub theta: f32,
    pub phi: f32,
}

impl EulerAngles {
    pub const fn new(psi: f32, theta: f32, phi: f32) -> Self {
        Self { psi, theta, phi }
    }

    pub fn to_quat(self) -> Quat {
        Quat::from_euler(EulerRot::ZYX, self.psi, self.theta, self.phi)
    }

    pub fn from_quat(quat: Quat) -> Self {
        let (psi, theta, phi) = quat.to_euler(EulerRot::ZYX);
        Self { psi, theta, phi }
    }
}

impl WireRecord for EulerAngles {
    const SIZE: usize = 12;

    fn read(buf: &mut impl Buf) -> Self {
        Self {
            psi: buf.get_f32(),
            theta: buf.get_f32(),
            phi: buf.get_f32(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_f32(self.psi);
        buf.put_f32(self.theta);
        buf.put_f32(self.phi);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BurstDescriptor {
    pub munition: TypeCode,
    pub warhead: u16,
    pub fuse: u16,
    pub quantity: u16,
    pub rate: u16,
}

impl WireRecord for BurstDescriptor {
    const SIZE: usize = 16;

    fn read(buf: &mut impl Buf) -> Self {
        Self {
            munition: TypeCode::read(buf),
            warhead: buf.get_u16(),
            fuse: buf.get_u16(),
            quantity: buf.get_u16(),
            rate: buf.get_u16(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        self.munition.write(buf);
        buf.put_u16(self.warhead);
        buf.put_u16(self.fuse);
        buf.put_u16(self.quantity);
        buf.put_u16(self.rate);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArticulationParameter {
    pub designator: u8,
    pub change_indicator: u8,
    pub attached_to: u16,
    pub parameter_type: u32,
    pub value: f64,
}

impl WireRecord for ArticulationParameter {
    const SIZE: usize = 16;

    fn read(buf: &mut impl Buf) -> Self {
        Self {
            designator: buf.get_u8(),
            change_indicator: buf.get_u8(),
            attached_to: buf.get_u16(),
            parameter_type: buf.get_u32(),
            value: buf.get_f64(),
        }
    }

    fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.designator);
        buf.put_u8(self.change_indicator);
        buf.put_u16(self.attached_to);
        buf.put_u32(self.parameter_type);
        buf.put_f64(self.value);
    }
}
