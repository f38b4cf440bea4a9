use std::collections::HashMap;
use std::fmt;

use glam::{DVec3, Quat, Vec3};

use crate::pdu::{EntityStatePdu, EulerAngles};

pub const STATIC: u8 = 1;
pub const FPW: u8 = 2;
pub const RPW: u8 = 3;
pub const RVW: u8 = 4;
pub const FVW: u8 = 5;
pub const FPB: u8 = 6;
pub const RPB: u8 = 7;
pub const RVB: u8 = 8;
pub const FVB: u8 = 9;

/// Motion state a dead-reckoning model extrapolates from.
///
/// Velocity and acceleration are world-frame for the `*W` models and body-frame for `*B`.
/// Angular velocity is always body-frame, radians per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub position: DVec3,
    pub orientation: Quat,
    pub linear_velocity: Vec3,
    pub linear_acceleration: Vec3,
    pub angular_velocity: Vec3,
}

impl Default for Kinematics {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            linear_acceleration: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }
}

impl Kinematics {
    pub fn at(position: DVec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn from_entity_state(pdu: &EntityStatePdu) -> Self {
        Self {
            position: pdu.location,
            orientation: pdu.orientation.to_quat(),
            linear_velocity: pdu.linear_velocity,
            linear_acceleration: pdu.dead_reckoning.linear_acceleration,
            angular_velocity: pdu.dead_reckoning.angular_velocity,
        }
    }

    pub fn euler(&self) -> EulerAngles {
        EulerAngles::from_quat(self.orientation)
    }

    pub fn position_error(&self, other: &Kinematics) -> f64 {
        self.position.distance(other.position)
    }

    /// Smallest rotation, in radians, taking one orientation onto the other.
    pub fn orientation_error(&self, other: &Kinematics) -> f32 {
        self.orientation.angle_between(other.orientation)
    }
}

pub trait Extrapolator: Send + Sync {
    fn extrapolate(&self, base: &Kinematics, dt: f32) -> Kinematics;
}

impl<F> Extrapolator for F
where
    F: Fn(&Kinematics, f32) -> Kinematics + Send + Sync,
{
    fn extrapolate(&self, base: &Kinematics, dt: f32) -> Kinematics {
        self(base, dt)
    }
}

pub struct Static;

impl Extrapolator for Static {
    fn extrapolate(&self, base: &Kinematics, _dt: f32) -> Kinematics {
        *base
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    World,
    Body,
}

/// Closed-form constant velocity or constant acceleration, optionally rotating.
#[derive(Debug, Clone, Copy)]
pub struct Standard {
    pub rotating: bool,
    pub accelerating: bool,
    pub frame: Frame,
}

impl Standard {
    pub const fn new(rotating: bool, accelerating: bool, frame: Frame) -> Self {
        Self {
            rotating,
            accelerating,
            frame,
        }
    }
}

impl Extrapolator for Standard {
    fn extrapolate(&self, base: &Kinematics, dt: f32) -> Kinematics {
        let mut out = *base;

        let mut displacement = base.linear_velocity * dt;
        if self.accelerating {
            displacement += 0.5 * base.linear_acceleration * dt * dt;
            out.linear_velocity = base.linear_velocity + base.linear_acceleration * dt;
        }
        if self.frame == Frame::Body {
            displacement = base.orientation * displacement;
        }
        out.position = base.position + displacement.as_dvec3();

        if self.rotating {
            let spin = Quat::from_scaled_axis(base.angular_velocity * dt);
            out.orientation = (base.orientation * spin).normalize();
        }
        out
    }
}

/// Extrapolators keyed by the wire algorithm selector.
pub struct DeadReckoningModels {
    models: HashMap<u8, Box<dyn Extrapolator>>,
}

impl fmt::Debug for DeadReckoningModels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.models.keys().collect();
        ids.sort();
        f.debug_struct("DeadReckoningModels").field("ids", &ids).finish()
    }
}

impl Default for DeadReckoningModels {
    fn default() -> Self {
        let mut models = Self {
            models: HashMap::new(),
        };
        models.register(STATIC, Static);
        models.register(FPW, Standard::new(false, false, Frame::World));
        models.register(RPW, Standard::new(true, false, Frame::World));
        models.register(RVW, Standard::new(true, true, Frame::World));
        models.register(FVW, Standard::new(false, true, Frame::World));
        models.register(FPB, Standard::new(false, false, Frame::Body));
        models.register(RPB, Standard::new(true, false, Frame::Body));
        models.register(RVB, Standard::new(true, true, Frame::Body));
        models.register(FVB, Standard::new(false, true, Frame::Body));
        models
    }
}

impl DeadReckoningModels {
    pub fn register(&mut self, algorithm: u8, model: impl Extrapolator + 'static) {
        self.models.insert(algorithm, Box::new(model));
    }

    pub fn contains(&self, algorithm: u8) -> bool {
        self.models.contains_key(&algorithm)
    }

    /// Unknown selectors extrapolate as constant velocity.
    pub fn extrapolate(&self, algorithm: u8, base: &Kinematics, dt: f32) -> Kinematics {
        match self.models.get(&algorithm) {
            Some(model) => model.extrapolate(base, dt),
            None => Standard::new(false, false, Frame::World).extrapolate(base, dt),
        }
    }
}
