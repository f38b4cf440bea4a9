use std::f64::consts::TAU;
use std::time::Duration;

use glam::{DVec3, Quat, Vec3};

use disnet::{Kinematics, TypeCode};

pub const DEMO_ENTITY: u16 = 1;
/// Platform, air, United States, fighter.
pub const DEMO_TYPE: TypeCode = TypeCode::new(1, 2, 225, 1, 0, 0, 0);

/// Flies a level circle around a fixed point.
#[derive(Debug, Clone)]
pub struct CirclingEntity {
    center: DVec3,
    radius: f64,
    period: f64,
    elapsed: f64,
}

impl CirclingEntity {
    pub fn new(center: DVec3, radius: f64, period: Duration) -> Self {
        Self {
            center,
            radius,
            period: period.as_secs_f64().max(1.0),
            elapsed: 0.0,
        }
    }

    pub fn advance(&mut self, dt: Duration) -> Kinematics {
        self.elapsed = (self.elapsed + dt.as_secs_f64()) % self.period;
        self.state()
    }

    pub fn state(&self) -> Kinematics {
        let rate = TAU / self.period;
        let angle = self.elapsed * rate;
        let speed = (self.radius * rate) as f32;
        let heading = (angle + TAU / 4.0) as f32;

        Kinematics {
            position: self.center + DVec3::new(angle.cos(), angle.sin(), 0.0) * self.radius,
            orientation: Quat::from_rotation_z(heading),
            linear_velocity: Vec3::new(heading.cos(), heading.sin(), 0.0) * speed,
            linear_acceleration: Vec3::ZERO,
            angular_velocity: Vec3::new(0.0, 0.0, rate as f32),
        }
    }
}
