pub mod dead_reckoning;

use std::time::Duration;

use crate::naming::{federate_name, EntityMarking};
use crate::pdu::{Appearance, DeadReckoningParams, EntityStatePdu};
use crate::threshold::Thresholds;
use crate::trie::TypeMapping;
use crate::types::{EntityId, ForceId, TypeCode};

pub use dead_reckoning::{DeadReckoningModels, Extrapolator, Kinematics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Published by this process.
    Outgoing,
    /// Mirrored from a peer.
    Incoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitCause {
    Initial,
    Heartbeat,
    Position,
    Orientation,
}

/// Per-entity synchronization record.
#[derive(Debug, Clone)]
pub struct Nib {
    id: EntityId,
    role: Role,
    federate: String,
    entity_type: TypeCode,
    force_id: ForceId,
    marking: EntityMarking,
    appearance: Appearance,
    algorithm: u8,
    /// Outgoing: the true state. Incoming: the last received state.
    base: Kinematics,
    /// Outgoing: last transmitted state. Incoming: unused.
    last_sent: Option<Kinematics>,
    /// Incoming: extrapolated proxy. Outgoing: mirrors `base`.
    proxy: Kinematics,
    since_update: Duration,
    since_base: f32,
    mapping: Option<TypeMapping>,
}

impl Nib {
    pub fn outgoing(id: EntityId, entity_type: TypeCode, initial: Kinematics) -> Self {
        Self::new(id, Role::Outgoing, entity_type, initial)
    }

    pub fn incoming(pdu: &EntityStatePdu) -> Self {
        let mut nib = Self::new(
            pdu.entity_id,
            Role::Incoming,
            pdu.entity_type,
            Kinematics::from_entity_state(pdu),
        );
        nib.apply_incoming_update(pdu);
        nib
    }

    fn new(id: EntityId, role: Role, entity_type: TypeCode, initial: Kinematics) -> Self {
        Self {
            id,
            role,
            federate: federate_name(id.site, id.application),
            entity_type,
            force_id: ForceId::Other,
            marking: EntityMarking::default(),
            appearance: Appearance::empty(),
            algorithm: dead_reckoning::FPW,
            base: initial,
            last_sent: None,
            proxy: initial,
            since_update: Duration::ZERO,
            since_base: 0.0,
            mapping: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn federate(&self) -> &str {
        &self.federate
    }

    pub fn entity_type(&self) -> TypeCode {
        self.entity_type
    }

    pub fn force_id(&self) -> ForceId {
        self.force_id
    }

    pub fn marking(&self) -> &EntityMarking {
        &self.marking
    }

    pub fn appearance(&self) -> Appearance {
        self.appearance
    }

    pub fn algorithm(&self) -> u8 {
        self.algorithm
    }

    /// The state consumers should render or simulate against this tick.
    pub fn kinematics(&self) -> &Kinematics {
        &self.proxy
    }

    pub fn last_received(&self) -> &Kinematics {
        &self.base
    }

    pub fn mapping(&self) -> Option<&TypeMapping> {
        self.mapping.as_ref()
    }

    pub fn is_untyped(&self) -> bool {
        self.mapping.is_none()
    }

    pub(crate) fn set_mapping(&mut self, mapping: Option<TypeMapping>) {
        self.mapping = mapping;
    }

    /// Moves the record to a new originator. The next evaluation announces it afresh.
    pub(crate) fn reassign(&mut self, id: EntityId) {
        self.id = id;
        self.federate = federate_name(id.site, id.application);
        self.last_sent = None;
    }

    pub fn since_update(&self) -> Duration {
        self.since_update
    }

    pub fn set_force_id(&mut self, force_id: ForceId) {
        self.force_id = force_id;
    }

    pub fn set_marking(&mut self, marking: EntityMarking) {
        self.marking = marking;
    }

    pub fn set_appearance(&mut self, appearance: Appearance) {
        self.appearance = appearance;
    }

    pub fn set_algorithm(&mut self, algorithm: u8) {
        self.algorithm = algorithm;
    }

    // Outgoing

    pub fn update_from_true_state(&mut self, truth: Kinematics) {
        debug_assert_eq!(self.role, Role::Outgoing);
        self.base = truth;
        self.proxy = truth;
    }

    /// Advances the heartbeat timer by `dt` and reports whether an update is due.
    pub fn should_transmit(
        &mut self,
        thresholds: &Thresholds,
        dt: Duration,
        models: &DeadReckoningModels,
    ) -> bool {
        self.since_update += dt;
        self.transmit_cause(thresholds, models).is_some()
    }

    /// Why an update is due, without advancing time. Timer checks run first.
    pub fn transmit_cause(
        &self,
        thresholds: &Thresholds,
        models: &DeadReckoningModels,
    ) -> Option<TransmitCause> {
        let Some(sent) = &self.last_sent else {
            return Some(TransmitCause::Initial);
        };
        if self.since_update >= thresholds.max_dr_time {
            return Some(TransmitCause::Heartbeat);
        }

        let predicted =
            models.extrapolate(self.algorithm, sent, self.since_update.as_secs_f32());
        if predicted.position_error(&self.base) > thresholds.max_position_error {
            return Some(TransmitCause::Position);
        }
        if predicted.orientation_error(&self.base) > thresholds.max_orientation_error {
            return Some(TransmitCause::Orientation);
        }
        None
    }

    pub fn mark_sent(&mut self) {
        self.last_sent = Some(self.base);
        self.since_update = Duration::ZERO;
    }

    pub fn to_entity_state_pdu(&self) -> EntityStatePdu {
        let state = &self.base;
        EntityStatePdu {
            force_id: self.force_id,
            linear_velocity: state.linear_velocity,
            location: state.position,
            orientation: state.euler(),
            appearance: self.appearance,
            dead_reckoning: DeadReckoningParams {
                algorithm: self.algorithm,
                linear_acceleration: state.linear_acceleration,
                angular_velocity: state.angular_velocity,
                ..Default::default()
            },
            marking: self.marking,
            ..EntityStatePdu::new(self.id, self.entity_type)
        }
    }

    // Incoming

    pub fn apply_incoming_update(&mut self, pdu: &EntityStatePdu) {
        debug_assert_eq!(self.role, Role::Incoming);
        self.entity_type = pdu.entity_type;
        self.force_id = pdu.force_id;
        self.marking = pdu.marking;
        self.appearance = pdu.appearance;
        self.algorithm = pdu.dead_reckoning.algorithm;
        self.base = Kinematics::from_entity_state(pdu);
        self.proxy = self.base;
        self.since_update = Duration::ZERO;
        self.since_base = 0.0;
    }

    pub fn extrapolate(&mut self, dt: Duration, models: &DeadReckoningModels) {
        if self.appearance.contains(Appearance::FROZEN) {
            return;
        }
        self.since_base += dt.as_secs_f32();
        self.proxy = models.extrapolate(self.algorithm, &self.base, self.since_base);
    }

    pub fn age(&mut self, dt: Duration) {
        self.since_update += dt;
    }

    pub fn is_stale(&self, thresholds: &Thresholds) -> bool {
        self.since_update >= thresholds.max_age
    }
}
