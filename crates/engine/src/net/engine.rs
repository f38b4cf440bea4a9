use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use glam::DVec3;

use super::config::EngineConfig;
use super::events::{NetEvent, RemovalReason};
use super::stats::EngineStats;
use super::transport::Transport;
use crate::emission::{EmissionQuery, EmissionRegistry, QueryPool};
use crate::error::{ConfigError, RegisterError, SendError};
use crate::naming::{federate_name, federation_name};
use crate::nib::{DeadReckoningModels, Kinematics, Nib, Role};
use crate::pdu::{
    frames, originator, Appearance, Beam, EmissionPdu, EmitterSystem, EntityStatePdu, Pdu,
    PduHeader, Timestamp, TrackJamTarget, DEFAULT_PROTOCOL_VERSION, HEADER_LEN,
    HOST_BYTE_ORDER, MAX_PROTOCOL_VERSION,
};
use crate::threshold::ThresholdTable;
use crate::trie::{TypeMapping, TypeTrie};
use crate::types::{EntityId, EventId, TypeCode};

/// Datagrams handled per `receive_and_dispatch` call.
pub const MAX_DATAGRAMS_PER_TICK: usize = 256;
pub const RECV_BUFFER_SIZE: usize = 65536;

type UnknownPduHook = Box<dyn FnMut(&PduHeader, &[u8])>;

/// Owns session identity and every NIB; routes inbound PDUs and schedules outbound ones.
///
/// Meant to be driven from a single thread once per simulation tick. Only the emission
/// query pool is shared with other threads.
pub struct ProtocolEngine<T: Transport> {
    transport: T,
    site: u16,
    application: u16,
    exercise: u8,
    protocol_version: u8,
    federate: String,
    federation: String,
    nibs: HashMap<(EntityId, Role), Nib>,
    thresholds: ThresholdTable,
    types: TypeTrie<TypeMapping>,
    emission_handlers: EmissionRegistry,
    models: DeadReckoningModels,
    queries: Arc<QueryPool<EmissionQuery>>,
    interest_center: Option<DVec3>,
    unknown_hook: Option<UnknownPduHook>,
    pending_events: VecDeque<NetEvent>,
    stats: EngineStats,
    recv_buffer: Vec<u8>,
    next_event: u16,
}

impl<T: Transport> ProtocolEngine<T> {
    pub fn new(transport: T) -> Self {
        log::debug!(
            "host byte order {:?}, swapping: {}",
            HOST_BYTE_ORDER,
            HOST_BYTE_ORDER.differs_from_wire()
        );

        Self {
            transport,
            site: 0,
            application: 0,
            exercise: 0,
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            federate: String::new(),
            federation: String::new(),
            nibs: HashMap::new(),
            thresholds: ThresholdTable::default(),
            types: TypeTrie::new(),
            emission_handlers: EmissionRegistry::new(),
            models: DeadReckoningModels::default(),
            queries: Arc::new(QueryPool::new()),
            interest_center: None,
            unknown_hook: None,
            pending_events: VecDeque::new(),
            stats: EngineStats::default(),
            recv_buffer: vec![0; RECV_BUFFER_SIZE],
            next_event: 1,
        }
    }

    pub fn with_config(transport: T, config: &EngineConfig) -> Result<Self, ConfigError> {
        let mut engine = Self::new(transport);
        engine.apply_config(config)?;
        Ok(engine)
    }

    /// Validates the whole config before touching any state, so a rejected config
    /// leaves the engine as it was.
    pub fn apply_config(&mut self, config: &EngineConfig) -> Result<(), ConfigError> {
        let site = config.site_id()?;
        let application = config.application_id()?;
        let exercise = config.exercise_id()?;
        let protocol_version = config.version()?;
        let thresholds = config.threshold_table()?;
        let emission_handlers = config.emission_registry()?;

        self.site = site;
        self.application = application;
        self.exercise = exercise;
        self.protocol_version = protocol_version;
        self.refresh_names();
        self.reassign_outgoing();
        self.thresholds = thresholds;
        self.emission_handlers = emission_handlers;

        for mapping in &config.entity_types {
            // duplicates are already logged by the trie; the first mapping stays
            let _ = self.types.register_mapping(mapping.clone());
        }
        self.refresh_mappings();

        log::info!(
            "engine configured as {} in {} ({} thresholds, {} handlers, {} types)",
            self.federate,
            self.federation,
            config.thresholds.len(),
            self.emission_handlers.len(),
            self.types.len()
        );
        Ok(())
    }

    // Identity

    pub fn set_site_id(&mut self, site: u32) -> Result<(), ConfigError> {
        let site = u16::try_from(site).map_err(|_| {
            log::warn!("rejecting site id {}", site);
            ConfigError::SiteOutOfRange(site)
        })?;
        self.site = site;
        self.refresh_names();
        self.reassign_outgoing();
        Ok(())
    }

    pub fn set_application_id(&mut self, application: u32) -> Result<(), ConfigError> {
        let application = u16::try_from(application).map_err(|_| {
            log::warn!("rejecting application id {}", application);
            ConfigError::ApplicationOutOfRange(application)
        })?;
        self.application = application;
        self.refresh_names();
        self.reassign_outgoing();
        Ok(())
    }

    pub fn set_exercise_id(&mut self, exercise: u32) -> Result<(), ConfigError> {
        let exercise = u8::try_from(exercise).map_err(|_| {
            log::warn!("rejecting exercise id {}", exercise);
            ConfigError::ExerciseOutOfRange(exercise)
        })?;
        self.exercise = exercise;
        self.refresh_names();
        Ok(())
    }

    fn refresh_names(&mut self) {
        self.federate = federate_name(self.site, self.application);
        self.federation = federation_name(self.exercise);
    }

    /// Rekeys published entities under the current site and application. Peers get a
    /// deactivation for the old id and an initial update for the new one.
    fn reassign_outgoing(&mut self) {
        let current = (self.site, self.application);
        let moved: Vec<EntityId> = self
            .nibs
            .keys()
            .filter(|(id, role)| *role == Role::Outgoing && id.originator() != current)
            .map(|(id, _)| *id)
            .collect();

        for old in moved {
            let Some(mut nib) = self.nibs.remove(&(old, Role::Outgoing)) else {
                continue;
            };
            if !nib.federate().is_empty() {
                let mut farewell = nib.to_entity_state_pdu();
                farewell.appearance |= Appearance::DEACTIVATED;
                if let Err(e) = self.send_pdu(&Pdu::EntityState(farewell)) {
                    log::warn!("failed to send deactivation for {}: {}", old, e);
                }
            }

            let id = EntityId::new(current.0, current.1, old.entity);
            log::info!("entity {} now published as {}", old, id);
            nib.reassign(id);
            self.nibs.insert((id, Role::Outgoing), nib);
        }
    }

    pub fn site_id(&self) -> u16 {
        self.site
    }

    pub fn application_id(&self) -> u16 {
        self.application
    }

    pub fn exercise_id(&self) -> u8 {
        self.exercise
    }

    pub fn protocol_version(&self) -> u8 {
        self.protocol_version
    }

    pub fn set_protocol_version(&mut self, version: u8) -> Result<(), ConfigError> {
        if !(1..=MAX_PROTOCOL_VERSION).contains(&version) {
            log::warn!("rejecting protocol version {}", version);
            return Err(ConfigError::UnsupportedVersion(version));
        }
        self.protocol_version = version;
        Ok(())
    }

    /// `S<site>A<application>`, empty while either is unset.
    pub fn federate_name(&self) -> &str {
        &self.federate
    }

    /// `E<exercise>`, empty while unset.
    pub fn federation_name(&self) -> &str {
        &self.federation
    }

    // Configuration surface

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    pub fn thresholds_mut(&mut self) -> &mut ThresholdTable {
        &mut self.thresholds
    }

    pub fn emission_handlers(&self) -> &EmissionRegistry {
        &self.emission_handlers
    }

    pub fn emission_handlers_mut(&mut self) -> &mut EmissionRegistry {
        &mut self.emission_handlers
    }

    pub fn models_mut(&mut self) -> &mut DeadReckoningModels {
        &mut self.models
    }

    pub fn register_type(&mut self, mapping: TypeMapping) -> Result<(), RegisterError> {
        self.types.register_mapping(mapping)?;
        self.refresh_mappings();
        Ok(())
    }

    pub fn resolve_type(&self, code: &TypeCode) -> Option<&TypeMapping> {
        self.types.lookup(code)
    }

    fn refresh_mappings(&mut self) {
        for nib in self.nibs.values_mut() {
            nib.set_mapping(self.types.lookup(&nib.entity_type()).cloned());
        }
    }

    pub fn set_interest_center(&mut self, center: Option<DVec3>) {
        self.interest_center = center;
    }

    /// Receives PDUs of unrecognized types, header decoded and body in wire order.
    pub fn set_unknown_pdu_hook(&mut self, hook: impl FnMut(&PduHeader, &[u8]) + 'static) {
        self.unknown_hook = Some(Box::new(hook));
    }

    pub fn clear_unknown_pdu_hook(&mut self) {
        self.unknown_hook = None;
    }

    pub fn emission_queries(&self) -> Arc<QueryPool<EmissionQuery>> {
        Arc::clone(&self.queries)
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = NetEvent> + '_ {
        self.pending_events.drain(..)
    }

    // NIB access

    pub fn find_entity_block(
        &self,
        entity: u16,
        site: u16,
        application: u16,
        role: Role,
    ) -> Option<&Nib> {
        let federate = federate_name(site, application);
        if federate.is_empty() {
            return None;
        }
        self.nibs
            .get(&(EntityId::new(site, application, entity), role))
            .filter(|nib| nib.federate() == federate)
    }

    pub fn nibs(&self) -> impl Iterator<Item = &Nib> {
        self.nibs.values()
    }

    pub fn incoming(&self) -> impl Iterator<Item = &Nib> {
        self.nibs.values().filter(|nib| nib.role() == Role::Incoming)
    }

    pub fn nib_count(&self, role: Role) -> usize {
        self.nibs.values().filter(|nib| nib.role() == role).count()
    }

    // Publishing

    /// Creates the outgoing NIB for one of our entities, or returns the existing one.
    pub fn publish(&mut self, entity: u16, entity_type: TypeCode, initial: Kinematics) -> &mut Nib {
        let id = EntityId::new(self.site, self.application, entity);
        let types = &self.types;
        self.nibs.entry((id, Role::Outgoing)).or_insert_with(|| {
            log::info!("publishing entity {} as {}", id, entity_type);
            let mut nib = Nib::outgoing(id, entity_type, initial);
            nib.set_mapping(types.lookup(&entity_type).cloned());
            nib
        })
    }

    pub fn published_mut(&mut self, entity: u16) -> Option<&mut Nib> {
        let id = EntityId::new(self.site, self.application, entity);
        self.nibs.get_mut(&(id, Role::Outgoing))
    }

    pub fn update_true_state(&mut self, entity: u16, truth: Kinematics) -> bool {
        match self.published_mut(entity) {
            Some(nib) => {
                nib.update_from_true_state(truth);
                true
            }
            None => false,
        }
    }

    /// Sends a final deactivated entity state and forgets the entity.
    pub fn unpublish(&mut self, entity: u16) -> bool {
        let id = EntityId::new(self.site, self.application, entity);
        let Some(mut nib) = self.nibs.remove(&(id, Role::Outgoing)) else {
            return false;
        };

        nib.set_appearance(nib.appearance() | Appearance::DEACTIVATED);
        let pdu = Pdu::EntityState(nib.to_entity_state_pdu());
        if let Err(e) = self.send_pdu(&pdu) {
            log::warn!("failed to send deactivation for {}: {}", id, e);
        }
        log::info!("unpublished entity {}", id);
        true
    }

    // Tick

    /// Runs one simulation step: inbound, dead reckoning, staleness, queued emissions,
    /// then outbound.
    pub fn tick(&mut self, dt: Duration) {
        self.receive_and_dispatch();
        self.extrapolate_incoming(dt);
        self.sweep_stale(dt);
        self.process_emission_queries();
        self.evaluate_outgoing(dt);
    }

    /// Drains up to `MAX_DATAGRAMS_PER_TICK` datagrams; returns the number of PDUs dispatched.
    pub fn receive_and_dispatch(&mut self) -> usize {
        let mut buffer = std::mem::take(&mut self.recv_buffer);
        let mut dispatched = 0;

        for _ in 0..MAX_DATAGRAMS_PER_TICK {
            let Some(size) = self.transport.receive(&mut buffer) else {
                break;
            };
            self.stats.datagrams_received += 1;
            self.stats.bytes_received += size as u64;
            dispatched += self.handle_datagram(&buffer[..size]);
        }

        self.recv_buffer = buffer;
        dispatched
    }

    fn handle_datagram(&mut self, datagram: &[u8]) -> usize {
        let mut dispatched = 0;
        for frame in frames(datagram) {
            match frame {
                Ok((header, pdu)) => {
                    if self.handle_pdu(header, pdu) {
                        dispatched += 1;
                    }
                }
                Err(e) => {
                    self.stats.dropped_malformed += 1;
                    log::trace!("dropping rest of datagram: {}", e);
                    break;
                }
            }
        }
        dispatched
    }

    fn handle_pdu(&mut self, header: PduHeader, pdu: &[u8]) -> bool {
        if self.exercise != 0 && header.exercise != self.exercise {
            self.stats.dropped_exercise += 1;
            log::trace!("dropping pdu for exercise {}", header.exercise);
            return false;
        }

        // only known layouts are guaranteed to lead with the originating entity
        if header.kind().is_some() && originator(pdu) == Some((self.site, self.application)) {
            self.stats.dropped_self += 1;
            log::trace!("dropping own pdu type {}", header.pdu_type);
            return false;
        }

        let body = &pdu[HEADER_LEN..];
        if header.kind().is_none() {
            self.handle_unknown(header, body);
            return true;
        }

        match Pdu::decode(&header, body) {
            Ok(decoded) => {
                self.stats.pdus_decoded += 1;
                self.dispatch(header, decoded);
                true
            }
            Err(e) => {
                self.stats.dropped_malformed += 1;
                log::trace!("dropping malformed pdu type {}: {}", header.pdu_type, e);
                false
            }
        }
    }

    fn handle_unknown(&mut self, header: PduHeader, body: &[u8]) {
        self.stats.unrecognized += 1;
        match self.unknown_hook.as_mut() {
            Some(hook) => hook(&header, body),
            None => {
                log::debug!(
                    "unrecognized pdu type {} family {}",
                    header.pdu_type,
                    header.family
                );
                self.pending_events.push_back(NetEvent::Unrecognized {
                    header,
                    body: Bytes::copy_from_slice(body),
                });
            }
        }
    }

    fn dispatch(&mut self, header: PduHeader, pdu: Pdu) {
        let event = match pdu {
            Pdu::EntityState(pdu) => return self.handle_entity_state(pdu),
            Pdu::Fire(pdu) => NetEvent::Fire(pdu),
            Pdu::Detonation(pdu) => NetEvent::Detonation(pdu),
            Pdu::Signal(pdu) => NetEvent::Signal(pdu),
            Pdu::Transmitter(pdu) => NetEvent::Transmitter(pdu),
            Pdu::Emission(pdu) => {
                let handlers = pdu
                    .systems
                    .iter()
                    .map(|system| self.emission_handlers.find_for_remote_system(system))
                    .collect();
                NetEvent::Emission { pdu, handlers }
            }
            Pdu::DataQuery(pdu) => NetEvent::DataQuery(pdu),
            Pdu::Data(pdu) => NetEvent::Data(pdu),
            Pdu::Comment(pdu) => NetEvent::Comment(pdu),
            Pdu::Start(pdu) => NetEvent::Start(pdu),
            Pdu::Stop(pdu) => NetEvent::Stop(pdu),
            Pdu::Acknowledge(pdu) => NetEvent::Acknowledge(pdu),
            Pdu::ActionRequest(pdu) => NetEvent::ActionRequest(pdu),
            Pdu::ActionResponse(pdu) => NetEvent::ActionResponse(pdu),
            Pdu::ActionRequestReliable(pdu) => NetEvent::ActionRequestReliable(pdu),
            Pdu::ActionResponseReliable(pdu) => NetEvent::ActionResponseReliable(pdu),
            Pdu::Other { body, .. } => return self.handle_unknown(header, &body),
        };
        self.pending_events.push_back(event);
    }

    fn handle_entity_state(&mut self, pdu: EntityStatePdu) {
        let id = pdu.entity_id;
        let key = (id, Role::Incoming);

        if pdu.appearance.contains(Appearance::DEACTIVATED) {
            if self.nibs.remove(&key).is_some() {
                log::info!("entity {} deactivated", id);
                self.pending_events.push_back(NetEvent::EntityRemoved {
                    id,
                    reason: RemovalReason::Deactivated,
                });
            }
            return;
        }

        if let Some(nib) = self.nibs.get_mut(&key) {
            let retyped = nib.entity_type() != pdu.entity_type;
            nib.apply_incoming_update(&pdu);
            if retyped {
                nib.set_mapping(self.types.lookup(&pdu.entity_type).cloned());
            }
            self.pending_events.push_back(NetEvent::EntityUpdated { id });
            return;
        }

        if let Some(center) = self.interest_center {
            let thresholds = self.thresholds.get(pdu.entity_type.kind, pdu.entity_type.domain);
            if center.distance_squared(pdu.location) > thresholds.max_range_sq() {
                self.stats.filtered_range += 1;
                log::trace!("ignoring out of range entity {}", id);
                return;
            }
        }

        let mut nib = Nib::incoming(&pdu);
        let mapping = self.types.lookup(&pdu.entity_type).cloned();
        let untyped = mapping.is_none();
        if untyped {
            log::debug!("entity {} has unmapped type {}", id, pdu.entity_type);
        }
        nib.set_mapping(mapping);
        self.nibs.insert(key, nib);

        log::debug!("discovered entity {} from {}", id, federate_name(id.site, id.application));
        self.pending_events.push_back(NetEvent::EntityDiscovered {
            id,
            entity_type: pdu.entity_type,
            untyped,
        });
    }

    /// Transmits every outgoing entity whose heartbeat or error thresholds were crossed.
    /// Returns the number sent.
    pub fn evaluate_outgoing(&mut self, dt: Duration) -> usize {
        let mut due = Vec::new();
        for nib in self.nibs.values_mut() {
            if nib.role() != Role::Outgoing {
                continue;
            }
            let code = nib.entity_type();
            let thresholds = self.thresholds.get(code.kind, code.domain);
            if nib.should_transmit(thresholds, dt, &self.models) {
                due.push(nib.id());
            }
        }

        due.into_iter()
            .filter(|&id| self.transmit_entity(id))
            .count()
    }

    fn transmit_entity(&mut self, id: EntityId) -> bool {
        let key = (id, Role::Outgoing);
        let Some(nib) = self.nibs.get(&key) else {
            return false;
        };
        let pdu = Pdu::EntityState(nib.to_entity_state_pdu());

        match self.send_pdu(&pdu) {
            Ok(()) => {
                if let Some(nib) = self.nibs.get_mut(&key) {
                    nib.mark_sent();
                }
                true
            }
            Err(e) => {
                log::warn!("failed to send entity state for {}: {}", id, e);
                false
            }
        }
    }

    pub fn extrapolate_incoming(&mut self, dt: Duration) {
        for nib in self.nibs.values_mut() {
            if nib.role() == Role::Incoming {
                nib.extrapolate(dt, &self.models);
            }
        }
    }

    /// Ages incoming NIBs by `dt` and removes those past their class's max age.
    pub fn sweep_stale(&mut self, dt: Duration) -> usize {
        let thresholds = &self.thresholds;
        let stale: Vec<EntityId> = self
            .nibs
            .values_mut()
            .filter(|nib| nib.role() == Role::Incoming)
            .filter_map(|nib| {
                nib.age(dt);
                let code = nib.entity_type();
                nib.is_stale(thresholds.get(code.kind, code.domain))
                    .then(|| nib.id())
            })
            .collect();

        for &id in &stale {
            self.nibs.remove(&(id, Role::Incoming));
            log::info!("entity {} timed out", id);
            self.pending_events.push_back(NetEvent::EntityRemoved {
                id,
                reason: RemovalReason::Stale,
            });
        }
        stale.len()
    }

    /// Turns queued sensor requests into emission PDUs. Returns the number sent.
    pub fn process_emission_queries(&mut self) -> usize {
        let queries = Arc::clone(&self.queries);
        let mut sent = 0;
        while let Some(query) = queries.next() {
            if self.emit_for_query(&query) {
                sent += 1;
            }
            queries.release(query);
        }
        sent
    }

    fn emit_for_query(&mut self, query: &EmissionQuery) -> bool {
        if !self.nibs.contains_key(&(query.entity, Role::Outgoing)) {
            log::debug!("emission query for unpublished entity {}", query.entity);
            return false;
        }
        let Some(index) = self.emission_handlers.find_for_local_sensor(&query.system) else {
            log::trace!("no emission handler for system {:?}", query.system);
            return false;
        };
        let Some(handler) = self.emission_handlers.get(index) else {
            return false;
        };

        let beam = Beam {
            beam_id: 1,
            parameter_index: index as u16,
            parameters: handler.beam_parameters(),
            function: query.system.function,
            high_density_track: false,
            jamming_mode: 0,
            targets: query
                .targets
                .iter()
                .map(|&entity| TrackJamTarget {
                    entity,
                    emitter_id: 0,
                    beam_id: 0,
                })
                .collect(),
        };
        let pdu = Pdu::Emission(EmissionPdu {
            emitting_entity: query.entity,
            event: self.next_event_id(),
            state_update: 0,
            systems: vec![EmitterSystem {
                system_type: query.system,
                id_number: query.emitter_number,
                location: query.location,
                beams: vec![beam],
            }],
        });

        match self.send_pdu(&pdu) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("failed to send emission for {}: {}", query.entity, e);
                false
            }
        }
    }

    fn next_event_id(&mut self) -> EventId {
        let event = self.next_event;
        self.next_event = self.next_event.checked_add(1).unwrap_or(1);
        EventId::new(self.site, self.application, event)
    }

    /// Encodes with our version, exercise and the current relative timestamp, then sends.
    pub fn send_pdu(&mut self, pdu: &Pdu) -> Result<(), SendError> {
        let result = pdu
            .encode(self.protocol_version, self.exercise, Timestamp::now(false))
            .map_err(SendError::from)
            .and_then(|bytes| {
                self.transport.send(&bytes)?;
                Ok(bytes.len())
            });

        match result {
            Ok(len) => {
                self.stats.pdus_sent += 1;
                self.stats.bytes_sent += len as u64;
                Ok(())
            }
            Err(e) => {
                self.stats.send_failures += 1;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::transport::MemoryTransport;

    fn engine() -> ProtocolEngine<MemoryTransport> {
        let (transport, _) = MemoryTransport::pair();
        ProtocolEngine::new(transport)
    }

    #[test]
    fn names_follow_identity() {
        let mut engine = engine();
        assert_eq!(engine.federate_name(), "");
        assert_eq!(engine.federation_name(), "");

        engine.set_site_id(1).unwrap();
        assert_eq!(engine.federate_name(), "");
        engine.set_application_id(2).unwrap();
        assert_eq!(engine.federate_name(), "S1A2");
        engine.set_exercise_id(7).unwrap();
        assert_eq!(engine.federation_name(), "E7");

        engine.set_site_id(0).unwrap();
        assert_eq!(engine.federate_name(), "");
        engine.set_exercise_id(0).unwrap();
        assert_eq!(engine.federation_name(), "");
    }

    #[test]
    fn out_of_range_identity_keeps_previous() {
        let mut engine = engine();
        engine.set_site_id(5).unwrap();
        engine.set_application_id(6).unwrap();
        engine.set_exercise_id(9).unwrap();

        assert!(matches!(
            engine.set_site_id(65536),
            Err(ConfigError::SiteOutOfRange(65536))
        ));
        assert!(engine.set_application_id(100_000).is_err());
        assert!(engine.set_exercise_id(256).is_err());

        assert_eq!(engine.site_id(), 5);
        assert_eq!(engine.application_id(), 6);
        assert_eq!(engine.exercise_id(), 9);
        assert_eq!(engine.federate_name(), "S5A6");
        assert_eq!(engine.federation_name(), "E9");
    }

    #[test]
    fn rejected_config_changes_nothing() {
        let mut engine = engine();
        engine.set_site_id(3).unwrap();
        let config = EngineConfig {
            site: 1,
            application: 70000,
            ..Default::default()
        };
        assert!(engine.apply_config(&config).is_err());
        assert_eq!(engine.site_id(), 3);
    }

    #[test]
    fn protocol_version_outside_range_keeps_previous() {
        let mut engine = engine();
        engine.set_protocol_version(7).unwrap();
        assert!(matches!(
            engine.set_protocol_version(0),
            Err(ConfigError::UnsupportedVersion(0))
        ));
        assert!(engine.set_protocol_version(8).is_err());
        assert_eq!(engine.protocol_version(), 7);

        let config = EngineConfig {
            protocol_version: 0,
            ..Default::default()
        };
        assert!(matches!(
            engine.apply_config(&config),
            Err(ConfigError::UnsupportedVersion(0))
        ));
        assert_eq!(engine.protocol_version(), 7);

        let (transport, _) = MemoryTransport::pair();
        assert!(ProtocolEngine::with_config(transport, &config).is_err());
    }

    #[test]
    fn identity_change_rekeys_published_entities() {
        let mut engine = engine();
        engine.set_site_id(1).unwrap();
        engine.set_application_id(2).unwrap();
        engine.publish(5, TypeCode::default(), Kinematics::default());
        engine.evaluate_outgoing(Duration::ZERO);

        engine.set_site_id(3).unwrap();
        assert_eq!(engine.nib_count(Role::Outgoing), 1);
        assert!(engine.find_entity_block(5, 1, 2, Role::Outgoing).is_none());
        let nib = engine.find_entity_block(5, 3, 2, Role::Outgoing).unwrap();
        assert_eq!(nib.id(), EntityId::new(3, 2, 5));
        assert_eq!(nib.federate(), "S3A2");

        engine.set_application_id(4).unwrap();
        assert!(engine.update_true_state(5, Kinematics::at(DVec3::new(1.0, 0.0, 0.0))));
        assert!(engine.find_entity_block(5, 3, 4, Role::Outgoing).is_some());
        assert!(engine.unpublish(5));
        assert_eq!(engine.nib_count(Role::Outgoing), 0);
    }

    #[test]
    fn find_entity_block_requires_identity() {
        let mut engine = engine();
        engine.set_site_id(1).unwrap();
        engine.set_application_id(2).unwrap();
        engine.publish(5, TypeCode::default(), Kinematics::default());

        assert!(engine.find_entity_block(5, 1, 2, Role::Outgoing).is_some());
        assert!(engine.find_entity_block(5, 1, 2, Role::Incoming).is_none());
        assert!(engine.find_entity_block(6, 1, 2, Role::Outgoing).is_none());
        assert!(engine.find_entity_block(5, 0, 2, Role::Outgoing).is_none());
    }

    #[test]
    fn publish_is_idempotent() {
        let mut engine = engine();
        engine.set_site_id(1).unwrap();
        engine.set_application_id(2).unwrap();
        engine.publish(5, TypeCode::default(), Kinematics::default());
        engine.publish(5, TypeCode::new(9, 9, 9, 9, 0, 0, 0), Kinematics::default());
        assert_eq!(engine.nib_count(Role::Outgoing), 1);
        assert_eq!(
            engine
                .find_entity_block(5, 1, 2, Role::Outgoing)
                .map(|nib| nib.entity_type()),
            Some(TypeCode::default())
        );
    }

    #[test]
    fn event_ids_wrap_past_zero() {
        let mut engine = engine();
        engine.next_event = u16::MAX;
        assert_eq!(engine.next_event_id().event, u16::MAX);
        assert_eq!(engine.next_event_id().event, 1);
    }
}
