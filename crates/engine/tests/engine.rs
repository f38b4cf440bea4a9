use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use disnet::pdu::{
    frames, Appearance, CommentPdu, Datums, EmitterSystemType, FirePdu, SimanHeader,
    DEFAULT_PROTOCOL_VERSION, HEADER_LEN,
};
use disnet::{
    EmissionHandler, EngineConfig, EntityId, EntityStatePdu, Kinematics, MemoryTransport,
    NetEvent, Pdu, ProtocolEngine, RemovalReason, Role, Timestamp, Transport, TransportError,
    TypeCode, TypeMapping,
};
use glam::{DVec3, Vec3};

const FIGHTER: TypeCode = TypeCode::new(1, 2, 225, 1, 3, 0, 0);

fn configured() -> (ProtocolEngine<MemoryTransport>, MemoryTransport) {
    let (local, peer) = MemoryTransport::pair();
    let mut engine = ProtocolEngine::new(local);
    engine.set_site_id(1).unwrap();
    engine.set_application_id(2).unwrap();
    engine.set_exercise_id(7).unwrap();
    (engine, peer)
}

fn entity_state(id: EntityId, exercise: u8) -> Vec<u8> {
    let mut pdu = EntityStatePdu::new(id, FIGHTER);
    pdu.location = DVec3::new(100.0, 200.0, 300.0);
    pdu.linear_velocity = Vec3::new(10.0, 0.0, 0.0);
    pdu.dead_reckoning.algorithm = 2;
    encode(Pdu::EntityState(pdu), exercise)
}

fn encode(pdu: Pdu, exercise: u8) -> Vec<u8> {
    pdu.encode(DEFAULT_PROTOCOL_VERSION, exercise, Timestamp(0))
        .unwrap()
        .to_vec()
}

fn drain(peer: &mut MemoryTransport) -> Vec<Pdu> {
    let mut buf = vec![0u8; 65536];
    let mut out = Vec::new();
    while let Some(size) = peer.receive(&mut buf) {
        for frame in frames(&buf[..size]) {
            let (header, pdu) = frame.unwrap();
            out.push(Pdu::decode(&header, &pdu[HEADER_LEN..]).unwrap());
        }
    }
    out
}

#[test]
fn test_peer_entity_creates_one_nib() {
    let (mut engine, _peer) = configured();
    engine.transport().inject(entity_state(EntityId::new(9, 9, 1), 7));

    assert_eq!(engine.receive_and_dispatch(), 1);
    assert_eq!(engine.nib_count(Role::Incoming), 1);
    let nib = engine.find_entity_block(1, 9, 9, Role::Incoming).unwrap();
    assert_eq!(nib.federate(), "S9A9");
    assert_eq!(nib.kinematics().position, DVec3::new(100.0, 200.0, 300.0));

    let events: Vec<_> = engine.drain_events().collect();
    assert_eq!(
        events,
        vec![NetEvent::EntityDiscovered {
            id: EntityId::new(9, 9, 1),
            entity_type: FIGHTER,
            untyped: true,
        }]
    );
}

#[test]
fn test_own_broadcast_is_ignored() {
    let (mut engine, _peer) = configured();
    engine.transport().inject(entity_state(EntityId::new(1, 2, 1), 7));

    assert_eq!(engine.receive_and_dispatch(), 0);
    assert_eq!(engine.nib_count(Role::Incoming), 0);
    assert_eq!(engine.stats().dropped_self, 1);
    assert_eq!(engine.drain_events().count(), 0);
}

#[test]
fn test_other_exercise_is_dropped() {
    let (mut engine, _peer) = configured();
    engine.transport().inject(entity_state(EntityId::new(9, 9, 1), 3));

    assert_eq!(engine.receive_and_dispatch(), 0);
    assert_eq!(engine.nib_count(Role::Incoming), 0);
    assert_eq!(engine.stats().dropped_exercise, 1);
    assert_eq!(engine.drain_events().count(), 0);
}

#[test]
fn test_unset_exercise_accepts_all() {
    let (local, _peer) = MemoryTransport::pair();
    let mut engine = ProtocolEngine::new(local);
    engine.transport().inject(entity_state(EntityId::new(9, 9, 1), 3));
    engine.transport().inject(entity_state(EntityId::new(9, 9, 2), 200));

    assert_eq!(engine.receive_and_dispatch(), 2);
    assert_eq!(engine.nib_count(Role::Incoming), 2);
}

#[test]
fn test_repeat_update_refreshes_existing_nib() {
    let (mut engine, _peer) = configured();
    engine.transport().inject(entity_state(EntityId::new(9, 9, 1), 7));
    engine.receive_and_dispatch();
    engine.sweep_stale(Duration::from_secs(10));

    engine.transport().inject(entity_state(EntityId::new(9, 9, 1), 7));
    engine.receive_and_dispatch();
    assert_eq!(engine.nib_count(Role::Incoming), 1);

    let nib = engine.find_entity_block(1, 9, 9, Role::Incoming).unwrap();
    assert_eq!(nib.since_update(), Duration::ZERO);

    let events: Vec<_> = engine.drain_events().collect();
    assert!(matches!(events[1], NetEvent::EntityUpdated { .. }));
}

#[test]
fn test_stale_entity_removed_on_sweep() {
    let (mut engine, _peer) = configured();
    engine.transport().inject(entity_state(EntityId::new(9, 9, 1), 7));
    engine.receive_and_dispatch();
    engine.drain_events().for_each(drop);

    assert_eq!(engine.sweep_stale(Duration::from_secs(11)), 0);
    assert_eq!(engine.sweep_stale(Duration::from_secs(1)), 1);
    assert_eq!(engine.nib_count(Role::Incoming), 0);

    let events: Vec<_> = engine.drain_events().collect();
    assert_eq!(
        events,
        vec![NetEvent::EntityRemoved {
            id: EntityId::new(9, 9, 1),
            reason: RemovalReason::Stale,
        }]
    );
}

#[test]
fn test_deactivated_entity_removed() {
    let (mut engine, _peer) = configured();
    engine.transport().inject(entity_state(EntityId::new(9, 9, 1), 7));
    engine.receive_and_dispatch();

    let mut pdu = EntityStatePdu::new(EntityId::new(9, 9, 1), FIGHTER);
    pdu.appearance = Appearance::DEACTIVATED;
    engine.transport().inject(encode(Pdu::EntityState(pdu), 7));
    engine.receive_and_dispatch();

    assert_eq!(engine.nib_count(Role::Incoming), 0);
    let last = engine.drain_events().last().unwrap();
    assert_eq!(
        last,
        NetEvent::EntityRemoved {
            id: EntityId::new(9, 9, 1),
            reason: RemovalReason::Deactivated,
        }
    );
}

#[test]
fn test_incoming_entity_is_dead_reckoned() {
    let (mut engine, _peer) = configured();
    engine.transport().inject(entity_state(EntityId::new(9, 9, 1), 7));
    engine.tick(Duration::from_millis(500));
    engine.tick(Duration::from_millis(500));

    let nib = engine.find_entity_block(1, 9, 9, Role::Incoming).unwrap();
    let position = nib.kinematics().position;
    assert!((position.x - 110.0).abs() < 1e-3);
    assert_eq!(nib.last_received().position.x, 100.0);
}

#[test]
fn test_registered_type_resolves() {
    let (mut engine, _peer) = configured();
    engine
        .register_type(TypeMapping::new(TypeCode::new(1, 2, 0, 1, 0, 0, 0), "fighter"))
        .unwrap();
    assert!(engine
        .register_type(TypeMapping::new(TypeCode::new(1, 2, 0, 1, 0, 0, 0), "again"))
        .is_err());

    engine.transport().inject(entity_state(EntityId::new(9, 9, 1), 7));
    engine.receive_and_dispatch();

    let nib = engine.find_entity_block(1, 9, 9, Role::Incoming).unwrap();
    assert!(!nib.is_untyped());
    assert_eq!(nib.mapping().unwrap().name, "fighter");
}

#[test]
fn test_bundled_pdus_dispatched_in_order() {
    let (mut engine, _peer) = configured();
    let mut datagram = entity_state(EntityId::new(9, 9, 1), 7);
    datagram.extend(encode(
        Pdu::Fire(FirePdu {
            firing_entity: EntityId::new(9, 9, 1),
            ..Default::default()
        }),
        7,
    ));
    datagram.extend([0xFF; 5]);
    engine.transport().inject(datagram);

    assert_eq!(engine.receive_and_dispatch(), 2);
    let events: Vec<_> = engine.drain_events().collect();
    assert!(matches!(events[0], NetEvent::EntityDiscovered { .. }));
    assert!(matches!(events[1], NetEvent::Fire(_)));
    assert_eq!(engine.stats().dropped_malformed, 1);
}

#[test]
fn test_truncated_pdu_is_dropped_quietly() {
    let (mut engine, _peer) = configured();
    let mut datagram = entity_state(EntityId::new(9, 9, 1), 7);
    // header says 144, body cut short; patch the length so framing still succeeds
    datagram.truncate(60);
    datagram[8..10].copy_from_slice(&60u16.to_be_bytes());
    engine.transport().inject(datagram);

    assert_eq!(engine.receive_and_dispatch(), 0);
    assert_eq!(engine.stats().dropped_malformed, 1);
    assert_eq!(engine.nib_count(Role::Incoming), 0);
}

#[test]
fn test_unknown_type_goes_to_hook_in_wire_order() {
    let (mut engine, _peer) = configured();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    engine.set_unknown_pdu_hook(move |header, body| {
        sink.borrow_mut().push((header.pdu_type, body.to_vec()));
    });

    let raw = Pdu::Other {
        pdu_type: 250,
        family: 129,
        body: bytes::Bytes::from_static(&[0, 9, 0, 9, 0x12, 0x34]),
    };
    engine.transport().inject(encode(raw, 7));
    engine.receive_and_dispatch();

    assert_eq!(
        seen.borrow().as_slice(),
        &[(250u8, vec![0, 9, 0, 9, 0x12, 0x34])]
    );
    assert_eq!(engine.drain_events().count(), 0);
    assert_eq!(engine.stats().unrecognized, 1);
}

#[test]
fn test_unknown_type_with_our_ids_still_reaches_hook() {
    let (mut engine, _peer) = configured();
    let seen = Rc::new(Cell::new(0));
    let sink = Rc::clone(&seen);
    engine.set_unknown_pdu_hook(move |_, _| sink.set(sink.get() + 1));

    // body happens to start with site 1, application 2
    let raw = Pdu::Other {
        pdu_type: 250,
        family: 129,
        body: bytes::Bytes::from_static(&[0, 1, 0, 2, 0, 5]),
    };
    engine.transport().inject(encode(raw, 7));
    engine.receive_and_dispatch();

    assert_eq!(seen.get(), 1);
    assert_eq!(engine.stats().dropped_self, 0);
}

#[test]
fn test_unknown_type_without_hook_becomes_event() {
    let (mut engine, _peer) = configured();
    let raw = Pdu::Other {
        pdu_type: 250,
        family: 129,
        body: bytes::Bytes::from_static(&[0, 9, 0, 9]),
    };
    engine.transport().inject(encode(raw, 7));
    engine.receive_and_dispatch();

    match engine.drain_events().next() {
        Some(NetEvent::Unrecognized { header, body }) => {
            assert_eq!(header.pdu_type, 250);
            assert_eq!(&body[..], &[0, 9, 0, 9]);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_simulation_management_surfaces_as_event() {
    let (mut engine, _peer) = configured();
    let comment = CommentPdu {
        header: SimanHeader {
            originating: EntityId::new(9, 9, 0),
            receiving: EntityId::new(0xFFFF, 0xFFFF, 0xFFFF),
        },
        datums: Datums::default(),
    };
    engine.transport().inject(encode(Pdu::Comment(comment.clone()), 7));
    engine.receive_and_dispatch();

    assert_eq!(engine.drain_events().next(), Some(NetEvent::Comment(comment)));
}

#[test]
fn test_interest_range_filters_new_entities() {
    let config = EngineConfig::from_toml_str(
        "site = 1\napplication = 2\nexercise = 7\n[thresholds.K1D2]\nmax_range = 100.0\n",
    )
    .unwrap();
    let (local, _peer) = MemoryTransport::pair();
    let mut engine = ProtocolEngine::with_config(local, &config).unwrap();
    engine.set_interest_center(Some(DVec3::ZERO));

    // entity_state() places the entity about 374m from the origin
    engine.transport().inject(entity_state(EntityId::new(9, 9, 1), 7));
    engine.receive_and_dispatch();
    assert_eq!(engine.nib_count(Role::Incoming), 0);
    assert_eq!(engine.stats().filtered_range, 1);

    engine.set_interest_center(Some(DVec3::new(100.0, 200.0, 250.0)));
    engine.transport().inject(entity_state(EntityId::new(9, 9, 1), 7));
    engine.receive_and_dispatch();
    assert_eq!(engine.nib_count(Role::Incoming), 1);
}

#[test]
fn test_outgoing_entity_transmits_on_schedule() {
    let (mut engine, mut peer) = configured();
    engine
        .publish(5, FIGHTER, Kinematics::at(DVec3::new(1.0, 2.0, 3.0)))
        .set_algorithm(1);

    assert_eq!(engine.evaluate_outgoing(Duration::ZERO), 1);
    let sent = drain(&mut peer);
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Pdu::EntityState(pdu) => {
            assert_eq!(pdu.entity_id, EntityId::new(1, 2, 5));
            assert_eq!(pdu.location, DVec3::new(1.0, 2.0, 3.0));
        }
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(engine.evaluate_outgoing(Duration::from_millis(4900)), 0);
    assert_eq!(engine.evaluate_outgoing(Duration::from_millis(100)), 1);

    engine.update_true_state(5, Kinematics::at(DVec3::new(10.0, 2.0, 3.0)));
    assert_eq!(engine.evaluate_outgoing(Duration::from_millis(100)), 1);
    assert_eq!(engine.stats().pdus_sent, 3);
}

#[test]
fn test_unpublish_sends_deactivation() {
    let (mut engine, mut peer) = configured();
    engine.publish(5, FIGHTER, Kinematics::default());
    engine.evaluate_outgoing(Duration::ZERO);
    drain(&mut peer);

    assert!(engine.unpublish(5));
    assert!(!engine.unpublish(5));
    let sent = drain(&mut peer);
    match sent.as_slice() {
        [Pdu::EntityState(pdu)] => assert!(pdu.appearance.contains(Appearance::DEACTIVATED)),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(engine.nib_count(Role::Outgoing), 0);
}

#[test]
fn test_site_change_moves_published_entity() {
    let (mut engine, mut peer) = configured();
    engine.publish(5, FIGHTER, Kinematics::default());
    engine.evaluate_outgoing(Duration::ZERO);
    drain(&mut peer);

    engine.set_site_id(3).unwrap();
    match drain(&mut peer).as_slice() {
        [Pdu::EntityState(pdu)] => {
            assert_eq!(pdu.entity_id, EntityId::new(1, 2, 5));
            assert!(pdu.appearance.contains(Appearance::DEACTIVATED));
        }
        other => panic!("unexpected {:?}", other),
    }

    assert_eq!(engine.evaluate_outgoing(Duration::ZERO), 1);
    match drain(&mut peer).as_slice() {
        [Pdu::EntityState(pdu)] => {
            assert_eq!(pdu.entity_id, EntityId::new(3, 2, 5));
            assert!(!pdu.appearance.contains(Appearance::DEACTIVATED));
        }
        other => panic!("unexpected {:?}", other),
    }

    // our own broadcasts under the new identity are still suppressed
    engine.transport().inject(entity_state(EntityId::new(3, 2, 5), 7));
    assert_eq!(engine.receive_and_dispatch(), 0);
    assert_eq!(engine.stats().dropped_self, 1);
}

struct FlakyTransport {
    inner: MemoryTransport,
    failing: Rc<Cell<bool>>,
}

impl Transport for FlakyTransport {
    fn receive(&mut self, buf: &mut [u8]) -> Option<usize> {
        self.inner.receive(buf)
    }

    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        if self.failing.get() {
            return Err(TransportError::Closed);
        }
        self.inner.send(buf)
    }
}

#[test]
fn test_failed_send_retried_next_tick() {
    let (local, mut peer) = MemoryTransport::pair();
    let failing = Rc::new(Cell::new(true));
    let mut engine = ProtocolEngine::new(FlakyTransport {
        inner: local,
        failing: Rc::clone(&failing),
    });
    engine.set_site_id(1).unwrap();
    engine.set_application_id(2).unwrap();
    engine.publish(5, FIGHTER, Kinematics::default());

    assert_eq!(engine.evaluate_outgoing(Duration::ZERO), 0);
    assert_eq!(engine.stats().send_failures, 1);
    assert_eq!(engine.stats().pdus_sent, 0);
    assert!(engine.find_entity_block(5, 1, 2, Role::Outgoing).is_some());
    assert!(drain(&mut peer).is_empty());

    failing.set(false);
    assert_eq!(engine.evaluate_outgoing(Duration::from_millis(100)), 1);
    assert_eq!(engine.stats().pdus_sent, 1);
    assert_eq!(drain(&mut peer).len(), 1);

    // once delivered, the entity waits for its next heartbeat
    assert_eq!(engine.evaluate_outgoing(Duration::from_millis(100)), 0);
    assert_eq!(engine.stats().send_failures, 1);
}

#[test]
fn test_two_engines_synchronize() {
    let (a_end, b_end) = MemoryTransport::pair();
    let mut a = ProtocolEngine::new(a_end);
    a.set_site_id(1).unwrap();
    a.set_application_id(2).unwrap();
    let mut b = ProtocolEngine::new(b_end);
    b.set_site_id(3).unwrap();
    b.set_application_id(4).unwrap();

    let moving = Kinematics {
        linear_velocity: Vec3::new(0.0, 20.0, 0.0),
        ..Kinematics::default()
    };
    a.publish(1, FIGHTER, moving);

    a.tick(Duration::from_millis(100));
    b.tick(Duration::from_millis(100));
    assert!(b.find_entity_block(1, 1, 2, Role::Incoming).is_some());

    b.tick(Duration::from_secs(1));
    let nib = b.find_entity_block(1, 1, 2, Role::Incoming).unwrap();
    // discovered one 100ms tick before the 1s tick
    assert!((nib.kinematics().position.y - 22.0).abs() < 1e-3);

    a.unpublish(1);
    b.tick(Duration::from_millis(100));
    assert_eq!(b.nib_count(Role::Incoming), 0);
}

#[test]
fn test_emission_query_becomes_pdu() {
    let (mut engine, mut peer) = configured();
    engine
        .emission_handlers_mut()
        .register(EmissionHandler::new("search").matching(1505, 2))
        .unwrap();
    engine.publish(5, FIGHTER, Kinematics::default());
    engine.evaluate_outgoing(Duration::ZERO);
    drain(&mut peer);

    let pool = engine.emission_queries();
    let producer = std::thread::spawn({
        let pool = pool.clone();
        move || {
            let mut query = pool.acquire();
            query.entity = EntityId::new(1, 2, 5);
            query.system = EmitterSystemType {
                name: 1505,
                function: 2,
            };
            query.targets.push(EntityId::new(9, 9, 1));
            pool.submit(query);

            let mut unmatched = pool.acquire();
            unmatched.entity = EntityId::new(1, 2, 5);
            unmatched.system = EmitterSystemType {
                name: 77,
                function: 1,
            };
            pool.submit(unmatched);
        }
    });
    producer.join().unwrap();

    assert_eq!(engine.process_emission_queries(), 1);
    assert_eq!(pool.pending(), 0);
    assert_eq!(pool.available(), 2);

    let sent = drain(&mut peer);
    match sent.as_slice() {
        [Pdu::Emission(pdu)] => {
            assert_eq!(pdu.emitting_entity, EntityId::new(1, 2, 5));
            assert_eq!(pdu.systems[0].beams[0].targets[0].entity, EntityId::new(9, 9, 1));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_remote_emission_matched_to_handler() {
    let (mut a_end, b_end) = MemoryTransport::pair();
    let mut receiver = ProtocolEngine::new(b_end);
    receiver
        .emission_handlers_mut()
        .register(EmissionHandler::new("rx").default_incoming())
        .unwrap();

    let pdu = disnet::pdu::EmissionPdu {
        emitting_entity: EntityId::new(9, 9, 1),
        systems: vec![Default::default(), Default::default()],
        ..Default::default()
    };
    a_end.send(&encode(Pdu::Emission(pdu), 0)).unwrap();
    receiver.receive_and_dispatch();

    match receiver.drain_events().next() {
        Some(NetEvent::Emission { handlers, .. }) => assert_eq!(handlers, vec![Some(0), Some(0)]),
        other => panic!("unexpected {:?}", other),
    }
}
