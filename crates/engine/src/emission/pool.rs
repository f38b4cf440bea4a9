use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use glam::Vec3;

use crate::pdu::EmitterSystemType;
use crate::types::EntityId;

/// Clears a pooled value before it goes back on the free stack.
pub trait Reset {
    fn reset(&mut self);
}

/// A sensor's request to radiate, produced off the tick thread.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmissionQuery {
    pub entity: EntityId,
    pub system: EmitterSystemType,
    pub emitter_number: u8,
    pub location: Vec3,
    pub targets: Vec<EntityId>,
}

impl Reset for EmissionQuery {
    fn reset(&mut self) {
        self.entity = EntityId::default();
        self.system = EmitterSystemType::default();
        self.emitter_number = 0;
        self.location = Vec3::ZERO;
        self.targets.clear();
    }
}

/// Free stack plus in-use queue, each under its own lock.
///
/// Values move between the two by ownership; nothing is processed while a lock is held.
#[derive(Debug, Default)]
pub struct QueryPool<T> {
    free: Mutex<Vec<T>>,
    in_use: Mutex<VecDeque<T>>,
}

// A panicking producer cannot leave a Vec or VecDeque half-updated.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Default + Reset> QueryPool<T> {
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            in_use: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let free = (0..capacity).map(|_| T::default()).collect();
        Self {
            free: Mutex::new(free),
            in_use: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn acquire(&self) -> T {
        lock(&self.free).pop().unwrap_or_default()
    }

    pub fn submit(&self, item: T) {
        lock(&self.in_use).push_back(item);
    }

    pub fn next(&self) -> Option<T> {
        lock(&self.in_use).pop_front()
    }

    pub fn release(&self, mut item: T) {
        item.reset();
        lock(&self.free).push(item);
    }

    pub fn pending(&self) -> usize {
        lock(&self.in_use).len()
    }

    pub fn available(&self) -> usize {
        lock(&self.free).len()
    }
}
