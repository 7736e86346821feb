use std::collections::{HashSet, VecDeque};

use crate::broker::message::Event;

/// Remembers the identities of recently seen events.
///
/// Delivery is at-least-once: a server that replays recent history after a
/// reconnect will deliver some events twice. Consumers that care run events
/// through one of these. Memory is bounded; the oldest identity is
/// forgotten first.
#[derive(Debug)]
pub struct DedupFilter {
    capacity: usize,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl DedupFilter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// `true` the first time an event with this identity shows up.
    pub fn first_sighting(&mut self, event: &Event) -> bool {
        self.insert(event.identity())
    }

    pub fn insert(&mut self, key: String) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for DedupFilter {
    fn default() -> Self {
        Self::new(1024)
    }
}
