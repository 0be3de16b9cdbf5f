//! The FIFO of synthesized events produced during state synchronization.

use std::collections::VecDeque;

use crate::event::InputEvent;

/// Single-producer/single-consumer queue between the synchronization engine
/// and the reader. Exists logically only between the detection of a
/// `SYN_DROPPED` and the last synthesized event being drained; the backing
/// allocation is reserved once, at attach time, so draining never allocates.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    events: VecDeque<InputEvent>,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Grows the backing buffer to hold at least `bound` events. The bound
    /// is derived from the attached capability set: one event per supported
    /// key/LED/switch/axis code, one per tracked slot cell plus its slot
    /// marker, and the terminating report.
    pub(crate) fn reserve_bound(&mut self, bound: usize) {
        if self.events.capacity() < bound {
            self.events.reserve(bound - self.events.len());
        }
    }

    pub(crate) fn push(&mut self, ev: InputEvent) {
        self.events.push_back(ev);
    }

    pub(crate) fn pop(&mut self) -> Option<InputEvent> {
        self.events.pop_front()
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventType, KeyCode};

    #[test]
    fn fifo_order() {
        let mut q = EventQueue::new();
        q.push(InputEvent::new(EventType::EV_KEY, KeyCode::KEY_A.0, 1));
        q.push(InputEvent::new(EventType::EV_KEY, KeyCode::KEY_B.0, 1));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop().unwrap().code(), KeyCode::KEY_A.0);
        assert_eq!(q.pop().unwrap().code(), KeyCode::KEY_B.0);
        assert!(q.pop().is_none());
        assert!(q.is_empty());
    }

    #[test]
    fn reserve_keeps_capacity_across_drain() {
        let mut q = EventQueue::new();
        q.reserve_bound(128);
        let cap = q.events.capacity();
        assert!(cap >= 128);
        for i in 0..100 {
            q.push(InputEvent::new(EventType::EV_KEY, i, 1));
        }
        while q.pop().is_some() {}
        assert!(q.events.capacity() >= cap);
    }
}
