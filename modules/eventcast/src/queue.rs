//! Ordered event buffer with one read cursor per subscriber.
//!
//! A cursor counts how many events, from the front of the retained window,
//! its subscriber has consumed. Compaction drops the prefix every cursor has
//! passed and shifts all cursors down by the same amount, so relative
//! positions never change.

use std::collections::{HashMap, VecDeque};

use crate::event::Event;
use crate::registry::SubscriberId;

#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
    cursors: HashMap<SubscriberId, usize>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail.
    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Start tracking a subscriber at the front of the retained backlog.
    /// A newcomer is entitled to everything still in memory.
    pub fn track(&mut self, id: SubscriberId) {
        self.cursors.insert(id, 0);
    }

    pub fn untrack(&mut self, id: SubscriberId) -> bool {
        self.cursors.remove(&id).is_some()
    }

    pub fn cursor(&self, id: SubscriberId) -> Option<usize> {
        self.cursors.get(&id).copied()
    }

    pub fn tracked(&self) -> usize {
        self.cursors.len()
    }

    /// The next event `id` has not consumed yet, if any.
    pub fn next_for(&self, id: SubscriberId) -> Option<&Event> {
        let cursor = self.cursor(id)?;
        self.events.get(cursor)
    }

    /// Mark the event at `id`'s cursor as consumed.
    pub fn advance(&mut self, id: SubscriberId) {
        let len = self.events.len();
        if let Some(cursor) = self.cursors.get_mut(&id) {
            if *cursor < len {
                *cursor += 1;
            }
        }
    }

    /// Drop the prefix consumed by every tracked subscriber. Returns the
    /// number of events dropped.
    ///
    /// With no subscribers tracked nothing is dropped: the backlog is kept
    /// for whoever registers next.
    pub fn compact(&mut self) -> usize {
        let Some(min_cursor) = self.cursors.values().copied().min() else {
            return 0;
        };
        if min_cursor == 0 {
            return 0;
        }

        self.events.drain(..min_cursor);
        for cursor in self.cursors.values_mut() {
            *cursor -= min_cursor;
        }

        debug_assert!(self.cursors.values().all(|c| *c <= self.events.len()));
        min_cursor
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_with(names: &[&str]) -> EventQueue {
        let mut queue = EventQueue::new();
        for name in names {
            queue.push(Event::named(*name));
        }
        queue
    }

    fn names(queue: &EventQueue) -> Vec<String> {
        queue.iter().map(|e| e.name.clone()).collect()
    }

    #[test]
    fn new_subscriber_starts_at_front_of_backlog() {
        let mut queue = queue_with(&["a", "b", "c"]);
        let id = SubscriberId::new();
        queue.track(id);

        assert_eq!(queue.cursor(id), Some(0));
        assert_eq!(queue.next_for(id).map(|e| e.name.as_str()), Some("a"));
    }

    #[test]
    fn compact_without_subscribers_keeps_backlog() {
        let mut queue = queue_with(&["a", "b"]);
        assert_eq!(queue.compact(), 0);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn compact_drops_prefix_consumed_by_all() {
        let mut queue = queue_with(&["a", "b", "c", "d"]);
        let fast = SubscriberId::new();
        let slow = SubscriberId::new();
        queue.track(fast);
        queue.track(slow);

        for _ in 0..4 {
            queue.advance(fast);
        }
        queue.advance(slow);

        assert_eq!(queue.compact(), 1);
        assert_eq!(names(&queue), ["b", "c", "d"]);
        assert_eq!(queue.cursor(fast), Some(3));
        assert_eq!(queue.cursor(slow), Some(0));
        assert_eq!(queue.next_for(slow).map(|e| e.name.as_str()), Some("b"));
        assert!(queue.next_for(fast).is_none());
    }

    #[test]
    fn lagging_subscriber_blocks_compaction() {
        let mut queue = queue_with(&["a", "b"]);
        let fast = SubscriberId::new();
        let idle = SubscriberId::new();
        queue.track(fast);
        queue.track(idle);
        queue.advance(fast);
        queue.advance(fast);

        assert_eq!(queue.compact(), 0);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn untracking_laggard_unblocks_compaction() {
        let mut queue = queue_with(&["a", "b"]);
        let fast = SubscriberId::new();
        let idle = SubscriberId::new();
        queue.track(fast);
        queue.track(idle);
        queue.advance(fast);
        queue.advance(fast);

        assert!(queue.untrack(idle));
        assert_eq!(queue.compact(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.cursor(fast), Some(0));
    }

    #[test]
    fn advance_never_passes_the_tail() {
        let mut queue = queue_with(&["a"]);
        let id = SubscriberId::new();
        queue.track(id);
        queue.advance(id);
        queue.advance(id);
        assert_eq!(queue.cursor(id), Some(1));
    }

    #[test]
    fn compaction_never_drops_an_unconsumed_event() {
        // Deterministic pseudo-random interleaving of push / track / untrack /
        // advance / compact. Every event carries its global sequence number so
        // we can check each subscriber sees a gap-free run.
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        };

        let mut queue = EventQueue::new();
        let mut seq = 0u64;
        let mut live: Vec<(SubscriberId, Option<u64>)> = Vec::new();

        for _ in 0..2000 {
            match next() % 6 {
                0 | 1 => {
                    queue.push(Event::named(seq.to_string()));
                    seq += 1;
                }
                2 if live.len() < 4 => {
                    let id = SubscriberId::new();
                    queue.track(id);
                    live.push((id, None));
                }
                3 if !live.is_empty() && next() % 4 == 0 => {
                    let idx = (next() as usize) % live.len();
                    let (id, _) = live.remove(idx);
                    assert!(queue.untrack(id));
                }
                _ => {
                    for (id, last) in live.iter_mut() {
                        if let Some(event) = queue.next_for(*id) {
                            let n: u64 = event.name.parse().unwrap();
                            if let Some(prev) = last {
                                assert_eq!(n, *prev + 1, "subscriber skipped an event");
                            }
                            *last = Some(n);
                            queue.advance(*id);
                        }
                    }
                    queue.compact();
                }
            }

            for (id, _) in &live {
                let cursor = queue.cursor(*id).unwrap();
                assert!(cursor <= queue.len());
            }
        }
    }
}
