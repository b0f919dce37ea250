//! Set of datagram ids already seen on the UDP receive path.
//!
//! A retransmitted datagram (our CONFIRM was lost) arrives with the same id.
//! It is confirmed again and decoded again, but its side effects run once.
//! Entries are never evicted; a session is short-lived and ids are 16-bit.

use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct SeenIds {
    ids: HashSet<u16>,
}

impl SeenIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id`.  Returns `true` the first time an id is seen.
    pub fn first_sight(&mut self, id: u16) -> bool {
        self.ids.insert(id)
    }

    pub fn contains(&self, id: u16) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
