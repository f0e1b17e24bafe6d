//! # Events — Double-Buffered Event Queues
//!
//! A minimal event channel for handing data between systems across frames.
//! Events written during one frame become readable the next, after the
//! owner calls [`update`](Events::update):
//!
//! ```text
//! frame N:    send(e1), send(e2)   → back buffer
//! update():   back ↔ front, old front dropped
//! frame N+1:  iter() yields e1, e2
//! ```
//!
//! Readers never race writers because there is only one thread; the double
//! buffer exists so a system can both read last frame's events and emit new
//! ones without seeing its own output.

/// A double-buffered queue of events of one type.
pub struct Events<T> {
    /// Events sent before the last `update`; what readers see.
    front: Vec<T>,
    /// Events sent since the last `update`.
    back: Vec<T>,
}

impl<T> Events<T> {
    pub fn new() -> Self {
        Self {
            front: Vec::new(),
            back: Vec::new(),
        }
    }

    /// Queue an event. Visible to readers after the next [`update`](Self::update).
    pub fn send(&mut self, event: T) {
        self.back.push(event);
    }

    /// Swap the buffers: newly sent events become readable, the previous
    /// frame's events are dropped. Call once per frame.
    pub fn update(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
        self.back.clear();
    }

    /// Iterate the events sent before the last [`update`](Self::update).
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.front.iter()
    }

    /// Number of currently readable events.
    pub fn len(&self) -> usize {
        self.front.len()
    }

    pub fn is_empty(&self) -> bool {
        self.front.is_empty()
    }

    /// Drop everything, readable and pending.
    pub fn clear(&mut self) {
        self.front.clear();
        self.back.clear();
    }
}

impl<T> Default for Events<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_become_visible_after_update() {
        let mut events = Events::new();
        events.send(1u32);
        events.send(2u32);
        assert!(events.is_empty()); // not yet promoted

        events.update();
        assert_eq!(events.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn events_expire_after_two_updates() {
        let mut events = Events::new();
        events.send("hello");
        events.update();
        assert_eq!(events.len(), 1);

        events.update();
        assert!(events.is_empty()); // dropped with the second swap
    }

    #[test]
    fn reading_and_writing_do_not_mix() {
        let mut events = Events::new();
        events.send(1u32);
        events.update();

        // A "system" reads last frame's events while emitting new ones.
        let seen: Vec<u32> = events.iter().copied().collect();
        for value in &seen {
            events.send(value + 10);
        }
        assert_eq!(seen, vec![1]);
        assert_eq!(events.len(), 1); // own output not visible yet

        events.update();
        assert_eq!(events.iter().copied().collect::<Vec<_>>(), vec![11]);
    }

    #[test]
    fn clear_drops_pending_too() {
        let mut events = Events::new();
        events.send(1u32);
        events.update();
        events.send(2u32);
        events.clear();
        events.update();
        assert!(events.is_empty());
    }
}
