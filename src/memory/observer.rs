//! Change notifications.
//!
//! Observers are called synchronously, right after the mutation they
//! describe, and only ever see an immutable snapshot.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::line::CacheLine;
use super::Word;

/// State of one (set, way) right after it was mutated
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEvent {
    pub way: usize,
    pub set: usize,
    pub valid: bool,
    /// Always false for write-through caches
    pub dirty: bool,
    pub tag: u64,
    pub data: Vec<Word>,
}

impl CacheEvent {
    pub fn from_line(set: usize, way: usize, line: &CacheLine) -> Self {
        Self {
            way,
            set,
            valid: line.valid(),
            dirty: line.is_dirty(),
            tag: line.tag(),
            data: line.data().to_vec(),
        }
    }
}

pub trait CacheObserver {
    fn cache_update(&mut self, event: &CacheEvent);
}

impl<F: FnMut(&CacheEvent)> CacheObserver for F {
    fn cache_update(&mut self, event: &CacheEvent) {
        self(event)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registered observers, notified in subscription order
#[derive(Default)]
pub struct Observers {
    next_id: u64,
    observers: Vec<(SubscriptionId, Box<dyn CacheObserver>)>,
}

impl Observers {
    pub fn subscribe(&mut self, observer: Box<dyn CacheObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    /// Returns false if `id` was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(other, _)| *other != id);
        self.observers.len() != before
    }

    pub fn notify(&mut self, event: &CacheEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer.cache_update(event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers").field("count", &self.observers.len()).finish()
    }
}

/// Observer that keeps every event it sees.
/// Clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct EventRecorder {
    events: Rc<RefCell<Vec<CacheEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CacheEvent> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    /// Remove and return everything recorded so far
    pub fn take(&self) -> Vec<CacheEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl CacheObserver for EventRecorder {
    fn cache_update(&mut self, event: &CacheEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(set: usize) -> CacheEvent {
        CacheEvent { way: 0, set, valid: true, dirty: false, tag: 1, data: vec![2] }
    }

    #[test]
    fn test_notify_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut observers = Observers::default();
        for name in ["first", "second"] {
            let seen = seen.clone();
            observers.subscribe(Box::new(move |e: &CacheEvent| {
                seen.borrow_mut().push((name, e.set))
            }));
        }

        observers.notify(&event(3));
        assert_eq!(*seen.borrow(), vec![("first", 3), ("second", 3)]);
    }

    #[test]
    fn test_unsubscribe() {
        let recorder = EventRecorder::new();
        let mut observers = Observers::default();
        let id = observers.subscribe(Box::new(recorder.clone()));

        observers.notify(&event(0));
        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.notify(&event(1));

        assert_eq!(recorder.events(), vec![event(0)]);
        assert!(observers.is_empty());
    }
}
