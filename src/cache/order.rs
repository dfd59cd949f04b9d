//! Insertion Order Module
//!
//! Tracks the insertion order of keys within one namespace for count-bounded eviction.

use std::collections::VecDeque;

// == Insertion Order ==
/// Tracks insertion order for oldest-first eviction.
///
/// Keys are stored in a VecDeque where:
/// - Front = Oldest insertion
/// - Back = Newest insertion
///
/// Reads never reorder keys. Replacing a key counts as a fresh insertion.
#[derive(Debug, Default, Clone)]
pub struct InsertionOrder {
    order: VecDeque<String>,
}

impl InsertionOrder {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Insert ==
    /// Records an insertion of `key`, moving it to the newest position.
    pub fn insert(&mut self, key: &str) {
        self.remove(key);
        self.order.push_back(key.to_string());
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        self.order.retain(|k| k != key);
    }

    /// Keys from oldest to newest.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }
}
