//! Per-metric change tracking.
//!
//! Remembers the last value seen for each metric key and reports whether
//! the new value moved up, down, or stayed flat. Keys are never evicted.

use std::collections::HashMap;

use crate::types::Trend;

/// Moves smaller than this are float noise, not a change.
pub const EPSILON: f64 = 1e-7;

#[derive(Debug, Default)]
pub struct ChangeTracker {
    last: HashMap<String, f64>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `value` with the previous value for `key` and store it.
    /// An unseen key compares against itself and is therefore `Flat`.
    pub fn observe(&mut self, key: &str, value: f64) -> Trend {
        let prev = match self.last.get_mut(key) {
            Some(slot) => std::mem::replace(slot, value),
            None => {
                self.last.insert(key.to_string(), value);
                value
            }
        };

        if value > prev + EPSILON {
            Trend::Up
        } else if value < prev - EPSILON {
            Trend::Down
        } else {
            Trend::Flat
        }
    }

    /// Last stored value for `key`.
    pub fn last(&self, key: &str) -> Option<f64> {
        self.last.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
