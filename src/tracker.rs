//! Detection set tracking.
//!
//! Holds the label set that was last pushed to the display and gates all
//! downstream work: partitioning, rendering and expiry arming only happen
//! when the set of visible labels actually changes.

use std::time::Instant;

use crate::detect::DetectionSet;

/// Result of feeding one frame's labels to the tracker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetUpdate {
    Changed(DetectionSet),
    Unchanged,
}

impl SetUpdate {
    pub fn is_changed(&self) -> bool {
        matches!(self, SetUpdate::Changed(_))
    }
}

/// Session-scoped tracker state. Owned by the stream loop's thread.
#[derive(Debug, Default)]
pub struct DetectionSetTracker {
    current: DetectionSet,
    last_change: Option<Instant>,
    changes: u64,
}

impl DetectionSetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `new_set` with the current set, replacing it on difference.
    pub fn update(&mut self, new_set: DetectionSet) -> SetUpdate {
        self.update_at(new_set, Instant::now())
    }

    pub fn update_at(&mut self, new_set: DetectionSet, now: Instant) -> SetUpdate {
        if new_set == self.current {
            return SetUpdate::Unchanged;
        }
        log::debug!("detection set changed: {:?} -> {:?}", self.current, new_set);
        self.current = new_set.clone();
        self.last_change = Some(now);
        self.changes += 1;
        SetUpdate::Changed(new_set)
    }

    pub fn current(&self) -> &DetectionSet {
        &self.current
    }

    /// Time of the most recent change; `None` before the first one.
    pub fn last_change(&self) -> Option<Instant> {
        self.last_change
    }

    pub fn changes(&self) -> u64 {
        self.changes
    }
}
