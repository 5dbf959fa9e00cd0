use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::category::CategoryTable;
use crate::config::ExpirySettings;
use crate::display::{DisplayStateMachine, PresentationSink};
use crate::tracker::DetectionSetTracker;

/// Cooperative stop flag, checked once per loop iteration.
///
/// Clones share the flag, so a Ctrl-C handler or another thread can hold
/// one while the loop holds another.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-session context: the tracker and the display it drives.
///
/// One instance per streaming session. `finish` returns both to their
/// initial state so nothing from a terminated session stays on screen.
pub struct StreamSession {
    tracker: DetectionSetTracker,
    display: DisplayStateMachine,
}

impl StreamSession {
    pub fn new(
        table: Arc<CategoryTable>,
        sink: Box<dyn PresentationSink>,
        expiry: ExpirySettings,
    ) -> Self {
        Self {
            tracker: DetectionSetTracker::new(),
            display: DisplayStateMachine::new(table, sink, expiry),
        }
    }

    pub fn tracker(&self) -> &DetectionSetTracker {
        &self.tracker
    }

    pub fn display(&self) -> &DisplayStateMachine {
        &self.display
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut DetectionSetTracker, &mut DisplayStateMachine) {
        (&mut self.tracker, &mut self.display)
    }

    /// Cancel pending expiries, clear the display and forget the tracked set.
    pub fn finish(&mut self) -> Result<()> {
        self.display.reset()?;
        self.tracker = DetectionSetTracker::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_signal_is_shared_between_clones() {
        let signal = StopSignal::new();
        let handle = signal.clone();
        assert!(!signal.is_stopped());
        handle.stop();
        assert!(signal.is_stopped());
    }
}
