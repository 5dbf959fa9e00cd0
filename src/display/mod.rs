//! Display state machine.
//!
//! Owns the three category buckets and the presentation sink behind one
//! lock, and arms an expiry task on every detection change. The stream loop
//! applies changes; expiry tasks clear everything when they fire. Both take
//! the same lock, so a clear never lands in the middle of an update.
//!
//! Per bucket: `Empty` ⇄ `Showing(labels, expires_at)`. A change replaces
//! every bucket's content outright; an expiry forces all three to `Empty`.

mod bucket;
mod expiry;
pub mod render;
mod sink;

pub use bucket::{BucketState, DisplayBuckets};
pub use expiry::{ExpiryPolicy, ExpiryScheduler, ExpiryToken};
pub use render::{normalize, render_block, RenderedBlock};
pub use sink::{ConsoleSink, MemorySink, PresentationSink, SinkEvent};

use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::category::{Category, CategoryTable};
use crate::config::ExpirySettings;
use crate::detect::DetectionSet;
use crate::frame::Frame;
use crate::partition::{partition, Partition};

struct DisplayShared {
    buckets: DisplayBuckets,
    sink: Box<dyn PresentationSink>,
    expirations: u64,
}

impl DisplayShared {
    fn clear_all(&mut self) {
        self.buckets.clear_all();
        for category in Category::ALL {
            self.sink.clear_block(category);
        }
    }
}

pub struct DisplayStateMachine {
    table: Arc<CategoryTable>,
    shared: Arc<Mutex<DisplayShared>>,
    scheduler: ExpiryScheduler,
    delay: Duration,
}

impl DisplayStateMachine {
    pub fn new(
        table: Arc<CategoryTable>,
        sink: Box<dyn PresentationSink>,
        expiry: ExpirySettings,
    ) -> Self {
        Self {
            table,
            shared: Arc::new(Mutex::new(DisplayShared {
                buckets: DisplayBuckets::default(),
                sink,
                expirations: 0,
            })),
            scheduler: ExpiryScheduler::new(expiry.policy),
            delay: expiry.delay,
        }
    }

    /// Render a changed detection set and arm its expiry.
    pub fn apply_change(&mut self, labels: &DetectionSet) -> Result<Partition> {
        self.apply_change_at(labels, Instant::now())
    }

    pub fn apply_change_at(&mut self, labels: &DetectionSet, now: Instant) -> Result<Partition> {
        let parts = partition(&self.table, labels);
        let expires_at = now + self.delay;

        {
            let mut shared = lock_shared(&self.shared)?;
            for category in Category::ALL {
                let shown: Vec<String> = parts.get(category).iter().map(|l| normalize(l)).collect();
                match render_block(category, &shown) {
                    Some(block) => {
                        shared.sink.set_block(&block);
                        shared.buckets.set(
                            category,
                            BucketState::Showing {
                                labels: shown,
                                expires_at,
                            },
                        );
                    }
                    None => {
                        shared.sink.clear_block(category);
                        shared.buckets.set(category, BucketState::Empty);
                    }
                }
            }
            // Superseded timers are cancelled while the lock is held so a
            // timer that already woke cannot clear this update.
            self.scheduler.supersede();
        }

        let shared = Arc::clone(&self.shared);
        self.scheduler
            .arm(self.delay, move |token| expire(&shared, token))?;

        log::info!(
            "display updated: recyclable={:?} non_recyclable={:?} hazardous={:?} (uncategorised: {})",
            parts.recyclable,
            parts.non_recyclable,
            parts.hazardous,
            labels.len() - parts.len()
        );
        Ok(parts)
    }

    /// Clear all buckets now, as a firing expiry task would.
    pub fn expire_now(&self) -> Result<()> {
        let mut shared = lock_shared(&self.shared)?;
        shared.clear_all();
        shared.expirations += 1;
        Ok(())
    }

    pub fn present_frame(&self, frame: &Frame) -> Result<()> {
        let mut shared = lock_shared(&self.shared)?;
        shared.sink.present_frame(frame);
        Ok(())
    }

    /// Copy of the current bucket states.
    pub fn snapshot(&self) -> Result<DisplayBuckets> {
        Ok(lock_shared(&self.shared)?.buckets.clone())
    }

    /// Number of expiry clears that have run.
    pub fn expirations(&self) -> Result<u64> {
        Ok(lock_shared(&self.shared)?.expirations)
    }

    pub fn pending_expiries(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn armed_expiries(&self) -> u64 {
        self.scheduler.armed()
    }

    /// End-of-session reset: stop every pending timer and clear the display.
    pub fn reset(&mut self) -> Result<()> {
        {
            let mut shared = lock_shared(&self.shared)?;
            self.scheduler.cancel_pending();
            shared.clear_all();
        }
        self.scheduler.shutdown();
        Ok(())
    }
}

impl Drop for DisplayStateMachine {
    fn drop(&mut self) {
        if let Err(err) = self.reset() {
            log::error!("display reset on drop failed: {}", err);
        }
    }
}

fn lock_shared(shared: &Mutex<DisplayShared>) -> Result<MutexGuard<'_, DisplayShared>> {
    shared
        .lock()
        .map_err(|_| anyhow!("display state lock poisoned"))
}

fn expire(shared: &Mutex<DisplayShared>, token: &ExpiryToken) {
    let mut shared = match lock_shared(shared) {
        Ok(shared) => shared,
        Err(err) => {
            log::error!("display expiry skipped: {}", err);
            return;
        }
    };
    if token.is_cancelled() {
        return;
    }
    shared.clear_all();
    shared.expirations += 1;
    log::debug!("display expired");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const DELAY: Duration = Duration::from_millis(60);
    const SETTLE: Duration = Duration::from_millis(500);

    fn set(labels: &[&str]) -> DetectionSet {
        labels.iter().map(|l| l.to_string()).collect()
    }

    fn machine(delay: Duration, policy: ExpiryPolicy) -> (DisplayStateMachine, MemorySink) {
        let sink = MemorySink::new();
        let machine = DisplayStateMachine::new(
            Arc::new(CategoryTable::default()),
            Box::new(sink.clone()),
            ExpirySettings { delay, policy },
        );
        (machine, sink)
    }

    #[test]
    fn change_shows_hazardous_only() {
        let (mut display, sink) = machine(Duration::from_secs(3), ExpiryPolicy::FireAll);
        let now = Instant::now();
        display.apply_change_at(&set(&["battery"]), now).unwrap();

        let buckets = display.snapshot().unwrap();
        assert_eq!(
            buckets.get(Category::Hazardous),
            &BucketState::Showing {
                labels: vec!["battery".to_string()],
                expires_at: now + Duration::from_secs(3),
            }
        );
        assert!(buckets.get(Category::Recyclable).is_empty());
        assert!(buckets.get(Category::NonRecyclable).is_empty());

        let block = sink.block(Category::Hazardous).unwrap();
        assert_eq!(block.text, "Hazardous items:\n\n- battery");
        assert_eq!(display.armed_expiries(), 1);
    }

    #[test]
    fn labels_are_normalized_for_display_only() {
        let (mut display, sink) = machine(Duration::from_secs(3), ExpiryPolicy::FireAll);
        let parts = display
            .apply_change(&set(&["plastic_bottle", "plastic_bottle_cap"]))
            .unwrap();
        assert!(parts.recyclable.contains("plastic_bottle"));

        let buckets = display.snapshot().unwrap();
        assert_eq!(
            buckets.get(Category::Recyclable).labels(),
            &["plastic bottle".to_string(), "plastic bottle cap".to_string()]
        );
        assert_eq!(
            sink.block(Category::Recyclable).unwrap().text,
            "Recyclable items:\n\n- plastic bottle\n- plastic bottle cap"
        );
    }

    #[test]
    fn change_replaces_rather_than_appends() {
        let (mut display, sink) = machine(Duration::from_secs(3), ExpiryPolicy::FireAll);
        display.apply_change(&set(&["can", "battery"])).unwrap();
        display.apply_change(&set(&["straw"])).unwrap();

        let buckets = display.snapshot().unwrap();
        assert!(buckets.get(Category::Recyclable).is_empty());
        assert!(buckets.get(Category::Hazardous).is_empty());
        assert_eq!(
            buckets.get(Category::NonRecyclable).labels(),
            &["straw".to_string()]
        );
        assert_eq!(sink.blocks().len(), 1);
    }

    #[test]
    fn unknown_label_change_leaves_all_empty() {
        let (mut display, sink) = machine(Duration::from_secs(3), ExpiryPolicy::FireAll);
        display.apply_change(&set(&["battery"])).unwrap();
        let parts = display.apply_change(&set(&["unknown_item"])).unwrap();

        assert!(parts.is_empty());
        assert!(display.snapshot().unwrap().is_empty());
        assert!(sink.blocks().is_empty());
        // A change was still detected, so a timer is still armed.
        assert_eq!(display.armed_expiries(), 2);
    }

    #[test]
    fn expiry_clears_every_bucket() {
        let (mut display, sink) = machine(DELAY, ExpiryPolicy::FireAll);
        display
            .apply_change(&set(&["can", "straw", "battery"]))
            .unwrap();
        assert_eq!(sink.blocks().len(), 3);

        thread::sleep(SETTLE);
        assert!(display.snapshot().unwrap().is_empty());
        assert!(sink.blocks().is_empty());
        assert_eq!(display.expirations().unwrap(), 1);
    }

    #[test]
    fn expire_now_clears_regardless_of_content() {
        let (mut display, _sink) = machine(Duration::from_secs(3), ExpiryPolicy::FireAll);
        display.expire_now().unwrap();
        assert!(display.snapshot().unwrap().is_empty());

        display.apply_change(&set(&["can"])).unwrap();
        display.expire_now().unwrap();
        assert!(display.snapshot().unwrap().is_empty());
    }

    #[test]
    fn fire_all_stale_timer_clears_newer_content() {
        let delay = Duration::from_millis(300);
        let (mut display, _sink) = machine(delay, ExpiryPolicy::FireAll);
        display.apply_change(&set(&["can"])).unwrap();
        thread::sleep(Duration::from_millis(200));
        display.apply_change(&set(&["battery"])).unwrap();

        // The first timer fires ~100ms later, well before the second is due.
        thread::sleep(Duration::from_millis(170));
        assert!(display.snapshot().unwrap().is_empty());

        thread::sleep(Duration::from_millis(400));
        assert_eq!(display.expirations().unwrap(), 2);
    }

    #[test]
    fn cancel_superseded_keeps_newer_content_for_full_delay() {
        let delay = Duration::from_millis(300);
        let (mut display, _sink) = machine(delay, ExpiryPolicy::CancelSuperseded);
        display.apply_change(&set(&["can"])).unwrap();
        thread::sleep(Duration::from_millis(200));
        display.apply_change(&set(&["battery"])).unwrap();

        thread::sleep(Duration::from_millis(170));
        let buckets = display.snapshot().unwrap();
        assert_eq!(
            buckets.get(Category::Hazardous).labels(),
            &["battery".to_string()]
        );

        thread::sleep(Duration::from_millis(400));
        assert!(display.snapshot().unwrap().is_empty());
        assert_eq!(display.expirations().unwrap(), 1);
    }

    #[test]
    fn reset_cancels_timers_and_clears() {
        let (mut display, sink) = machine(Duration::from_secs(30), ExpiryPolicy::FireAll);
        display.apply_change(&set(&["battery"])).unwrap();
        assert_eq!(display.pending_expiries(), 1);

        display.reset().unwrap();
        assert_eq!(display.pending_expiries(), 0);
        assert!(display.snapshot().unwrap().is_empty());
        assert!(sink.blocks().is_empty());
        assert_eq!(display.expirations().unwrap(), 0);
    }
}
