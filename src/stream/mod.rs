//! Stream loop controller.
//!
//! The only component that blocks on I/O. Each iteration pulls a frame,
//! resizes it to the working resolution, classifies it, feeds the tracker,
//! and on a change drives the display (which arms its own expiry task).
//! The annotated frame is presented on every successful iteration.
//!
//! The loop ends on a stop request, at end of stream, or when the source
//! fails. In every case the source is released and the session finished,
//! so the display never keeps content from a terminated session.

mod session;

pub use session::{StopSignal, StreamSession};

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::category::CategoryTable;
use crate::detect::{Classifier, DetectionSet};
use crate::error::SorterError;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::tracker::SetUpdate;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// What one processed frame did to the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Unchanged,
    Changed(DetectionSet),
    /// The model failed on this frame; prior state was kept.
    InferenceFailed,
}

/// Why `StreamLoop::run` returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    Stopped,
    EndOfStream,
    FrameLimit,
    SourceFailed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub frames: u64,
    pub changes: u64,
    pub inference_failures: u64,
    pub termination: Termination,
}

pub struct StreamLoop {
    classifier: Classifier,
    table: Arc<CategoryTable>,
    frame_width: u32,
    frame_height: u32,
}

impl StreamLoop {
    pub fn new(
        classifier: Classifier,
        table: Arc<CategoryTable>,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        Self {
            classifier,
            table,
            frame_width,
            frame_height,
        }
    }

    /// Process a single frame against `session`.
    ///
    /// Inference failures are absorbed: the plain frame is still presented
    /// and the tracked set and display are left as they were. Only display
    /// errors (a poisoned lock, a failed timer spawn) are returned.
    pub fn step(&mut self, session: &mut StreamSession, frame: Frame) -> Result<FrameOutcome> {
        let frame = frame.resized(self.frame_width, self.frame_height);
        let (tracker, display) = session.parts_mut();

        let classification = match self.classifier.detect(&frame) {
            Ok(classification) => classification,
            Err(SorterError::ModelInference(reason)) => {
                log::warn!(
                    "inference failed on frame {}, keeping previous state: {}",
                    frame.sequence(),
                    reason
                );
                display.present_frame(&frame)?;
                return Ok(FrameOutcome::InferenceFailed);
            }
            Err(other) => return Err(other.into()),
        };

        let outcome = match tracker.update(classification.labels) {
            SetUpdate::Changed(labels) => {
                display.apply_change(&labels)?;
                FrameOutcome::Changed(labels)
            }
            SetUpdate::Unchanged => FrameOutcome::Unchanged,
        };

        let annotated = frame.annotated(&classification.detections, &self.table);
        display.present_frame(&annotated)?;
        Ok(outcome)
    }

    /// Drive `source` until stopped, exhausted, failed, or `max_frames` is reached.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        session: &mut StreamSession,
        stop: &StopSignal,
        max_frames: Option<u64>,
    ) -> Result<RunReport> {
        let mut report = RunReport {
            frames: 0,
            changes: 0,
            inference_failures: 0,
            termination: Termination::Stopped,
        };

        if let Err(err) = source.connect() {
            log::error!("unable to open source {}: {}", source.describe(), err);
            report.termination = Termination::SourceFailed(err.to_string());
            source.release();
            session.finish()?;
            return Ok(report);
        }
        log::info!(
            "streaming from {} with {} backend (threshold {:.2})",
            source.describe(),
            self.classifier.backend_name(),
            self.classifier.confidence_threshold()
        );

        let mut last_health_log = Instant::now();
        let result = loop {
            if stop.is_stopped() {
                break Ok(Termination::Stopped);
            }
            if max_frames.is_some_and(|limit| report.frames >= limit) {
                break Ok(Termination::FrameLimit);
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break Ok(Termination::EndOfStream),
                Err(err) => {
                    log::error!("source {} failed: {}", source.describe(), err);
                    break Ok(Termination::SourceFailed(err.to_string()));
                }
            };

            report.frames += 1;
            match self.step(session, frame) {
                Ok(FrameOutcome::Changed(_)) => report.changes += 1,
                Ok(FrameOutcome::InferenceFailed) => report.inference_failures += 1,
                Ok(FrameOutcome::Unchanged) => {}
                Err(err) => break Err(err),
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let stats = source.stats();
                log::info!(
                    "source health={} captured={} processed={} changes={} inference_failures={} uri={}",
                    stats.healthy,
                    stats.frames_captured,
                    report.frames,
                    report.changes,
                    report.inference_failures,
                    stats.uri
                );
                last_health_log = Instant::now();
            }
        };

        source.release();
        session.finish()?;
        report.termination = result?;
        log::info!(
            "stream ended ({:?}) after {} frames, {} changes",
            report.termination,
            report.frames,
            report.changes
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExpirySettings;
    use crate::detect::{ScriptedFrame, StubBackend};
    use crate::display::{ExpiryPolicy, MemorySink};

    fn build(script: Vec<ScriptedFrame>) -> (StreamLoop, StreamSession, MemorySink) {
        let table = Arc::new(CategoryTable::default());
        let classifier = Classifier::new(Box::new(StubBackend::scripted(script)), 0.6);
        let sink = MemorySink::new();
        let session = StreamSession::new(
            Arc::clone(&table),
            Box::new(sink.clone()),
            ExpirySettings {
                delay: Duration::from_secs(60),
                policy: ExpiryPolicy::FireAll,
            },
        );
        (StreamLoop::new(classifier, table, 64, 36), session, sink)
    }

    fn blank_frame(sequence: u64) -> Frame {
        Frame::from_rgb(vec![0u8; 128 * 72 * 3], 128, 72, sequence).unwrap()
    }

    #[test]
    fn step_resizes_before_presenting() {
        let (mut stream, mut session, sink) = build(vec![ScriptedFrame::empty()]);
        stream.step(&mut session, blank_frame(1)).unwrap();
        let presented = sink.last_frame().unwrap();
        assert_eq!((presented.width(), presented.height()), (64, 36));
    }

    #[test]
    fn repeated_set_is_unchanged() {
        let (mut stream, mut session, _sink) = build(vec![
            ScriptedFrame::labels(&[("plastic_bottle", 0.9)]),
            ScriptedFrame::labels(&[("plastic_bottle", 0.8)]),
        ]);
        assert!(matches!(
            stream.step(&mut session, blank_frame(1)).unwrap(),
            FrameOutcome::Changed(_)
        ));
        assert_eq!(
            stream.step(&mut session, blank_frame(2)).unwrap(),
            FrameOutcome::Unchanged
        );
        assert_eq!(session.display().armed_expiries(), 1);
    }

    #[test]
    fn inference_failure_keeps_state_and_still_presents() {
        let (mut stream, mut session, sink) = build(vec![
            ScriptedFrame::labels(&[("battery", 0.9)]),
            ScriptedFrame::failure("tensor shape mismatch"),
        ]);
        stream.step(&mut session, blank_frame(1)).unwrap();
        let outcome = stream.step(&mut session, blank_frame(2)).unwrap();

        assert_eq!(outcome, FrameOutcome::InferenceFailed);
        assert!(session.tracker().current().contains("battery"));
        assert_eq!(sink.frames_presented(), 2);
    }

    #[test]
    fn stop_before_start_processes_nothing() {
        let (mut stream, mut session, _sink) = build(vec![]);
        let mut source = crate::ingest::SyntheticSource::from_uri("stub://cam?width=8&height=8")
            .unwrap();
        let stop = StopSignal::new();
        stop.stop();

        let report = stream.run(&mut source, &mut session, &stop, None).unwrap();
        assert_eq!(report.frames, 0);
        assert_eq!(report.termination, Termination::Stopped);
        assert!(!source.stats().healthy);
    }
}
