use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Frames each demo scene is held for.
pub const DEMO_SCENE_FRAMES: usize = 30;

/// Scripted outcome for one frame.
#[derive(Clone, Debug)]
pub enum ScriptedFrame {
    Detections(Vec<Detection>),
    Failure(String),
}

impl ScriptedFrame {
    /// Full-frame detections for `(label, confidence)` pairs.
    pub fn labels(pairs: &[(&str, f32)]) -> Self {
        ScriptedFrame::Detections(
            pairs
                .iter()
                .enumerate()
                .map(|(i, (label, confidence))| {
                    let slot = i as f32 * 0.1;
                    Detection {
                        label: label.to_string(),
                        confidence: *confidence,
                        x: slot.min(0.5),
                        y: slot.min(0.5),
                        w: 0.4,
                        h: 0.4,
                    }
                })
                .collect(),
        )
    }

    pub fn empty() -> Self {
        ScriptedFrame::Detections(Vec::new())
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        ScriptedFrame::Failure(reason.into())
    }
}

/// Stub backend that replays a fixed script, one entry per `detect` call.
///
/// Once the script is exhausted it reports no detections, unless built with
/// [`StubBackend::cycling`], in which case it starts over.
#[derive(Debug, Default)]
pub struct StubBackend {
    script: Vec<ScriptedFrame>,
    cursor: usize,
    cycle: bool,
}

impl StubBackend {
    pub fn scripted(script: Vec<ScriptedFrame>) -> Self {
        Self {
            script,
            cursor: 0,
            cycle: false,
        }
    }

    pub fn cycling(mut self) -> Self {
        self.cycle = true;
        self
    }

    /// Looping scene script used when no model weights are configured.
    pub fn demo() -> Self {
        let scenes = [
            ScriptedFrame::labels(&[("plastic_bottle", 0.91)]),
            ScriptedFrame::labels(&[("plastic_bottle", 0.89), ("battery", 0.88)]),
            ScriptedFrame::empty(),
            ScriptedFrame::labels(&[("snack_bag", 0.75), ("can", 0.82), ("scrap_paper", 0.41)]),
            ScriptedFrame::labels(&[("unknown_item", 0.95)]),
            ScriptedFrame::labels(&[("light_bulb", 0.7), ("straw", 0.66), ("cardboard_box", 0.93)]),
        ];
        let script = scenes
            .iter()
            .flat_map(|scene| std::iter::repeat(scene.clone()).take(DEMO_SCENE_FRAMES))
            .collect();
        Self::scripted(script).cycling()
    }

    /// Number of `detect` calls served so far.
    pub fn calls(&self) -> usize {
        self.cursor
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        let entry = if self.script.is_empty() {
            None
        } else if self.cycle {
            self.script.get(self.cursor % self.script.len())
        } else {
            self.script.get(self.cursor)
        };
        self.cursor += 1;

        match entry {
            Some(ScriptedFrame::Detections(detections)) => Ok(detections.clone()),
            Some(ScriptedFrame::Failure(reason)) => Err(anyhow!("{}", reason)),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::from_rgb(vec![0u8; 12], 2, 2, 1).unwrap()
    }

    #[test]
    fn replays_script_then_goes_quiet() {
        let mut backend = StubBackend::scripted(vec![
            ScriptedFrame::labels(&[("can", 0.9)]),
            ScriptedFrame::failure("bad tensor"),
        ]);

        let first = backend.detect(&frame()).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].label, "can");

        let err = backend.detect(&frame()).unwrap_err();
        assert_eq!(err.to_string(), "bad tensor");

        assert!(backend.detect(&frame()).unwrap().is_empty());
        assert_eq!(backend.calls(), 3);
    }

    #[test]
    fn cycling_script_wraps_around() {
        let mut backend = StubBackend::scripted(vec![
            ScriptedFrame::labels(&[("can", 0.9)]),
            ScriptedFrame::empty(),
        ])
        .cycling();

        let labels: Vec<usize> = (0..4)
            .map(|_| backend.detect(&frame()).unwrap().len())
            .collect();
        assert_eq!(labels, vec![1, 0, 1, 0]);
    }

    #[test]
    fn demo_holds_each_scene() {
        let mut backend = StubBackend::demo();
        let first = backend.detect(&frame()).unwrap();
        for _ in 1..DEMO_SCENE_FRAMES {
            assert_eq!(backend.detect(&frame()).unwrap(), first);
        }
        let second = backend.detect(&frame()).unwrap();
        assert_ne!(second, first);
    }
}
