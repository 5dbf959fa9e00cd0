//! Presentation sinks.
//!
//! A sink receives the annotated video frames and up to three category
//! text blocks that are set or cleared independently.

use image::ImageFormat;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::category::Category;
use crate::display::render::RenderedBlock;
use crate::frame::Frame;

/// Where the stream's output goes.
pub trait PresentationSink: Send {
    /// Show a rendered frame (with detection overlay).
    fn present_frame(&mut self, frame: &Frame);

    /// Replace the text block for `block.category`.
    fn set_block(&mut self, block: &RenderedBlock);

    /// Remove the text block for `category`. Clearing an absent block is a no-op.
    fn clear_block(&mut self, category: Category);
}

/// Block-level change recorded by [`MemorySink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    Set(Category, String),
    Cleared(Category),
}

#[derive(Debug, Default)]
struct MemorySinkState {
    frames_presented: u64,
    last_frame: Option<Frame>,
    blocks: BTreeMap<Category, RenderedBlock>,
    events: Vec<SinkEvent>,
}

/// In-memory sink. Clones share state, so one clone can be handed to the
/// display while another is kept for inspection.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemorySinkState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_presented(&self) -> u64 {
        self.state.lock().map(|s| s.frames_presented).unwrap_or(0)
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.state.lock().ok().and_then(|s| s.last_frame.clone())
    }

    pub fn block(&self, category: Category) -> Option<RenderedBlock> {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.blocks.get(&category).cloned())
    }

    pub fn blocks(&self) -> BTreeMap<Category, RenderedBlock> {
        self.state
            .lock()
            .map(|s| s.blocks.clone())
            .unwrap_or_default()
    }

    /// Set/clear history. Clears of already-empty blocks are not recorded.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.state
            .lock()
            .map(|s| s.events.clone())
            .unwrap_or_default()
    }
}

impl PresentationSink for MemorySink {
    fn present_frame(&mut self, frame: &Frame) {
        if let Ok(mut state) = self.state.lock() {
            state.frames_presented += 1;
            state.last_frame = Some(frame.clone());
        }
    }

    fn set_block(&mut self, block: &RenderedBlock) {
        if let Ok(mut state) = self.state.lock() {
            state.blocks.insert(block.category, block.clone());
            state
                .events
                .push(SinkEvent::Set(block.category, block.text.clone()));
        }
    }

    fn clear_block(&mut self, category: Category) {
        if let Ok(mut state) = self.state.lock() {
            if state.blocks.remove(&category).is_some() {
                state.events.push(SinkEvent::Cleared(category));
            }
        }
    }
}

/// Operator-facing sink: logs block changes and optionally snapshots frames
/// to a JPEG file.
#[derive(Debug)]
pub struct ConsoleSink {
    snapshot_path: Option<PathBuf>,
    snapshot_every: u64,
    frames: u64,
    shown: BTreeSet<Category>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            snapshot_path: None,
            snapshot_every: 1,
            frames: 0,
            shown: BTreeSet::new(),
        }
    }

    /// Overwrite `path` with every `every`-th presented frame.
    pub fn with_snapshot(mut self, path: PathBuf, every: u64) -> Self {
        self.snapshot_path = Some(path);
        self.snapshot_every = every.max(1);
        self
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationSink for ConsoleSink {
    fn present_frame(&mut self, frame: &Frame) {
        self.frames += 1;
        let Some(path) = &self.snapshot_path else {
            return;
        };
        if self.frames % self.snapshot_every != 0 {
            return;
        }
        if let Err(err) = frame.image().save_with_format(path, ImageFormat::Jpeg) {
            log::warn!("snapshot write to {} failed: {}", path.display(), err);
        }
    }

    fn set_block(&mut self, block: &RenderedBlock) {
        self.shown.insert(block.category);
        log::info!("[{}] {}", block.style_tag, block.text.replace("\n\n", " ").replace('\n', " "));
    }

    fn clear_block(&mut self, category: Category) {
        if self.shown.remove(&category) {
            log::info!("[{}] cleared", category.style_tag());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::render::render_block;

    #[test]
    fn memory_sink_clones_share_state() {
        let sink = MemorySink::new();
        let mut handle = sink.clone();
        let block = render_block(Category::Hazardous, &["battery".to_string()]).unwrap();

        handle.set_block(&block);
        assert_eq!(sink.block(Category::Hazardous), Some(block));

        handle.clear_block(Category::Hazardous);
        handle.clear_block(Category::Hazardous);
        assert!(sink.blocks().is_empty());
        assert_eq!(sink.events().len(), 2);
    }

    #[test]
    fn console_sink_writes_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.jpg");
        let mut sink = ConsoleSink::new().with_snapshot(path.clone(), 2);
        let frame = Frame::from_rgb(vec![200u8; 8 * 8 * 3], 8, 8, 1).unwrap();

        sink.present_frame(&frame);
        assert!(!path.exists());
        sink.present_frame(&frame);
        assert!(path.exists());
    }
}
