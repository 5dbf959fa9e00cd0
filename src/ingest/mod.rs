//! Frame sources.
//!
//! - Synthetic frames (`stub://name[?frames=N]`) for tests and demos
//! - Local webcams via V4L2 (feature: ingest-v4l2)
//! - Local video files via FFmpeg (feature: ingest-file-ffmpeg)
//!
//! Every source yields `Ok(Some(frame))` while frames are available,
//! `Ok(None)` at end of stream, and `Err(SourceAcquisition)` when the device
//! or file cannot be opened or read. Network URLs are rejected.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub use file::FileSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

use crate::config::SourceSettings;
use crate::error::{SorterError, SorterResult};
use crate::frame::Frame;

/// Video source abstraction consumed by the stream loop.
pub trait FrameSource: Send {
    /// Human-readable source identifier for logs.
    fn describe(&self) -> String;

    /// Open the underlying device or file.
    fn connect(&mut self) -> SorterResult<()>;

    /// Next frame; `None` once the stream is exhausted.
    fn next_frame(&mut self) -> SorterResult<Option<Frame>>;

    /// Release the device or file. Safe to call more than once.
    fn release(&mut self);

    fn stats(&self) -> SourceStats;
}

/// Frame statistics for a source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub uri: String,
    pub healthy: bool,
}

/// Open the source named by `settings.uri`.
///
/// A bare webcam index such as `0` is shorthand for `/dev/video0`.
pub fn open_source(settings: &SourceSettings) -> SorterResult<Box<dyn FrameSource>> {
    let uri = settings.uri.trim();
    if uri.is_empty() {
        return Err(SorterError::SourceAcquisition(
            "source uri must not be empty".to_string(),
        ));
    }
    if uri.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::from_uri(uri)?));
    }
    if uri.contains("://") {
        return Err(SorterError::SourceAcquisition(format!(
            "only local sources are supported, got '{}'",
            uri
        )));
    }

    let device = if uri.chars().all(|c| c.is_ascii_digit()) {
        format!("/dev/video{}", uri)
    } else {
        uri.to_string()
    };
    if device.starts_with("/dev/video") {
        return open_webcam(&device, settings.target_fps);
    }
    Ok(Box::new(FileSource::new(file::FileConfig {
        path: device,
        target_fps: settings.target_fps,
    })?))
}

#[cfg(feature = "ingest-v4l2")]
fn open_webcam(device: &str, target_fps: u32) -> SorterResult<Box<dyn FrameSource>> {
    Ok(Box::new(V4l2Source::new(v4l2::V4l2Config {
        device: device.to_string(),
        target_fps,
        ..v4l2::V4l2Config::default()
    })))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_webcam(device: &str, _target_fps: u32) -> SorterResult<Box<dyn FrameSource>> {
    Err(SorterError::SourceAcquisition(format!(
        "webcam {} requires the ingest-v4l2 feature",
        device
    )))
}
