//! Local video file source.
//!
//! Decodes frames from a local file in-memory (FFmpeg, feature
//! `ingest-file-ffmpeg`). Reaching the end of the file ends the stream
//! normally; it is not an error.

use crate::error::{SorterError, SorterResult};
use crate::frame::Frame;
#[cfg(feature = "ingest-file-ffmpeg")]
use crate::ingest::file_ffmpeg::FfmpegFileSource;
use crate::ingest::{FrameSource, SourceStats};

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "samples/bin_cam.mp4").
    pub path: String,
    /// Target frame rate; the decoder stalls if frames arrive much slower.
    pub target_fps: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            target_fps: 15,
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    config: FileConfig,
    #[cfg(feature = "ingest-file-ffmpeg")]
    decoder: Option<FfmpegFileSource>,
    frames_captured: u64,
}

impl FileSource {
    pub fn new(config: FileConfig) -> SorterResult<Self> {
        if !is_local_file_path(&config.path) {
            return Err(SorterError::SourceAcquisition(
                "file ingestion only supports local paths (no URL schemes)".to_string(),
            ));
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(SorterError::SourceAcquisition(format!(
                "file ingestion of {} requires the ingest-file-ffmpeg feature",
                config.path
            )))
        }
        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self {
                config,
                decoder: None,
                frames_captured: 0,
            })
        }
    }
}

impl FrameSource for FileSource {
    fn describe(&self) -> String {
        self.config.path.clone()
    }

    #[cfg(feature = "ingest-file-ffmpeg")]
    fn connect(&mut self) -> SorterResult<()> {
        let decoder =
            FfmpegFileSource::open(self.config.clone()).map_err(|e| SorterError::source(&e))?;
        self.decoder = Some(decoder);
        log::info!("FileSource: connected to {} (ffmpeg)", self.config.path);
        Ok(())
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    fn connect(&mut self) -> SorterResult<()> {
        Err(SorterError::SourceAcquisition(
            "file ingestion requires the ingest-file-ffmpeg feature".to_string(),
        ))
    }

    #[cfg(feature = "ingest-file-ffmpeg")]
    fn next_frame(&mut self) -> SorterResult<Option<Frame>> {
        let decoder = self.decoder.as_mut().ok_or_else(|| {
            SorterError::SourceAcquisition(format!("{} is not connected", self.config.path))
        })?;
        let frame = decoder
            .next_frame(self.frames_captured + 1)
            .map_err(|e| SorterError::source(&e))?;
        if frame.is_some() {
            self.frames_captured += 1;
        }
        Ok(frame)
    }

    #[cfg(not(feature = "ingest-file-ffmpeg"))]
    fn next_frame(&mut self) -> SorterResult<Option<Frame>> {
        Err(SorterError::SourceAcquisition(
            "file ingestion requires the ingest-file-ffmpeg feature".to_string(),
        ))
    }

    fn release(&mut self) {
        #[cfg(feature = "ingest-file-ffmpeg")]
        if self.decoder.take().is_some() {
            log::info!("FileSource: released {}", self.config.path);
        }
    }

    fn stats(&self) -> SourceStats {
        #[cfg(feature = "ingest-file-ffmpeg")]
        let healthy = self.decoder.as_ref().is_some_and(|d| d.is_healthy());
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        let healthy = false;
        SourceStats {
            frames_captured: self.frames_captured,
            uri: self.config.path.clone(),
            healthy,
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    !path.trim().is_empty() && !path.contains("://")
}
