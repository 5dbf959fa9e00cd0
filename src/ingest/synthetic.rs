//! Synthetic frame source for `stub://` URIs.
//!
//! Produces deterministic gradient frames at a webcam-like 1280×720 so the
//! stream loop exercises its resize path. `stub://name?frames=N` ends the
//! stream after `N` frames; without `frames` it runs until stopped.

use crate::error::{SorterError, SorterResult};
use crate::frame::Frame;
use crate::ingest::{FrameSource, SourceStats};

const SYNTHETIC_WIDTH: u32 = 1280;
const SYNTHETIC_HEIGHT: u32 = 720;

pub struct SyntheticSource {
    uri: String,
    frame_limit: Option<u64>,
    width: u32,
    height: u32,
    frame_count: u64,
    connected: bool,
}

impl SyntheticSource {
    pub fn from_uri(uri: &str) -> SorterResult<Self> {
        let rest = uri.strip_prefix("stub://").ok_or_else(|| {
            SorterError::SourceAcquisition(format!("'{}' is not a stub:// uri", uri))
        })?;

        let mut frame_limit = None;
        let mut width = SYNTHETIC_WIDTH;
        let mut height = SYNTHETIC_HEIGHT;
        if let Some((_, query)) = rest.split_once('?') {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                let parsed: u64 = value.parse().map_err(|_| {
                    SorterError::SourceAcquisition(format!(
                        "invalid value '{}' for '{}' in {}",
                        value, key, uri
                    ))
                })?;
                match key {
                    "frames" => frame_limit = Some(parsed),
                    "width" => width = dimension(parsed, key, uri)?,
                    "height" => height = dimension(parsed, key, uri)?,
                    other => {
                        return Err(SorterError::SourceAcquisition(format!(
                            "unknown parameter '{}' in {}",
                            other, uri
                        )))
                    }
                }
            }
        }

        Ok(Self {
            uri: uri.to_string(),
            frame_limit,
            width,
            height,
            frame_count: 0,
            connected: false,
        })
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let shift = self.frame_count as usize;
        let mut pixels = vec![0u8; (self.width * self.height * 3) as usize];
        for (i, px) in pixels.chunks_exact_mut(3).enumerate() {
            let x = i % self.width as usize;
            let y = i / self.width as usize;
            px[0] = ((x + shift) % 256) as u8;
            px[1] = (y % 256) as u8;
            px[2] = ((x + y) % 256) as u8;
        }
        pixels
    }
}

fn dimension(value: u64, key: &str, uri: &str) -> SorterResult<u32> {
    match u32::try_from(value) {
        Ok(v) if v > 0 && v <= 8192 => Ok(v),
        _ => Err(SorterError::SourceAcquisition(format!(
            "{} out of range in {}",
            key, uri
        ))),
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        self.uri.clone()
    }

    fn connect(&mut self) -> SorterResult<()> {
        self.connected = true;
        log::info!("SyntheticSource: connected to {}", self.uri);
        Ok(())
    }

    fn next_frame(&mut self) -> SorterResult<Option<Frame>> {
        if !self.connected {
            return Err(SorterError::SourceAcquisition(format!(
                "{} is not connected",
                self.uri
            )));
        }
        if self.frame_limit.is_some_and(|limit| self.frame_count >= limit) {
            return Ok(None);
        }
        self.frame_count += 1;
        let frame = Frame::from_rgb(
            self.generate_pixels(),
            self.width,
            self.height,
            self.frame_count,
        )
        .map_err(|e| SorterError::source(&e))?;
        Ok(Some(frame))
    }

    fn release(&mut self) {
        if self.connected {
            log::info!("SyntheticSource: released {}", self.uri);
        }
        self.connected = false;
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            uri: self.uri.clone(),
            healthy: self.connected,
        }
    }
}
