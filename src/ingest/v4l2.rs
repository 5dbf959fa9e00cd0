//! V4L2 webcam source.
//!
//! Captures from a local device node (e.g. `/dev/video0`) through
//! memory-mapped buffers, negotiating RGB24 and falling back to YUYV.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::normalize::{normalize_to_rgb, PixelFormat};
use crate::error::{SorterError, SorterResult};
use crate::frame::Frame;
use crate::ingest::{FrameSource, SourceStats};

/// Configuration for a V4L2 source.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Requested frame rate; drivers may round it.
    pub target_fps: u32,
    /// Preferred capture width.
    pub width: u32,
    /// Preferred capture height.
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 15,
            width: 1280,
            height: 720,
        }
    }
}

pub struct V4l2Source {
    config: V4l2Config,
    state: Option<DeviceState>,
    format: PixelFormat,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: V4l2Config) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            format: PixelFormat::Rgb24,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
        }
    }

    fn open_device(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;

        let mut negotiated = None;
        for candidate in [PixelFormat::Rgb24, PixelFormat::Yuyv] {
            let mut format = device.format().context("read v4l2 format")?;
            format.width = self.config.width;
            format.height = self.config.height;
            format.fourcc = v4l::FourCC::new(&candidate.fourcc());
            match device.set_format(&format) {
                Ok(applied) => {
                    if let Some(actual) = PixelFormat::from_fourcc(&applied.fourcc.repr) {
                        negotiated = Some((actual, applied.width, applied.height));
                        break;
                    }
                }
                Err(err) => log::warn!(
                    "V4l2Source: {} rejected {:?}: {}",
                    self.config.device,
                    candidate,
                    err
                ),
            }
        }
        let (format, width, height) = negotiated.ok_or_else(|| {
            anyhow!(
                "{} supports neither RGB3 nor YUYV capture",
                self.config.device
            )
        })?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Source: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        let state = DeviceStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        self.format = format;
        self.active_width = width;
        self.active_height = height;
        self.state = Some(state);
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let (width, height, format) = (self.active_width, self.active_height, self.format);
        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let pixels = state.with_stream_mut(|stream| -> Result<Vec<u8>> {
            let (buf, _meta) = stream.next().context("capture v4l2 frame")?;
            normalize_to_rgb(buf, width, height, format)
        })?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        Frame::from_rgb(pixels, width, height, self.frame_count)
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl FrameSource for V4l2Source {
    fn describe(&self) -> String {
        self.config.device.clone()
    }

    fn connect(&mut self) -> SorterResult<()> {
        self.open_device().map_err(|err| {
            self.last_error = Some(format!("{:#}", err));
            SorterError::source(&err)
        })?;
        self.last_error = None;
        log::info!(
            "V4l2Source: connected to {} ({}x{} {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> SorterResult<Option<Frame>> {
        match self.capture() {
            Ok(frame) => Ok(Some(frame)),
            Err(err) => {
                self.last_error = Some(format!("{:#}", err));
                Err(SorterError::source(&err))
            }
        }
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("V4l2Source: released {}", self.config.device);
        }
    }

    fn stats(&self) -> SourceStats {
        let healthy = self.state.is_some()
            && self.last_error.is_none()
            && self
                .last_frame_at
                .map_or(true, |at| at.elapsed() <= self.health_grace());
        SourceStats {
            frames_captured: self.frame_count,
            uri: self.config.device.clone(),
            healthy,
        }
    }
}
