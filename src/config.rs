use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::category::{CategoryLists, CategoryTable};
use crate::detect::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::display::ExpiryPolicy;
use crate::frame::{DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};

const DEFAULT_MODEL_PATH: &str = "weights/best.onnx";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_SOURCE_URI: &str = "/dev/video0";
const DEFAULT_SOURCE_FPS: u32 = 15;
const DEFAULT_EXPIRY_MS: u64 = 3_000;

#[derive(Debug, Deserialize, Default)]
struct SorterConfigFile {
    model: Option<ModelConfigFile>,
    source: Option<SourceConfigFile>,
    detection: Option<DetectionConfigFile>,
    display: Option<DisplayConfigFile>,
    categories: Option<CategoriesConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<String>,
    input_size: Option<u32>,
    class_names: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    uri: Option<String>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    confidence_threshold: Option<f32>,
    frame_width: Option<u32>,
    frame_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    expiry_ms: Option<u64>,
    cancel_superseded: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct CategoriesConfigFile {
    recyclable: Option<Vec<String>>,
    non_recyclable: Option<Vec<String>>,
    hazardous: Option<Vec<String>>,
}

/// Startup configuration. Never mutated once streaming begins.
#[derive(Debug, Clone)]
pub struct SorterConfig {
    pub model: ModelSettings,
    pub source: SourceSettings,
    pub confidence_threshold: f32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub expiry: ExpirySettings,
    pub categories: CategoryLists,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// ONNX weights path, or `stub://...` for the scripted demo detector.
    pub path: String,
    /// Square model input side in pixels.
    pub input_size: u32,
    /// Class index → label override. `None` uses the names embedded in the
    /// model's metadata.
    pub class_names: Option<Vec<String>>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            path: DEFAULT_MODEL_PATH.to_string(),
            input_size: DEFAULT_MODEL_INPUT,
            class_names: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Device node, local file path or `stub://name[?frames=N]`.
    pub uri: String,
    pub target_fps: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            uri: DEFAULT_SOURCE_URI.to_string(),
            target_fps: DEFAULT_SOURCE_FPS,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExpirySettings {
    pub delay: Duration,
    pub policy: ExpiryPolicy,
}

impl Default for ExpirySettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(DEFAULT_EXPIRY_MS),
            policy: ExpiryPolicy::default(),
        }
    }
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            model: ModelSettings::default(),
            source: SourceSettings::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            expiry: ExpirySettings::default(),
            categories: CategoryLists::default(),
        }
    }
}

impl SorterConfig {
    /// Load from `$WASTE_SORTER_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("WASTE_SORTER_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a JSON config document without consulting the environment.
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: SorterConfigFile =
            serde_json::from_str(raw).map_err(|e| anyhow!("invalid config: {}", e))?;
        let cfg = Self::from_file(file);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SorterConfigFile) -> Self {
        let defaults = Self::default();

        let categories = match file.categories {
            Some(c) => CategoryLists {
                recyclable: c.recyclable.unwrap_or(defaults.categories.recyclable),
                non_recyclable: c.non_recyclable.unwrap_or(defaults.categories.non_recyclable),
                hazardous: c.hazardous.unwrap_or(defaults.categories.hazardous),
            },
            None => defaults.categories,
        };

        let model = ModelSettings {
            path: file
                .model
                .as_ref()
                .and_then(|m| m.path.clone())
                .unwrap_or(defaults.model.path),
            input_size: file
                .model
                .as_ref()
                .and_then(|m| m.input_size)
                .unwrap_or(defaults.model.input_size),
            class_names: file.model.and_then(|m| m.class_names),
        };

        let source = SourceSettings {
            uri: file
                .source
                .as_ref()
                .and_then(|s| s.uri.clone())
                .unwrap_or(defaults.source.uri),
            target_fps: file
                .source
                .as_ref()
                .and_then(|s| s.target_fps)
                .unwrap_or(defaults.source.target_fps),
        };

        let detection = file.detection.unwrap_or_default();
        let display = file.display.unwrap_or_default();
        let expiry = ExpirySettings {
            delay: display
                .expiry_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.expiry.delay),
            policy: display
                .cancel_superseded
                .map(ExpiryPolicy::from_cancel_flag)
                .unwrap_or(defaults.expiry.policy),
        };

        Self {
            model,
            source,
            confidence_threshold: detection
                .confidence_threshold
                .unwrap_or(defaults.confidence_threshold),
            frame_width: detection.frame_width.unwrap_or(defaults.frame_width),
            frame_height: detection.frame_height.unwrap_or(defaults.frame_height),
            expiry,
            categories,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("WASTE_SORTER_MODEL") {
            if !path.trim().is_empty() {
                self.model.path = path;
            }
        }
        if let Ok(uri) = std::env::var("WASTE_SORTER_SOURCE") {
            if !uri.trim().is_empty() {
                self.source.uri = uri;
            }
        }
        if let Ok(threshold) = std::env::var("WASTE_SORTER_CONFIDENCE") {
            self.confidence_threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("WASTE_SORTER_CONFIDENCE must be a number"))?;
        }
        if let Ok(expiry) = std::env::var("WASTE_SORTER_EXPIRY_MS") {
            let millis: u64 = expiry.trim().parse().map_err(|_| {
                anyhow!("WASTE_SORTER_EXPIRY_MS must be an integer number of milliseconds")
            })?;
            self.expiry.delay = Duration::from_millis(millis);
        }
        if let Ok(flag) = std::env::var("WASTE_SORTER_CANCEL_SUPERSEDED") {
            self.expiry.policy = ExpiryPolicy::from_cancel_flag(parse_bool(&flag)?);
        }
        Ok(())
    }

    /// Check invariants the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        if !(self.confidence_threshold > 0.0 && self.confidence_threshold <= 1.0) {
            return Err(anyhow!(
                "confidence threshold must be within (0, 1], got {}",
                self.confidence_threshold
            ));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(anyhow!("frame dimensions must be greater than zero"));
        }
        if self.model.input_size == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        if self.model.class_names.as_ref().is_some_and(|names| names.is_empty()) {
            return Err(anyhow!("model class_names override must not be empty"));
        }
        if self.expiry.delay.is_zero() {
            return Err(anyhow!("expiry delay must be greater than zero"));
        }
        if self.source.uri.trim().is_empty() {
            return Err(anyhow!("source uri must not be empty"));
        }
        self.category_table()?;
        Ok(())
    }

    pub fn category_table(&self) -> Result<CategoryTable> {
        CategoryTable::from_lists(&self.categories)
    }
}

fn read_config_file(path: &Path) -> Result<SorterConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow!("expected a boolean, got '{}'", other)),
    }
}
