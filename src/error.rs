use thiserror::Error;

/// Failures surfaced by the classification pipeline.
///
/// Startup failures (`ModelLoad`) are fatal. `SourceAcquisition` ends a
/// streaming session gracefully. `ModelInference` only affects the frame
/// that produced it; the stream loop skips that frame and keeps going.
#[derive(Debug, Error)]
pub enum SorterError {
    #[error("unable to load model from {path}: {reason}")]
    ModelLoad { path: String, reason: String },

    #[error("video source unavailable: {0}")]
    SourceAcquisition(String),

    #[error("model inference failed: {0}")]
    ModelInference(String),
}

impl SorterError {
    pub fn model_load(path: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::ModelLoad {
            path: path.into(),
            reason: format!("{:#}", err),
        }
    }

    pub fn source(err: &anyhow::Error) -> Self {
        Self::SourceAcquisition(format!("{:#}", err))
    }

    pub fn inference(err: &anyhow::Error) -> Self {
        Self::ModelInference(format!("{:#}", err))
    }
}

pub type SorterResult<T> = std::result::Result<T, SorterError>;
