use std::path::Path;

use crate::config::ModelSettings;
use crate::detect::backend::DetectorBackend;
use crate::detect::backends::StubBackend;
use crate::detect::result::{Detection, DetectionSet};
use crate::error::{SorterError, SorterResult};
use crate::frame::Frame;

/// Minimum confidence for a detection to count.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// Output of one classified frame.
///
/// `labels` drives change tracking and categorisation. `detections` is the
/// overlay channel: the same regions with boxes and scores, already filtered
/// by the threshold.
#[derive(Clone, Debug, Default)]
pub struct Classification {
    pub labels: DetectionSet,
    pub detections: Vec<Detection>,
}

/// Adapter from a detector backend to label sets.
pub struct Classifier {
    backend: Box<dyn DetectorBackend>,
    confidence_threshold: f32,
}

impl Classifier {
    pub fn new(backend: Box<dyn DetectorBackend>, confidence_threshold: f32) -> Self {
        Self {
            backend,
            confidence_threshold,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Run the model on `frame` and keep regions scoring at least the threshold.
    pub fn detect(&mut self, frame: &Frame) -> SorterResult<Classification> {
        let raw = self
            .backend
            .detect(frame)
            .map_err(|e| SorterError::inference(&e))?;

        let detections: Vec<Detection> = raw
            .into_iter()
            .filter(|d| d.confidence >= self.confidence_threshold)
            .collect();
        let labels = detections.iter().map(|d| d.label.clone()).collect();

        Ok(Classification { labels, detections })
    }
}

/// Build the backend named by `settings.path`.
///
/// `stub://` paths select the scripted demo backend. Anything else is an
/// ONNX model file and needs the `backend-tract` feature.
pub fn load_backend(
    settings: &ModelSettings,
    confidence_threshold: f32,
) -> SorterResult<Box<dyn DetectorBackend>> {
    let mut backend: Box<dyn DetectorBackend> = if settings.path.starts_with("stub://") {
        Box::new(StubBackend::demo())
    } else {
        if !Path::new(&settings.path).is_file() {
            return Err(SorterError::ModelLoad {
                path: settings.path.clone(),
                reason: "model file not found".to_string(),
            });
        }
        load_model_file(settings, confidence_threshold)?
    };

    backend
        .warm_up()
        .map_err(|e| SorterError::model_load(settings.path.clone(), &e))?;
    log::info!("detector backend '{}' ready ({})", backend.name(), settings.path);
    Ok(backend)
}

#[cfg(feature = "backend-tract")]
fn load_model_file(
    settings: &ModelSettings,
    confidence_threshold: f32,
) -> SorterResult<Box<dyn DetectorBackend>> {
    let backend = crate::detect::backends::TractBackend::new(
        &settings.path,
        settings.input_size,
        settings.class_names.clone(),
    )
    .map_err(|e| SorterError::model_load(settings.path.clone(), &e))?
    .with_threshold(confidence_threshold);
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn load_model_file(
    settings: &ModelSettings,
    _confidence_threshold: f32,
) -> SorterResult<Box<dyn DetectorBackend>> {
    Err(SorterError::ModelLoad {
        path: settings.path.clone(),
        reason: "ONNX models require the backend-tract feature".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::ScriptedFrame;

    fn frame() -> Frame {
        Frame::from_rgb(vec![0u8; 12], 2, 2, 1).unwrap()
    }

    fn classifier(script: Vec<ScriptedFrame>) -> Classifier {
        Classifier::new(
            Box::new(StubBackend::scripted(script)),
            DEFAULT_CONFIDENCE_THRESHOLD,
        )
    }

    #[test]
    fn keeps_unique_labels_at_or_above_threshold() {
        let mut classifier = classifier(vec![ScriptedFrame::labels(&[
            ("can", 0.9),
            ("can", 0.7),
            ("battery", 0.6),
            ("straw", 0.59),
        ])]);

        let result = classifier.detect(&frame()).unwrap();
        let labels: Vec<&str> = result.labels.iter().map(String::as_str).collect();
        assert_eq!(labels, vec!["battery", "can"]);
        assert_eq!(result.detections.len(), 3);
        assert!(result.detections.iter().all(|d| d.label != "straw"));
    }

    #[test]
    fn backend_failure_becomes_inference_error() {
        let mut classifier = classifier(vec![ScriptedFrame::failure("tensor shape mismatch")]);
        match classifier.detect(&frame()) {
            Err(SorterError::ModelInference(reason)) => {
                assert!(reason.contains("tensor shape mismatch"))
            }
            other => panic!("expected inference error, got {:?}", other.map(|c| c.labels)),
        }
    }

    #[test]
    fn stub_path_loads_demo_backend() {
        let settings = ModelSettings {
            path: "stub://demo".to_string(),
            ..ModelSettings::default()
        };
        let backend = load_backend(&settings, 0.6).unwrap();
        assert_eq!(backend.name(), "stub");
    }

    #[test]
    fn missing_weights_report_attempted_path() {
        let settings = ModelSettings {
            path: "/nonexistent/weights/best.onnx".to_string(),
            ..ModelSettings::default()
        };
        match load_backend(&settings, 0.6) {
            Err(SorterError::ModelLoad { path, .. }) => {
                assert_eq!(path, "/nonexistent/weights/best.onnx")
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected model load failure"),
        }
    }
}
