#![cfg(feature = "backend-tract")]

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

const NMS_IOU_THRESHOLD: f32 = 0.45;
const MAX_DETECTIONS: usize = 100;
const NAMES_METADATA_KEY: &str = "names";

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// Expects a square `1×3×S×S` float input and a `1×(4+C)×N` output where the
/// first four rows are `cx, cy, w, h` in input pixels and the remaining `C`
/// rows are per-class scores. Class indices map to labels through the
/// `names` dict the exporter stores in the model metadata, unless an
/// explicit list is configured.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    class_names: Vec<String>,
    confidence_floor: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    ///
    /// `class_names` overrides the model's own `names` metadata. Loading
    /// fails when neither is available.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        input_size: u32,
        class_names: Option<Vec<String>>,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let onnx = tract_onnx::onnx();
        let proto = onnx
            .proto_model_for_path(model_path)
            .with_context(|| format!("failed to read ONNX model from {}", model_path.display()))?;

        let embedded = proto
            .metadata_props
            .iter()
            .find(|entry| entry.key == NAMES_METADATA_KEY)
            .map(|entry| parse_names_metadata(&entry.value))
            .transpose()
            .context("invalid class names in model metadata")?;
        let class_names = resolve_class_names(embedded, class_names)?;

        let side = input_size as usize;
        let model = onnx
            .model_for_proto_model(&proto)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: {} loaded with {} classes",
            model_path.display(),
            class_names.len()
        );
        Ok(Self {
            model,
            input_size,
            class_names,
            confidence_floor: 0.25,
        })
    }

    /// Drop candidates below this score before NMS.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_floor = threshold;
        self
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let side = self.input_size;
        let resized = imageops::resize(frame.image(), side, side, FilterType::Triangle);
        let side = side as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        input.into_tensor()
    }

    fn decode(&self, outputs: TVec<TValue>) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output was not rank 3")?;
        let found = decode_predictions(
            view,
            &self.class_names,
            self.input_size,
            self.confidence_floor,
        )?;
        Ok(non_max_suppression(found))
    }
}

/// Pick the configured override, else the embedded names.
fn resolve_class_names(
    embedded: Option<Vec<String>>,
    configured: Option<Vec<String>>,
) -> Result<Vec<String>> {
    match (configured, embedded) {
        (Some(configured), Some(embedded)) => {
            if configured.len() != embedded.len() {
                log::warn!(
                    "configured class_names has {} entries but the model declares {}",
                    configured.len(),
                    embedded.len()
                );
            }
            Ok(configured)
        }
        (Some(configured), None) => Ok(configured),
        (None, Some(embedded)) => Ok(embedded),
        (None, None) => Err(anyhow!(
            "model has no '{}' metadata; set model.class_names",
            NAMES_METADATA_KEY
        )),
    }
}

/// Parse the exporter's Python-literal dict, e.g. `{0: 'battery', 1: 'can'}`.
///
/// Indices must cover `0..n` exactly; the result is ordered by index.
fn parse_names_metadata(raw: &str) -> Result<Vec<String>> {
    let body = raw
        .trim()
        .strip_prefix('{')
        .and_then(|r| r.strip_suffix('}'))
        .ok_or_else(|| anyhow!("expected a {{index: name}} dict, got '{}'", raw))?;

    let mut entries = BTreeMap::new();
    let mut rest = body.trim_start();
    while !rest.is_empty() {
        let (index, after) = rest
            .split_once(':')
            .ok_or_else(|| anyhow!("missing ':' in '{}'", rest))?;
        let index: usize = index
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid class index '{}'", index.trim()))?;

        let after = after.trim_start();
        let quote = after
            .chars()
            .next()
            .filter(|c| *c == '\'' || *c == '"')
            .ok_or_else(|| anyhow!("name for class {} is not quoted", index))?;
        let after = &after[1..];
        let end = after
            .find(quote)
            .ok_or_else(|| anyhow!("unterminated name for class {}", index))?;
        if entries.insert(index, after[..end].to_string()).is_some() {
            return Err(anyhow!("class {} is named twice", index));
        }

        rest = after[end + 1..].trim_start();
        rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }

    if entries.is_empty() {
        return Err(anyhow!("names dict is empty"));
    }
    entries
        .into_iter()
        .enumerate()
        .map(|(expected, (index, name))| {
            if expected == index {
                Ok(name)
            } else {
                Err(anyhow!("names dict is missing class {}", expected))
            }
        })
        .collect()
}

/// Turn a `1×(4+C)×N` prediction tensor into candidate detections.
///
/// Each candidate takes its highest-scoring class; candidates under `floor`
/// are dropped. Boxes are converted from centre/size in input pixels to a
/// normalized top-left box.
fn decode_predictions(
    view: tract_ndarray::ArrayView3<f32>,
    class_names: &[String],
    input_size: u32,
    floor: f32,
) -> Result<Vec<Detection>> {
    let (_, rows, candidates) = view.dim();
    if rows < 5 {
        return Err(anyhow!("model output has {} rows, expected 4 + classes", rows));
    }
    let classes = rows - 4;
    if classes > class_names.len() {
        return Err(anyhow!(
            "model reports {} classes but only {} class names are known",
            classes,
            class_names.len()
        ));
    }

    let scale = input_size as f32;
    let mut found = Vec::new();
    for i in 0..candidates {
        let (class_id, score) = (0..classes)
            .map(|c| (c, view[[0, 4 + c, i]]))
            .fold((0, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
        if !score.is_finite() || score < floor {
            continue;
        }
        let cx = view[[0, 0, i]] / scale;
        let cy = view[[0, 1, i]] / scale;
        let w = view[[0, 2, i]] / scale;
        let h = view[[0, 3, i]] / scale;
        found.push(Detection {
            label: class_names[class_id].clone(),
            confidence: score,
            x: cx - w / 2.0,
            y: cy - h / 2.0,
            w,
            h,
        });
    }
    Ok(found)
}

/// Greedy per-label NMS, highest score first.
fn non_max_suppression(mut candidates: Vec<Detection>) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::new();
    for candidate in candidates {
        let suppressed = kept
            .iter()
            .any(|k| k.label == candidate.label && k.iou(&candidate) > NMS_IOU_THRESHOLD);
        if !suppressed {
            kept.push(candidate);
            if kept.len() == MAX_DETECTIONS {
                break;
            }
        }
    }
    kept
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs)
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size as usize;
        let blank = tract_ndarray::Array4::<f32>::zeros((1, 3, side, side)).into_tensor();
        self.model
            .run(tvec!(blank.into()))
            .context("ONNX warm-up run failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, confidence: f32, x: f32) -> Detection {
        Detection {
            label: label.into(),
            confidence,
            x,
            y: 0.0,
            w: 0.2,
            h: 0.2,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    // Three candidates over two classes, input side 100.
    fn predictions() -> tract_ndarray::Array3<f32> {
        #[rustfmt::skip]
        let data = vec![
            50.0, 10.0, 70.0, // cx
            50.0, 10.0, 70.0, // cy
            20.0, 10.0, 10.0, // w
            40.0, 10.0, 10.0, // h
            0.2, 0.8, 0.1,    // can
            0.9, 0.1, 0.2,    // battery
        ];
        tract_ndarray::Array3::from_shape_vec((1, 6, 3), data).unwrap()
    }

    #[test]
    fn nms_keeps_best_of_overlapping_same_label() {
        let kept = non_max_suppression(vec![
            det("can", 0.7, 0.0),
            det("can", 0.9, 0.01),
            det("battery", 0.8, 0.0),
        ]);
        let labels: Vec<(&str, f32)> = kept
            .iter()
            .map(|d| (d.label.as_str(), d.confidence))
            .collect();
        assert_eq!(labels, vec![("can", 0.9), ("battery", 0.8)]);
    }

    #[test]
    fn decode_takes_argmax_class_and_converts_boxes() {
        let output = predictions();
        let found =
            decode_predictions(output.view(), &names(&["can", "battery"]), 100, 0.5).unwrap();

        assert_eq!(found.len(), 2);
        let battery = &found[0];
        assert_eq!(battery.label, "battery");
        assert!(close(battery.confidence, 0.9));
        assert!(close(battery.x, 0.4) && close(battery.y, 0.3));
        assert!(close(battery.w, 0.2) && close(battery.h, 0.4));

        let can = &found[1];
        assert_eq!(can.label, "can");
        assert!(close(can.x, 0.05) && close(can.y, 0.05));
    }

    #[test]
    fn decode_rejects_more_classes_than_names() {
        let output = predictions();
        assert!(decode_predictions(output.view(), &names(&["can"]), 100, 0.5).is_err());

        let too_few_rows = tract_ndarray::Array3::<f32>::zeros((1, 4, 3));
        assert!(decode_predictions(too_few_rows.view(), &names(&["can"]), 100, 0.5).is_err());
    }

    #[test]
    fn parses_exported_names_dict() {
        let parsed =
            parse_names_metadata("{0: 'battery', 1: \"can\", 2: 'light_bulb'}").unwrap();
        assert_eq!(parsed, names(&["battery", "can", "light_bulb"]));

        let reordered = parse_names_metadata("{1: 'can', 0: 'battery',}").unwrap();
        assert_eq!(reordered, names(&["battery", "can"]));
    }

    #[test]
    fn rejects_malformed_names_dict() {
        for raw in ["", "{}", "[0, 1]", "{0: 'a', 2: 'c'}", "{0: a}", "{0: 'a', 0: 'b'}", "{x: 'a'}"] {
            assert!(parse_names_metadata(raw).is_err(), "{:?} accepted", raw);
        }
    }

    #[test]
    fn configured_names_override_embedded_ones() {
        let resolved =
            resolve_class_names(Some(names(&["a", "b"])), Some(names(&["x", "y"]))).unwrap();
        assert_eq!(resolved, names(&["x", "y"]));
        assert_eq!(
            resolve_class_names(Some(names(&["a"])), None).unwrap(),
            names(&["a"])
        );
        assert!(resolve_class_names(None, None).is_err());
    }

    #[test]
    fn missing_model_file_fails_to_load() {
        let result = TractBackend::new("/nonexistent/best.onnx", 640, None);
        assert!(result.is_err());
    }
}
