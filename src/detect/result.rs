use std::collections::BTreeSet;

/// Opaque class identifier produced by the model, e.g. `plastic_bottle`.
pub type Label = String;

/// Distinct labels seen in one frame above the confidence threshold.
///
/// Ordered so that rendering and logging are deterministic; comparisons
/// only ever use membership.
pub type DetectionSet = BTreeSet<Label>;

/// One detected region.
///
/// Box coordinates are normalized to 0..1 (top-left origin). Boxes and
/// scores feed the overlay only; classification works on labels alone.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: Label,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Detection {
    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &Detection) -> f32 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.w).min(other.x + other.w);
        let bottom = (self.y + self.h).min(other.y + other.h);
        let intersection = (right - left).max(0.0) * (bottom - top).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}
