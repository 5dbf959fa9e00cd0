//! Object detection: the model seam and the classifier adapter built on it.

mod backend;
mod backends;
mod classifier;
mod result;

pub use backend::DetectorBackend;
pub use backends::{ScriptedFrame, StubBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use classifier::{
    load_backend, Classification, Classifier, DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use result::{Detection, DetectionSet, Label};
