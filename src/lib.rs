//! Waste Sorter
//!
//! Classifies objects seen in a live video stream into three disjoint waste
//! categories (recyclable, non-recyclable, hazardous) and drives a transient
//! display that clears itself after a fixed delay.
//!
//! # Data flow
//!
//! ```text
//! FrameSource -> StreamLoop -> Classifier -> DetectionSetTracker
//!                                                 | (on change)
//!                                                 v
//!                          partition -> DisplayStateMachine -> PresentationSink
//!                                                 |
//!                                                 +-> expiry task (clears all)
//! ```
//!
//! # Module Structure
//!
//! - `category`: label to category table and the default waste lists
//! - `detect`: detector backends and the confidence-filtering classifier
//! - `ingest`: frame sources (synthetic, V4L2 webcams, local files)
//! - `tracker` / `partition`: change gating and per-category split
//! - `display`: bucket state, rendering, expiry timers, presentation sinks
//! - `stream`: the frame loop, stop signal and per-session context

pub mod category;
pub mod config;
pub mod detect;
pub mod display;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod partition;
pub mod stream;
pub mod tracker;
pub mod ui;

pub use category::{Category, CategoryLists, CategoryTable};
pub use config::{ExpirySettings, ModelSettings, SorterConfig, SourceSettings};
pub use detect::{
    load_backend, Classification, Classifier, Detection, DetectionSet, DetectorBackend, Label,
    ScriptedFrame, StubBackend,
};
pub use display::{
    ConsoleSink, DisplayStateMachine, ExpiryPolicy, MemorySink, PresentationSink, RenderedBlock,
    SinkEvent,
};
pub use error::{SorterError, SorterResult};
pub use frame::Frame;
pub use ingest::{open_source, FrameSource, SourceStats, SyntheticSource};
pub use partition::{partition, Partition};
pub use stream::{FrameOutcome, RunReport, StopSignal, StreamLoop, StreamSession, Termination};
pub use tracker::{DetectionSetTracker, SetUpdate};
