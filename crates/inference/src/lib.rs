//! Real-time semantic segmentation over an external graph-compilation
//! engine.
//!
//! A [`SegmentationPipeline`] owns one compiled graph, its pinned transfer
//! buffers, and an execution stream. Construction builds or restores the
//! compiled artifact through a fingerprinted on-disk cache; each `infer`
//! call letterboxes and normalizes a frame, runs the graph, and reduces the
//! logits to a per-pixel class map on the device or on the host.

pub mod buffers;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod pipeline;
pub mod postprocessing;
pub mod shape;

pub use config::PipelineConfig;
pub use engine::{ExecutionContext, ExecutionEngine, MockEngine};
pub use error::{PipelineError, Result};
pub use pipeline::{SegmentationMask, SegmentationPipeline};
pub use postprocessing::ReductionStrategy;
pub use shape::ShapeDescriptor;
