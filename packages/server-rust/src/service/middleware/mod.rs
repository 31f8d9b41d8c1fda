//! Tower middleware for the invocation pipeline.
//!
//! - [`instrument`]: per-invocation span, timing, and metrics
//! - [`pipeline`]: composes the layers around the dispatcher

pub mod instrument;
pub mod pipeline;

pub use instrument::InstrumentLayer;
pub use pipeline::{build_invocation_pipeline, InvocationPipeline};
