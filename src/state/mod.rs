//! State module for tracking ingestion progress
//!
//! # Components
//!
//! - `PipelineState`: Where one source's run is (fetching, extracting, reconciling, stopped)
//! - `StopReason`: Why pagination ended
//! - `SourceState`: Per-source request pacing

mod pipeline_state;
mod source_state;

// Re-export main types
pub use pipeline_state::{PipelineState, StopReason};
pub use source_state::SourceState;
