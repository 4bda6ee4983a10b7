//! Build module: the compile run from sheets to artifacts.
//!
//! This module provides:
//! - Build targets and the explicit run configuration
//! - The stage machine, diagnostics and the build report
//! - DATA table planning with link-cycle detection
//! - Cooperative cancellation and artifact sinks
//! - The orchestrator that ties parsing, building and export together

pub mod types;
pub mod cancel;
pub mod sink;
pub mod plan;
pub mod orchestrator;

// Re-export commonly used types and functions
pub use types::*;
pub use cancel::CancelToken;
pub use sink::{checksum, ArtifactSink, FsSink, MemorySink};
pub use plan::{plan_data_tables, DataPlan};
pub use orchestrator::{resolve_target, BuildOrchestrator, BuildOutcome, ResolvedTarget};
