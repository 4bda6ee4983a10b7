//! Gable compiles spreadsheet table definitions into typed data artifacts and
//! accessor code for consuming languages.

pub mod error;
pub mod sheet;
pub mod schema;
pub mod compile;
pub mod export;
pub mod codegen;
pub mod build;

pub use build::{
    BuildConfig, BuildOrchestrator, BuildOutcome, BuildReport, BuildStage, BuildTarget,
    CancelToken, Diagnostic, FsSink, MemorySink,
};
pub use error::{CellLocation, CompileError, ErrorKind, Result};
