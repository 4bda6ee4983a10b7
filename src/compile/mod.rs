//! Compile module: typed records from parsed schemas.
//!
//! This module provides:
//! - Typed values, records and the write-once table registry
//! - Cell coercion against declared types
//! - Row-ordered record building with key and link checks
//! - Per-platform field projection

pub mod types;
pub mod coerce;
pub mod records;
pub mod filter;

pub use types::*;
pub use coerce::TypeCoercer;
pub use records::RecordBuilder;
pub use filter::{ProjectedSchema, TargetFilter, ALL_PLATFORMS};
