//! Schema module: what a sheet declares.
//!
//! This module provides:
//! - The declared type grammar (primitives, vectors, lists, enum and link references)
//! - Field, key and table schema definitions
//! - One parser per sheet kind

pub mod types;
pub mod parser;

pub use types::*;
pub use parser::{parse_sheet, parser_for, DataSheetParser, EnumSheetParser, KvSheetParser, SheetParser};
