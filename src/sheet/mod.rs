//! Sheet module: raw cell grids and where they come from.
//!
//! This module provides:
//! - The fixed row/column layouts of DATA, KV and ENUM sheets
//! - Reading workbooks and CSV files into grids
//! - Workspace discovery and sheet classification

pub mod types;
pub mod reader;
pub mod discover;

// Re-export commonly used types and functions
pub use types::*;
pub use reader::read_sheets;
pub use discover::{classify, discover_workspace};
