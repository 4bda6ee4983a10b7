//! Export module: data artifacts from compiled tables.
//!
//! This module provides:
//! - Output format tags and the `Serializer` trait
//! - JSON and YAML structured text, with a JSON reader for verification
//! - CSV tabular text
//! - Binary tagged records in protobuf wire format

pub mod types;
pub mod json;
pub mod yaml;
pub mod csv;
pub mod binary;

pub use types::*;
pub use json::{decode_json, JsonSerializer};
pub use yaml::YamlSerializer;
pub use csv::CsvSerializer;
pub use binary::BinarySerializer;

/// Serializer for a format
pub fn serializer_for(format: OutputFormat) -> &'static dyn Serializer {
    match format {
        OutputFormat::Json => &JsonSerializer,
        OutputFormat::Yaml => &YamlSerializer,
        OutputFormat::Csv => &CsvSerializer,
        OutputFormat::Binary => &BinarySerializer,
    }
}
