use serde::{Deserialize, Serialize};

use crate::compile::{ProjectedSchema, Record};
use crate::error::Result;

/// Data artifact formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Structured text
    Json,
    /// Structured text, YAML flavour
    Yaml,
    /// Tabular text
    Csv,
    /// Binary tagged records (protobuf wire format)
    Binary,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Json,
        OutputFormat::Yaml,
        OutputFormat::Csv,
        OutputFormat::Binary,
    ];

    /// Parse a format tag, case-insensitively.
    pub fn parse(tag: &str) -> Option<OutputFormat> {
        let format = match tag.trim().to_ascii_lowercase().as_str() {
            "json" | "structured-text" => OutputFormat::Json,
            "yaml" | "yml" => OutputFormat::Yaml,
            "csv" | "tabular-text" => OutputFormat::Csv,
            "binary" | "bin" | "protobuf" | "binary-tagged-record" => OutputFormat::Binary,
            _ => return None,
        };
        Some(format)
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Csv => "csv",
            OutputFormat::Binary => "bin",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encodes a projected schema and its records. Output must depend only on the inputs.
pub trait Serializer: Send + Sync {
    fn format(&self) -> OutputFormat;

    /// Fields outside the projection are skipped on every record.
    fn serialize(&self, schema: &ProjectedSchema, records: &[Record]) -> Result<Vec<u8>>;
}

/// File name of a table's data artifact
pub fn artifact_file_name(table: &str, format: OutputFormat) -> String {
    format!("{}.{}", table, format.extension())
}
