use super::json::to_json_tree;
use super::types::{OutputFormat, Serializer};
use crate::compile::{ProjectedSchema, Record};
use crate::error::{CompileError, Result};

/// Same value tree as the JSON serializer, rendered as YAML
pub struct YamlSerializer;

impl Serializer for YamlSerializer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Yaml
    }

    fn serialize(&self, schema: &ProjectedSchema, records: &[Record]) -> Result<Vec<u8>> {
        let tree = to_json_tree(schema, records);
        let mut text = serde_yaml::to_string(&tree)
            .map_err(|e| CompileError::io(format!("Failed to encode YAML: {}", e)))?;
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text.into_bytes())
    }
}
