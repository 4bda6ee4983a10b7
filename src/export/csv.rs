use super::types::{OutputFormat, Serializer};
use crate::compile::coerce::{LIST_SEPARATOR, VECTOR_LIST_SEPARATOR, VECTOR_SEPARATOR};
use crate::compile::{ProjectedSchema, Record, Value};
use crate::error::{CompileError, Result};
use crate::sheet::SheetKind;

/// Tabular text. DATA tables keep the sheet's description, field and type rows above the
/// data; KV tables become `field,type,value` rows.
pub struct CsvSerializer;

impl Serializer for CsvSerializer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Csv
    }

    fn serialize(&self, schema: &ProjectedSchema, records: &[Record]) -> Result<Vec<u8>> {
        let mut writer = ::csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());

        let rows = match schema.kind {
            SheetKind::Kv => kv_rows(schema, records),
            _ => data_rows(schema, records),
        };
        for row in rows {
            writer
                .write_record(&row)
                .map_err(|e| CompileError::io(format!("Failed to encode CSV: {}", e)))?;
        }

        writer
            .into_inner()
            .map_err(|e| CompileError::io(format!("Failed to encode CSV: {}", e)))
    }
}

fn data_rows(schema: &ProjectedSchema, records: &[Record]) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = vec![
        schema.fields.iter().map(|f| f.description.clone()).collect(),
        schema.fields.iter().map(|f| f.name.clone()).collect(),
        schema.fields.iter().map(|f| f.declared.to_string()).collect(),
    ];
    for record in records {
        rows.push(
            schema
                .fields
                .iter()
                .map(|f| record.get(&f.name).map(cell_text).unwrap_or_default())
                .collect(),
        );
    }
    rows
}

fn kv_rows(schema: &ProjectedSchema, records: &[Record]) -> Vec<Vec<String>> {
    let mut rows = vec![vec!["field".to_string(), "type".to_string(), "value".to_string()]];
    let record = records.first();
    for field in &schema.fields {
        let value = record
            .and_then(|r| r.get(&field.name))
            .map(cell_text)
            .unwrap_or_default();
        rows.push(vec![field.name.clone(), field.declared.to_string(), value]);
    }
    rows
}

/// Flatten a value into one cell using the sheet delimiters.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Str(s) => s.clone(),
        Value::Vector(components) => join(components.iter().map(|c| c.to_string()), VECTOR_SEPARATOR),
        Value::List(items) => {
            let separator = match items.first() {
                Some(Value::Vector(_)) => VECTOR_LIST_SEPARATOR,
                _ => LIST_SEPARATOR,
            };
            join(items.iter().map(cell_text), separator)
        }
        Value::Enum { value, .. } => value.to_string(),
    }
}

fn join(parts: impl Iterator<Item = String>, separator: char) -> String {
    parts.collect::<Vec<_>>().join(&separator.to_string())
}
