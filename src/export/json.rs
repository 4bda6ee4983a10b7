use indexmap::IndexMap;
use serde_json::{Map, Number, Value as JsonValue};

use super::types::{OutputFormat, Serializer};
use crate::compile::{ProjectedSchema, Record, TableRegistry, Value};
use crate::error::{CompileError, Result};
use crate::schema::{DeclaredType, ElementType, FieldDef, Primitive};
use crate::sheet::SheetKind;

/// Component names of vector values
pub const VECTOR_COMPONENTS: [&str; 4] = ["x", "y", "z", "w"];

pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn serialize(&self, schema: &ProjectedSchema, records: &[Record]) -> Result<Vec<u8>> {
        let tree = to_json_tree(schema, records);
        let mut bytes = serde_json::to_vec_pretty(&tree)
            .map_err(|e| CompileError::io(format!("Failed to encode JSON: {}", e)))?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Value tree shared by the JSON and YAML serializers: an array of objects for DATA
/// tables, a single object for KV tables.
pub fn to_json_tree(schema: &ProjectedSchema, records: &[Record]) -> JsonValue {
    let objects: Vec<JsonValue> = records
        .iter()
        .map(|record| record_to_json(schema, record))
        .collect();

    match schema.kind {
        SheetKind::Kv => objects
            .into_iter()
            .next()
            .unwrap_or_else(|| JsonValue::Object(Map::new())),
        _ => JsonValue::Array(objects),
    }
}

fn record_to_json(schema: &ProjectedSchema, record: &Record) -> JsonValue {
    let mut object = Map::new();
    for field in &schema.fields {
        let value = record.get(&field.name).unwrap_or(&Value::Null);
        object.insert(field.name.clone(), value_to_json(value));
    }
    JsonValue::Object(object)
}

pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Int(i) => JsonValue::Number((*i).into()),
        Value::Float(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Str(s) => JsonValue::String(s.clone()),
        Value::Vector(components) => {
            let mut object = Map::new();
            for (name, component) in VECTOR_COMPONENTS.iter().zip(components) {
                object.insert(
                    name.to_string(),
                    Number::from_f64(*component)
                        .map(JsonValue::Number)
                        .unwrap_or(JsonValue::Null),
                );
            }
            JsonValue::Object(object)
        }
        Value::List(items) => JsonValue::Array(items.iter().map(value_to_json).collect()),
        Value::Enum { value, .. } => JsonValue::Number((*value).into()),
    }
}

/// Read a JSON artifact back into typed values. Enum integers are mapped back to their
/// symbols through `registry`.
pub fn decode_json(
    bytes: &[u8],
    schema: &ProjectedSchema,
    registry: &TableRegistry,
) -> Result<Vec<IndexMap<String, Value>>> {
    let tree: JsonValue = serde_json::from_slice(bytes)
        .map_err(|e| CompileError::type_error(format!("Invalid JSON artifact: {}", e)))?;

    let objects = match (schema.kind, tree) {
        (SheetKind::Kv, object @ JsonValue::Object(_)) => vec![object],
        (_, JsonValue::Array(items)) => items,
        _ => {
            return Err(CompileError::type_error(format!(
                "JSON artifact of '{}' has the wrong shape",
                schema.name
            )))
        }
    };

    objects
        .iter()
        .map(|object| {
            let mut values = IndexMap::new();
            for field in &schema.fields {
                let json = object.get(&field.name).unwrap_or(&JsonValue::Null);
                values.insert(field.name.clone(), decode_field(json, field, registry)?);
            }
            Ok(values)
        })
        .collect()
}

fn decode_field(json: &JsonValue, field: &FieldDef, registry: &TableRegistry) -> Result<Value> {
    let bad = || {
        CompileError::type_error(format!(
            "field '{}' does not hold a {}",
            field.name, field.declared
        ))
    };
    match &field.declared {
        DeclaredType::Primitive(p) => decode_primitive(json, *p).ok_or_else(bad),
        DeclaredType::Vector(n) => decode_vector(json, *n).ok_or_else(bad),
        DeclaredType::List(element) => {
            let items = json.as_array().ok_or_else(bad)?;
            items
                .iter()
                .map(|item| {
                    match element {
                        ElementType::Primitive(p) => decode_primitive(item, *p),
                        ElementType::Vector(n) => decode_vector(item, *n),
                    }
                    .ok_or_else(bad)
                })
                .collect::<Result<Vec<_>>>()
                .map(Value::List)
        }
        DeclaredType::EnumRef(name) => {
            let value = json.as_i64().ok_or_else(bad)?;
            registry
                .enum_table(name)
                .and_then(|table| table.by_value(value))
                .map(|entry| Value::Enum {
                    symbol: entry.symbol.clone(),
                    value,
                })
                .ok_or_else(|| {
                    CompileError::unresolved(format!("{} is not a value of enum '{}'", value, name))
                })
        }
        DeclaredType::LinkRef { key, .. } => {
            if json.is_null() {
                Ok(Value::Null)
            } else {
                decode_primitive(json, *key).ok_or_else(bad)
            }
        }
    }
}

fn decode_primitive(json: &JsonValue, p: Primitive) -> Option<Value> {
    match p {
        Primitive::Bool => json.as_bool().map(Value::Bool),
        Primitive::String => json.as_str().map(|s| Value::Str(s.to_string())),
        p if p.is_integral() => json.as_i64().map(Value::Int),
        _ => json.as_f64().map(Value::Float),
    }
}

fn decode_vector(json: &JsonValue, arity: u8) -> Option<Value> {
    let object = json.as_object()?;
    VECTOR_COMPONENTS[..arity as usize]
        .iter()
        .map(|name| object.get(*name).and_then(JsonValue::as_f64))
        .collect::<Option<Vec<f64>>>()
        .map(Value::Vector)
}
