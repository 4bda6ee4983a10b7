use prost::encoding::{encode_key, encode_varint, WireType};

use super::types::{OutputFormat, Serializer};
use crate::compile::{ProjectedSchema, Record, Value};
use crate::error::Result;
use crate::sheet::SheetKind;

/// Top-level field holding the repeated record messages of a DATA table
pub const RECORDS_FIELD: u32 = 1;

/// Binary tagged records in protobuf wire format.
///
/// DATA tables encode as a message whose field 1 repeats one nested message per record;
/// KV tables encode their fields at the top level. A field's tag is its 1-based position
/// in the full schema, so projecting or appending fields never renumbers existing tags.
pub struct BinarySerializer;

impl Serializer for BinarySerializer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Binary
    }

    fn serialize(&self, schema: &ProjectedSchema, records: &[Record]) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        match schema.kind {
            SheetKind::Kv => {
                if let Some(record) = records.first() {
                    encode_record(schema, record, &mut buf);
                }
            }
            _ => {
                for record in records {
                    let mut message = Vec::new();
                    encode_record(schema, record, &mut message);
                    encode_bytes(RECORDS_FIELD, &message, &mut buf);
                }
            }
        }
        Ok(buf)
    }
}

fn encode_record(schema: &ProjectedSchema, record: &Record, buf: &mut Vec<u8>) {
    for field in &schema.fields {
        if let Some(value) = record.get(&field.name) {
            encode_value(field.tag, value, buf);
        }
    }
}

fn encode_value(tag: u32, value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => {}
        Value::Int(i) => {
            encode_key(tag, WireType::Varint, buf);
            encode_varint(*i as u64, buf);
        }
        Value::Enum { value, .. } => {
            encode_key(tag, WireType::Varint, buf);
            encode_varint(*value as u64, buf);
        }
        Value::Bool(b) => {
            encode_key(tag, WireType::Varint, buf);
            encode_varint(u64::from(*b), buf);
        }
        Value::Float(f) => encode_fixed32(tag, *f, buf),
        Value::Str(s) => encode_bytes(tag, s.as_bytes(), buf),
        Value::Vector(components) => {
            let mut message = Vec::new();
            for (i, component) in components.iter().enumerate() {
                encode_fixed32(i as u32 + 1, *component, &mut message);
            }
            encode_bytes(tag, &message, buf);
        }
        // Unpacked: one entry per element under the same tag
        Value::List(items) => {
            for item in items {
                encode_value(tag, item, buf);
            }
        }
    }
}

fn encode_fixed32(tag: u32, value: f64, buf: &mut Vec<u8>) {
    encode_key(tag, WireType::ThirtyTwoBit, buf);
    buf.extend_from_slice(&(value as f32).to_le_bytes());
}

fn encode_bytes(tag: u32, bytes: &[u8], buf: &mut Vec<u8>) {
    encode_key(tag, WireType::LengthDelimited, buf);
    encode_varint(bytes.len() as u64, buf);
    buf.extend_from_slice(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::TargetFilter;
    use crate::schema::{DeclaredType, FieldDef, FieldSource, KeySpec, PlatformSet, TableSchema};

    fn field(name: &str, ty: &str, platforms: &str, tag: u32) -> FieldDef {
        FieldDef {
            name: name.into(),
            declared: DeclaredType::parse(ty).unwrap(),
            platforms: PlatformSet::parse(platforms),
            description: String::new(),
            tag,
            source: FieldSource::Column(tag - 1),
        }
    }

    fn record(values: Vec<(&str, Value)>) -> Record {
        Record {
            row: 5,
            values: values.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    #[test]
    fn test_data_records_nest_under_field_one() {
        let schema = TableSchema {
            name: "Player".into(),
            kind: SheetKind::Data,
            fields: vec![field("id", "int", "", 1), field("name", "string", "", 2)],
            key: KeySpec(vec!["id".into()]),
        };
        let projected = TargetFilter::default().project(&schema);
        let records = vec![record(vec![("id", Value::Int(150)), ("name", Value::Str("Hi".into()))])];

        let bytes = BinarySerializer.serialize(&projected, &records).unwrap();
        // 0x0a = field 1 length-delimited; inner: 0x08 0x96 0x01 = field 1 varint 150,
        // 0x12 0x02 'H' 'i' = field 2 string
        assert_eq!(bytes, vec![0x0a, 0x07, 0x08, 0x96, 0x01, 0x12, 0x02, b'H', b'i']);
    }

    #[test]
    fn test_projection_keeps_original_tags() {
        let schema = TableSchema {
            name: "Player".into(),
            kind: SheetKind::Data,
            fields: vec![
                field("id", "int", "", 1),
                field("secret", "int", "server", 2),
                field("hp", "int", "", 3),
            ],
            key: KeySpec(vec!["id".into()]),
        };
        let client = TargetFilter::for_tag("client").project(&schema);
        let records = vec![record(vec![
            ("id", Value::Int(1)),
            ("secret", Value::Int(9)),
            ("hp", Value::Int(2)),
        ])];

        let bytes = BinarySerializer.serialize(&client, &records).unwrap();
        assert_eq!(bytes, vec![0x0a, 0x04, 0x08, 0x01, 0x18, 0x02]);
    }

    #[test]
    fn test_kv_fields_at_top_level() {
        let schema = TableSchema {
            name: "GameConst".into(),
            kind: SheetKind::Kv,
            fields: vec![field("map_height", "float", "", 1), field("link", "int", "", 2)],
            key: KeySpec::default(),
        };
        let projected = TargetFilter::default().project(&schema);
        let records = vec![record(vec![("map_height", Value::Float(12.5)), ("link", Value::Null)])];

        let bytes = BinarySerializer.serialize(&projected, &records).unwrap();
        let mut expected = vec![0x0d];
        expected.extend_from_slice(&12.5f32.to_le_bytes());
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_lists_and_vectors() {
        let mut buf = Vec::new();
        encode_value(3, &Value::List(vec![Value::Int(1), Value::Int(-1)]), &mut buf);
        let mut expected = vec![0x18, 0x01, 0x18];
        expected.extend_from_slice(&[0xff; 9]);
        expected.push(0x01);
        assert_eq!(buf, expected);

        let mut buf = Vec::new();
        encode_value(2, &Value::Vector(vec![1.0, 2.0]), &mut buf);
        let mut expected = vec![0x12, 0x0a, 0x0d];
        expected.extend_from_slice(&1.0f32.to_le_bytes());
        expected.push(0x15);
        expected.extend_from_slice(&2.0f32.to_le_bytes());
        assert_eq!(buf, expected);
    }
}
