//! `.proto` schemas describing the binary artifact layout.
//!
//! A record message numbers each field with its tag, so the schema reads the bytes written
//! by the binary serializer as they are. DATA tables also get a `<Table>Table` wrapper
//! whose field 1 repeats the records.

use std::collections::BTreeSet;
use std::fmt::{Result as FmtResult, Write};

use super::types::*;
use super::{write_doc, DocStyle};
use crate::compile::ProjectedSchema;
use crate::error::{CompileError, Result};
use crate::export::binary::RECORDS_FIELD;
use crate::schema::{DeclaredType, ElementType, EnumTable, Primitive};
use crate::sheet::SheetKind;

pub const PACKAGE: &str = "gable";

const VECTOR_AXES: [&str; 4] = ["x", "y", "z", "w"];

/// `<Table>.proto`
pub fn proto_file_name(table: &str) -> String {
    format!("{}.proto", table)
}

struct ProtoTypes;

impl NativeTypes for ProtoTypes {
    fn primitive(&self, p: Primitive) -> String {
        match p {
            Primitive::Int | Primitive::Time => "int32",
            Primitive::Long | Primitive::Date => "int64",
            Primitive::Float | Primitive::Percent | Primitive::Permille | Primitive::Permyriad => {
                "float"
            }
            Primitive::Bool => "bool",
            Primitive::String => "string",
        }
        .to_string()
    }

    fn vector(&self, arity: u8) -> String {
        format!("Vector{}", arity)
    }

    fn list(&self, element: &str) -> String {
        format!("repeated {}", element)
    }
}

/// Lists are written one entry per element, which proto3 only assumes for non-scalar types
fn unpacked(declared: &DeclaredType) -> bool {
    matches!(declared, DeclaredType::List(ElementType::Primitive(p)) if *p != Primitive::String)
}

fn vector_arity(declared: &DeclaredType) -> Option<u8> {
    match declared {
        DeclaredType::Vector(n) | DeclaredType::List(ElementType::Vector(n)) => Some(*n),
        _ => None,
    }
}

fn header(out: &mut String, table: &str) -> FmtResult {
    writeln!(out, "// {}", banner(table))?;
    writeln!(out)?;
    writeln!(out, "syntax = \"proto3\";")?;
    writeln!(out)?;
    writeln!(out, "package {};", PACKAGE)
}

/// Record message (and wrapper for DATA tables) for one projected schema.
pub fn generate_proto_table(schema: &ProjectedSchema) -> Result<GeneratedSource> {
    let mut text = String::new();
    render_table(schema, &mut text).map_err(|e| {
        CompileError::io(format!("failed to render proto schema: {}", e)).in_sheet(&schema.name)
    })?;
    Ok(GeneratedSource {
        file_name: proto_file_name(&schema.name),
        text,
    })
}

fn render_table(schema: &ProjectedSchema, out: &mut String) -> FmtResult {
    header(out, &schema.name)?;

    let imports: BTreeSet<&str> = schema
        .fields
        .iter()
        .filter_map(|f| f.declared.enum_name())
        .collect();
    if !imports.is_empty() {
        writeln!(out)?;
        for name in imports {
            writeln!(out, "import \"{}\";", proto_file_name(name))?;
        }
    }

    writeln!(out)?;
    writeln!(out, "message {} {{", schema.name)?;

    let vectors: BTreeSet<u8> = schema
        .fields
        .iter()
        .filter_map(|f| vector_arity(&f.declared))
        .collect();
    for arity in vectors {
        writeln!(out, "  message Vector{} {{", arity)?;
        for (i, axis) in VECTOR_AXES.iter().take(arity as usize).enumerate() {
            writeln!(out, "    float {} = {};", axis, i + 1)?;
        }
        writeln!(out, "  }}")?;
        writeln!(out)?;
    }

    for field in &schema.fields {
        write_doc(out, "  ", DocStyle::Line("//"), &field.description)?;
        let options = if unpacked(&field.declared) {
            " [packed = false]"
        } else {
            ""
        };
        writeln!(
            out,
            "  {} {} = {}{};",
            ProtoTypes.type_of(&field.declared),
            field.name,
            field.tag,
            options
        )?;
    }
    writeln!(out, "}}")?;

    if schema.kind == SheetKind::Data {
        writeln!(out)?;
        writeln!(out, "message {}Table {{", schema.name)?;
        writeln!(out, "  repeated {} rows = {};", schema.name, RECORDS_FIELD)?;
        writeln!(out, "}}")?;
    }
    Ok(())
}

/// proto3 enum for an enum table. Symbols are prefixed with the enum name since proto
/// enum values share the package scope; a zero value is added when the table has none.
pub fn generate_proto_enum(table: &EnumTable) -> Result<GeneratedSource> {
    if let Some(entry) = table
        .entries
        .iter()
        .find(|e| i32::try_from(e.value).is_err())
    {
        return Err(CompileError::type_error(format!(
            "enum value {} of '{}' does not fit a proto enum",
            entry.value, entry.symbol
        ))
        .in_sheet(&table.name));
    }

    let mut text = String::new();
    render_enum(table, &mut text).map_err(|e| {
        CompileError::io(format!("failed to render proto schema: {}", e)).in_sheet(&table.name)
    })?;
    Ok(GeneratedSource {
        file_name: proto_file_name(&table.name),
        text,
    })
}

fn render_enum(table: &EnumTable, out: &mut String) -> FmtResult {
    header(out, &table.name)?;
    writeln!(out)?;
    writeln!(out, "enum {} {{", table.name)?;

    // proto3 requires the first value to be zero
    match table.by_value(0) {
        Some(zero) => {
            write_doc(out, "  ", DocStyle::Line("//"), &zero.description)?;
            writeln!(out, "  {}_{} = 0;", table.name, zero.symbol)?;
        }
        None => writeln!(out, "  {}_UNSPECIFIED = 0;", table.name)?,
    }
    for entry in table.entries.iter().filter(|e| e.value != 0) {
        write_doc(out, "  ", DocStyle::Line("//"), &entry.description)?;
        writeln!(out, "  {}_{} = {};", table.name, entry.symbol, entry.value)?;
    }
    writeln!(out, "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{Record, TargetFilter, Value};
    use crate::export::binary::BinarySerializer;
    use crate::export::Serializer;
    use crate::schema::{EnumEntry, FieldDef, FieldSource, KeySpec, PlatformSet, TableSchema};
    use pretty_assertions::assert_eq;
    use prost::encoding::{decode_key, decode_varint, skip_field, DecodeContext, WireType};
    use std::collections::BTreeMap;

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

    fn item_schema() -> TableSchema {
        TableSchema {
            name: "Item".into(),
            kind: SheetKind::Data,
            fields: vec![
                field("id", "int", "", 1),
                field("secret", "string", "server", 2),
                field("kind", "enum(EKind)", "", 3),
                field("offset", "vector3", "", 4),
                field("rates", "%[]", "", 5),
                field("tags", "string[]", "", 6),
                field("big", "long", "", 7),
                field("enabled", "bool", "", 8),
            ],
            key: KeySpec(vec!["id".into()]),
        }
    }

    /// Field name to (type, tag) for the fields declared directly in `message`
    fn declared_fields(text: &str, message: &str) -> BTreeMap<String, (String, u32)> {
        let mut fields = BTreeMap::new();
        let mut depth = 0usize;
        let mut inside = false;
        for line in text.lines().map(str::trim) {
            if depth == 0 && line == format!("message {} {{", message) {
                inside = true;
            } else if inside && depth == 1 {
                if let Some((decl, rest)) = line.strip_suffix(';').and_then(|l| l.split_once(" = ")) {
                    let (ty, name) = decl.rsplit_once(' ').unwrap();
                    let tag = rest.split_whitespace().next().unwrap().parse().unwrap();
                    fields.insert(name.to_string(), (ty.to_string(), tag));
                }
            }
            depth += line.matches('{').count();
            depth -= line.matches('}').count();
            if depth == 0 {
                inside = false;
            }
        }
        fields
    }

    fn wire_type_for(proto_type: &str) -> WireType {
        match proto_type.trim_start_matches("repeated ") {
            "int32" | "int64" | "bool" | "EKind" => WireType::Varint,
            "float" => WireType::ThirtyTwoBit,
            _ => WireType::LengthDelimited,
        }
    }

    #[test]
    fn test_proto_tags_match_binary_records() {
        let client = TargetFilter::for_tag("client").project(&item_schema());
        let record = Record {
            row: 5,
            values: [
                ("id", Value::Int(7)),
                ("kind", Value::Enum { symbol: "Rare".into(), value: 2 }),
                ("offset", Value::Vector(vec![1.0, 2.0, 3.0])),
                ("rates", Value::List(vec![Value::Float(0.5), Value::Float(0.25)])),
                ("tags", Value::List(vec![Value::Str("a".into())])),
                ("big", Value::Int(1 << 40)),
                ("enabled", Value::Bool(true)),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        };
        let bytes = BinarySerializer.serialize(&client, &[record]).unwrap();
        let proto = generate_proto_table(&client).unwrap();

        let wrapper = declared_fields(&proto.text, "ItemTable");
        assert_eq!(wrapper.get("rows"), Some(&("repeated Item".to_string(), RECORDS_FIELD)));

        let mut buf = bytes.as_slice();
        let (tag, wire_type) = decode_key(&mut buf).unwrap();
        assert_eq!((tag, wire_type), (RECORDS_FIELD, WireType::LengthDelimited));
        let len = decode_varint(&mut buf).unwrap() as usize;
        let mut message = &buf[..len];

        let declared = declared_fields(&proto.text, "Item");
        let by_tag: BTreeMap<u32, &str> = declared.values().map(|(ty, tag)| (*tag, ty.as_str())).collect();
        let mut seen = BTreeSet::new();
        while !message.is_empty() {
            let (tag, wire_type) = decode_key(&mut message).unwrap();
            let ty = by_tag.get(&tag).unwrap_or_else(|| panic!("tag {} is not in the schema", tag));
            assert_eq!(wire_type, wire_type_for(ty), "tag {}", tag);
            seen.insert(tag);
            skip_field(wire_type, tag, &mut message, DecodeContext::default()).unwrap();
        }
        assert_eq!(seen, by_tag.keys().copied().collect());
        // The server-only field keeps its tag out of the client schema
        assert!(!declared.contains_key("secret"));
        assert_eq!(declared["kind"], ("EKind".to_string(), 3));
    }

    #[test]
    fn test_proto_table_text() {
        let schema = TableSchema {
            name: "GameConst".into(),
            kind: SheetKind::Kv,
            fields: vec![field("spawn", "vector2", "", 1), field("levels", "int[]", "", 2)],
            key: KeySpec::default(),
        };
        let source = generate_proto_table(&TargetFilter::default().project(&schema)).unwrap();
        assert_eq!(source.file_name, "GameConst.proto");
        assert_eq!(
            source.text,
            r#"// Generated by gable from GameConst. Do not edit.

syntax = "proto3";

package gable;

message GameConst {
  message Vector2 {
    float x = 1;
    float y = 2;
  }

  Vector2 spawn = 1;
  repeated int32 levels = 2 [packed = false];
}
"#
        );
    }

    #[test]
    fn test_item_schema_imports_enums() {
        let source = generate_proto_table(&TargetFilter::default().project(&item_schema())).unwrap();
        assert!(source.text.contains("import \"EKind.proto\";"));
        assert!(source.text.contains("  repeated string tags = 6;\n"));
        assert!(source.text.contains("  repeated float rates = 5 [packed = false];\n"));
    }

    #[test]
    fn test_proto_enum_starts_at_zero() {
        let table = EnumTable {
            name: "EKind".into(),
            entries: vec![
                EnumEntry { symbol: "Common".into(), value: 1, description: "Most items".into() },
                EnumEntry { symbol: "Rare".into(), value: 2, description: String::new() },
            ],
        };
        let source = generate_proto_enum(&table).unwrap();
        assert_eq!(source.file_name, "EKind.proto");
        assert!(source.text.ends_with(
            "enum EKind {\n  EKind_UNSPECIFIED = 0;\n  // Most items\n  EKind_Common = 1;\n  EKind_Rare = 2;\n}\n"
        ));

        let with_zero = EnumTable {
            name: "EKind".into(),
            entries: vec![
                EnumEntry { symbol: "Rare".into(), value: 2, description: String::new() },
                EnumEntry { symbol: "None".into(), value: 0, description: String::new() },
            ],
        };
        let text = generate_proto_enum(&with_zero).unwrap().text;
        assert!(text.contains("enum EKind {\n  EKind_None = 0;\n  EKind_Rare = 2;\n}"));
    }

    #[test]
    fn test_proto_enum_rejects_wide_values() {
        let table = EnumTable {
            name: "EWide".into(),
            entries: vec![EnumEntry { symbol: "Huge".into(), value: 1 << 40, description: String::new() }],
        };
        let err = generate_proto_enum(&table).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Type);
    }
}
