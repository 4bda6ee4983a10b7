use std::fmt::{Result, Write};

use super::types::*;
use super::{write_doc, DocStyle};
use crate::schema::{EnumTable, Primitive};

const RESERVED: &[&str] = &[
    "as", "break", "case", "catch", "class", "continue", "do", "else", "enum", "extend",
    "false", "finally", "for", "foreign", "func", "if", "import", "in", "init", "interface",
    "is", "let", "macro", "main", "match", "mut", "None", "open", "operator", "package",
    "private", "prop", "protected", "public", "quote", "return", "Some", "spawn", "static",
    "struct", "super", "synchronized", "this", "throw", "true", "try", "type", "unsafe", "var",
    "where", "while",
];

pub const PACKAGE: &str = "gable";

pub struct CangjieEmitter;

fn ident(name: &str) -> String {
    safe_ident(name, RESERVED)
}

impl NativeTypes for CangjieEmitter {
    fn primitive(&self, p: Primitive) -> String {
        match p {
            Primitive::Int | Primitive::Time => "Int32",
            Primitive::Long | Primitive::Date => "Int64",
            Primitive::Float | Primitive::Percent | Primitive::Permille | Primitive::Permyriad => {
                "Float32"
            }
            Primitive::Bool => "Bool",
            Primitive::String => "String",
        }
        .to_string()
    }

    fn vector(&self, arity: u8) -> String {
        format!("({})", vec!["Float32"; arity as usize].join(", "))
    }

    fn list(&self, element: &str) -> String {
        format!("Array<{}>", element)
    }
}

impl CodeEmitter for CangjieEmitter {
    fn member_name(&self, field: &str) -> String {
        ident(field)
    }

    fn emit_table(&self, table: &TableShape<'_>, out: &mut String) -> Result {
        writeln!(out, "// {}", banner(table.name))?;
        writeln!(out, "package {}", PACKAGE)?;
        writeln!(out)?;
        if table.has_container() {
            writeln!(out, "import std.collection.HashMap")?;
            writeln!(out)?;
        }

        writeln!(out, "public class {} {{", table.name)?;
        for field in table.fields {
            write_doc(out, "    ", DocStyle::Block, &field.description)?;
            writeln!(
                out,
                "    public let {}: {}",
                ident(&field.name),
                self.type_of(&field.declared)
            )?;
        }
        writeln!(out)?;
        let params: Vec<String> = table
            .fields
            .iter()
            .map(|f| format!("{}: {}", ident(&f.name), self.type_of(&f.declared)))
            .collect();
        writeln!(out, "    public init({}) {{", params.join(", "))?;
        for field in table.fields {
            let name = ident(&field.name);
            writeln!(out, "        this.{} = {}", name, name)?;
        }
        writeln!(out, "    }}")?;
        writeln!(out, "}}")?;

        if !table.has_container() {
            return Ok(());
        }

        let types = table.nested_types(
            table.name,
            |key| self.type_of(&key.declared),
            |key, inner| format!("HashMap<{}, {}>", key, inner),
        );
        let depth = table.keys.len();

        writeln!(out)?;
        writeln!(out, "public class {} {{", table.container_name())?;
        writeln!(out, "    private let rows = {}()", types[0])?;
        writeln!(out)?;
        writeln!(out, "    public func add(row: {}): Unit {{", table.name)?;
        writeln!(out, "        let c0 = rows")?;
        for (d, key) in table.keys.iter().enumerate().take(depth - 1) {
            let k = ident(&key.name);
            writeln!(out, "        let c{} = match (c{}.get(row.{})) {{", d + 1, d, k)?;
            writeln!(out, "            case Some(m) => m")?;
            writeln!(out, "            case None =>")?;
            writeln!(out, "                let m = {}()", types[d + 1])?;
            writeln!(out, "                c{}.add(row.{}, m)", d, k)?;
            writeln!(out, "                m")?;
            writeln!(out, "        }}")?;
        }
        writeln!(
            out,
            "        c{}.add(row.{}, row)",
            depth - 1,
            ident(&table.keys[depth - 1].name)
        )?;
        writeln!(out, "    }}")?;
        writeln!(out)?;

        let params: Vec<String> = table
            .keys
            .iter()
            .map(|k| format!("{}: {}", ident(&k.name), self.type_of(&k.declared)))
            .collect();
        writeln!(
            out,
            "    public func get({}): ?{} {{",
            params.join(", "),
            table.name
        )?;
        writeln!(out, "        let c0 = rows")?;
        for (d, key) in table.keys.iter().enumerate().take(depth - 1) {
            writeln!(out, "        let c{} = match (c{}.get({})) {{", d + 1, d, ident(&key.name))?;
            writeln!(out, "            case Some(m) => m")?;
            writeln!(out, "            case None => return None")?;
            writeln!(out, "        }}")?;
        }
        writeln!(
            out,
            "        return c{}.get({})",
            depth - 1,
            ident(&table.keys[depth - 1].name)
        )?;
        writeln!(out, "    }}")?;
        writeln!(out, "}}")
    }

    fn emit_enum(&self, table: &EnumTable, out: &mut String) -> Result {
        writeln!(out, "// {}", banner(&table.name))?;
        writeln!(out, "package {}", PACKAGE)?;
        writeln!(out)?;
        writeln!(out, "public enum {} {{", table.name)?;
        for entry in &table.entries {
            write_doc(out, "    ", DocStyle::Block, &entry.description)?;
            writeln!(out, "    | {}", ident(&entry.symbol))?;
        }
        writeln!(out)?;
        writeln!(out, "    public func value(): Int32 {{")?;
        writeln!(out, "        match (this) {{")?;
        for entry in &table.entries {
            writeln!(
                out,
                "            case {} => {}",
                ident(&entry.symbol),
                entry.value
            )?;
        }
        writeln!(out, "        }}")?;
        writeln!(out, "    }}")?;
        writeln!(out, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DeclaredType, EnumEntry, FieldDef, FieldSource, PlatformSet};

    fn field(name: &str, ty: &str) -> FieldDef {
        FieldDef {
            name: name.into(),
            declared: DeclaredType::parse(ty).unwrap(),
            platforms: PlatformSet::all(),
            description: String::new(),
            tag: 1,
            source: FieldSource::Column(0),
        }
    }

    #[test]
    fn test_class_with_init_and_container() {
        let fields = vec![field("id", "int"), field("pos", "vector3"), field("ids", "long[]")];
        let shape = TableShape { name: "Spawn", fields: &fields, keys: vec![&fields[0]] };
        let mut out = String::new();
        CangjieEmitter.emit_table(&shape, &mut out).unwrap();

        assert!(out.contains("    public let id: Int32\n"));
        assert!(out.contains("    public let pos: (Float32, Float32, Float32)\n"));
        assert!(out.contains("    public let ids: Array<Int64>\n"));
        assert!(out.contains(
            "    public init(id: Int32, pos: (Float32, Float32, Float32), ids: Array<Int64>) {\n"
        ));
        assert!(out.contains("    private let rows = HashMap<Int32, Spawn>()\n"));
        assert!(out.contains("    public func get(id: Int32): ?Spawn {\n        let c0 = rows\n        return c0.get(id)\n"));
    }

    #[test]
    fn test_enum_value_mapping() {
        let table = EnumTable {
            name: "EPlayerType".into(),
            entries: vec![
                EnumEntry { symbol: "None".into(), value: 0, description: String::new() },
                EnumEntry { symbol: "Hero".into(), value: 2, description: String::new() },
            ],
        };
        let mut out = String::new();
        CangjieEmitter.emit_enum(&table, &mut out).unwrap();
        assert!(out.contains("    | None_\n    | Hero\n"));
        assert!(out.contains("            case Hero => 2\n"));
    }
}
