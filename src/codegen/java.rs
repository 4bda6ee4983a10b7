use std::fmt::{Result, Write};

use super::types::*;
use super::{write_doc, DocStyle};
use crate::schema::{DeclaredType, EnumTable, Primitive};

const RESERVED: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally",
    "float", "for", "goto", "if", "implements", "import", "instanceof", "int", "interface",
    "long", "native", "new", "package", "private", "protected", "public", "return", "short",
    "static", "strictfp", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "try", "void", "volatile", "while", "true", "false", "null",
];

pub const PACKAGE: &str = "gable";

/// One public class per file; the container is a nested static class.
pub struct JavaEmitter;

fn ident(name: &str) -> String {
    safe_ident(name, RESERVED)
}

impl JavaEmitter {
    /// Boxed spelling used for map keys
    fn boxed(&self, declared: &DeclaredType) -> String {
        match declared {
            DeclaredType::Primitive(p) | DeclaredType::LinkRef { key: p, .. } => match p {
                Primitive::Int | Primitive::Time => "Integer".to_string(),
                Primitive::Long | Primitive::Date => "Long".to_string(),
                Primitive::Bool => "Boolean".to_string(),
                Primitive::String => "String".to_string(),
                _ => "Float".to_string(),
            },
            other => self.type_of(other),
        }
    }
}

impl NativeTypes for JavaEmitter {
    fn primitive(&self, p: Primitive) -> String {
        match p {
            Primitive::Int | Primitive::Time => "int",
            Primitive::Long | Primitive::Date => "long",
            Primitive::Float | Primitive::Percent | Primitive::Permille | Primitive::Permyriad => {
                "float"
            }
            Primitive::Bool => "boolean",
            Primitive::String => "String",
        }
        .to_string()
    }

    fn vector(&self, _arity: u8) -> String {
        "float[]".to_string()
    }

    fn list(&self, element: &str) -> String {
        format!("{}[]", element)
    }
}

impl CodeEmitter for JavaEmitter {
    fn member_name(&self, field: &str) -> String {
        ident(field)
    }

    fn emit_table(&self, table: &TableShape<'_>, out: &mut String) -> Result {
        writeln!(out, "// {}", banner(table.name))?;
        writeln!(out, "package {};", PACKAGE)?;
        writeln!(out)?;
        if table.has_container() {
            writeln!(out, "import java.util.HashMap;")?;
            writeln!(out, "import java.util.Map;")?;
            writeln!(out)?;
        }

        writeln!(out, "public class {} {{", table.name)?;
        for field in table.fields {
            write_doc(out, "    ", DocStyle::Block, &field.description)?;
            writeln!(
                out,
                "    public {} {};",
                self.type_of(&field.declared),
                ident(&field.name)
            )?;
        }

        if table.has_container() {
            writeln!(out)?;
            self.emit_container(table, out)?;
        }
        writeln!(out, "}}")
    }

    fn emit_enum(&self, table: &EnumTable, out: &mut String) -> Result {
        writeln!(out, "// {}", banner(&table.name))?;
        writeln!(out, "package {};", PACKAGE)?;
        writeln!(out)?;
        writeln!(out, "public enum {} {{", table.name)?;
        let count = table.entries.len();
        for (i, entry) in table.entries.iter().enumerate() {
            write_doc(out, "    ", DocStyle::Block, &entry.description)?;
            let end = if i + 1 == count { ";" } else { "," };
            writeln!(out, "    {}({}){}", ident(&entry.symbol), entry.value, end)?;
        }
        writeln!(out)?;
        writeln!(out, "    public final int value;")?;
        writeln!(out)?;
        writeln!(out, "    {}(int value) {{", table.name)?;
        writeln!(out, "        this.value = value;")?;
        writeln!(out, "    }}")?;
        writeln!(out, "}}")
    }
}

impl JavaEmitter {
    fn emit_container(&self, table: &TableShape<'_>, out: &mut String) -> Result {
        let types = table.nested_types(
            table.name,
            |key| self.boxed(&key.declared),
            |key, inner| format!("Map<{}, {}>", key, inner),
        );
        let depth = table.keys.len();

        writeln!(out, "    public static class {} {{", table.container_name())?;
        writeln!(out, "        private final {} rows = new HashMap<>();", types[0])?;
        writeln!(out)?;
        writeln!(out, "        public void add({} row) {{", table.name)?;
        writeln!(out, "            {} c0 = rows;", types[0])?;
        for (d, key) in table.keys.iter().enumerate().take(depth - 1) {
            writeln!(
                out,
                "            {} c{} = c{}.computeIfAbsent(row.{}, k -> new HashMap<>());",
                types[d + 1],
                d + 1,
                d,
                ident(&key.name)
            )?;
        }
        writeln!(
            out,
            "            c{}.put(row.{}, row);",
            depth - 1,
            ident(&table.keys[depth - 1].name)
        )?;
        writeln!(out, "        }}")?;
        writeln!(out)?;

        let params: Vec<String> = table
            .keys
            .iter()
            .map(|k| format!("{} {}", self.type_of(&k.declared), ident(&k.name)))
            .collect();
        writeln!(
            out,
            "        public {} get({}) {{",
            table.name,
            params.join(", ")
        )?;
        writeln!(out, "            {} c0 = rows;", types[0])?;
        for (d, key) in table.keys.iter().enumerate().take(depth - 1) {
            writeln!(
                out,
                "            {} c{} = c{}.get({});",
                types[d + 1],
                d + 1,
                d,
                ident(&key.name)
            )?;
            writeln!(out, "            if (c{} == null) {{", d + 1)?;
            writeln!(out, "                return null;")?;
            writeln!(out, "            }}")?;
        }
        writeln!(
            out,
            "            return c{}.get({});",
            depth - 1,
            ident(&table.keys[depth - 1].name)
        )?;
        writeln!(out, "        }}")?;
        writeln!(out, "    }}")
    }
}
