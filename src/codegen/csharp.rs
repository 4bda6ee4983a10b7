use std::fmt::{Result, Write};

use super::types::*;
use super::{write_doc, DocStyle};
use crate::schema::{EnumTable, Primitive};

const RESERVED: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked", "class",
    "const", "continue", "decimal", "default", "delegate", "do", "double", "else", "enum", "event",
    "explicit", "extern", "false", "finally", "fixed", "float", "for", "foreach", "goto", "if",
    "implicit", "in", "int", "interface", "internal", "is", "lock", "long", "namespace", "new",
    "null", "object", "operator", "out", "override", "params", "private", "protected", "public",
    "readonly", "ref", "return", "sbyte", "sealed", "short", "sizeof", "stackalloc", "static",
    "string", "struct", "switch", "this", "throw", "true", "try", "typeof", "uint", "ulong",
    "unchecked", "unsafe", "ushort", "using", "virtual", "void", "volatile", "while",
];

pub const NAMESPACE: &str = "Gable";

pub struct CSharpEmitter;

fn ident(name: &str) -> String {
    safe_ident(name, RESERVED)
}

impl NativeTypes for CSharpEmitter {
    fn primitive(&self, p: Primitive) -> String {
        match p {
            Primitive::Int | Primitive::Time => "int",
            Primitive::Long | Primitive::Date => "long",
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
        format!("{}[]", element)
    }
}

impl CodeEmitter for CSharpEmitter {
    fn member_name(&self, field: &str) -> String {
        ident(field)
    }

    fn emit_table(&self, table: &TableShape<'_>, out: &mut String) -> Result {
        writeln!(out, "// {}", banner(table.name))?;
        if table.has_container() {
            writeln!(out, "using System.Collections.Generic;")?;
        }
        writeln!(out, "using System.Numerics;")?;
        writeln!(out)?;
        writeln!(out, "namespace {}", NAMESPACE)?;
        writeln!(out, "{{")?;

        writeln!(out, "    public class {}", table.name)?;
        writeln!(out, "    {{")?;
        for field in table.fields {
            write_doc(out, "        ", DocStyle::XmlSummary, &field.description)?;
            writeln!(
                out,
                "        public {} {};",
                self.type_of(&field.declared),
                ident(&field.name)
            )?;
        }
        writeln!(out, "    }}")?;

        if table.has_container() {
            writeln!(out)?;
            self.emit_container(table, out)?;
        }

        writeln!(out, "}}")
    }

    fn emit_enum(&self, table: &EnumTable, out: &mut String) -> Result {
        writeln!(out, "// {}", banner(&table.name))?;
        writeln!(out)?;
        writeln!(out, "namespace {}", NAMESPACE)?;
        writeln!(out, "{{")?;
        writeln!(out, "    public enum {}", table.name)?;
        writeln!(out, "    {{")?;
        for entry in &table.entries {
            write_doc(out, "        ", DocStyle::XmlSummary, &entry.description)?;
            writeln!(out, "        {} = {},", ident(&entry.symbol), entry.value)?;
        }
        writeln!(out, "    }}")?;
        writeln!(out, "}}")
    }
}

impl CSharpEmitter {
    fn emit_container(&self, table: &TableShape<'_>, out: &mut String) -> Result {
        let types = table.nested_types(
            table.name,
            |key| self.type_of(&key.declared),
            |key, inner| format!("Dictionary<{}, {}>", key, inner),
        );
        let depth = table.keys.len();

        writeln!(out, "    public class {}", table.container_name())?;
        writeln!(out, "    {{")?;
        writeln!(out, "        public readonly {} Rows = new {}();", types[0], types[0])?;
        writeln!(out)?;

        writeln!(out, "        public void Add({} row)", table.name)?;
        writeln!(out, "        {{")?;
        writeln!(out, "            var c0 = Rows;")?;
        for (d, key) in table.keys.iter().enumerate().take(depth - 1) {
            let k = ident(&key.name);
            writeln!(out, "            if (!c{}.TryGetValue(row.{}, out var c{}))", d, k, d + 1)?;
            writeln!(out, "            {{")?;
            writeln!(out, "                c{} = new {}();", d + 1, types[d + 1])?;
            writeln!(out, "                c{}[row.{}] = c{};", d, k, d + 1)?;
            writeln!(out, "            }}")?;
        }
        let last = ident(&table.keys[depth - 1].name);
        writeln!(out, "            c{}[row.{}] = row;", depth - 1, last)?;
        writeln!(out, "        }}")?;
        writeln!(out)?;

        let params: Vec<String> = table
            .keys
            .iter()
            .map(|k| format!("{} {}", self.type_of(&k.declared), ident(&k.name)))
            .collect();
        let lookups: Vec<String> = table
            .keys
            .iter()
            .enumerate()
            .map(|(d, k)| {
                let source = if d == 0 { "Rows".to_string() } else { format!("c{}", d) };
                let target = if d + 1 == depth { "row".to_string() } else { format!("c{}", d + 1) };
                format!("{}.TryGetValue({}, out var {})", source, ident(&k.name), target)
            })
            .collect();
        writeln!(out, "        public {} Get({})", table.name, params.join(", "))?;
        writeln!(out, "        {{")?;
        writeln!(out, "            if ({})", lookups.join(" && "))?;
        writeln!(out, "            {{")?;
        writeln!(out, "                return row;")?;
        writeln!(out, "            }}")?;
        writeln!(out, "            return null;")?;
        writeln!(out, "        }}")?;
        writeln!(out, "    }}")
    }
}
