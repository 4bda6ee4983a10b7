use convert_case::{Case, Casing};
use std::fmt::{Result, Write};

use super::types::*;
use super::{write_doc, DocStyle};
use crate::schema::{EnumTable, Primitive};

const RESERVED: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough",
    "for", "func", "go", "goto", "if", "import", "interface", "map", "package", "range",
    "return", "select", "struct", "switch", "type", "var",
];

pub const PACKAGE: &str = "gable";

pub struct GoEmitter;

/// Exported struct member name
fn member(name: &str) -> String {
    name.to_case(Case::Pascal)
}

/// Parameter name
fn param(name: &str) -> String {
    safe_ident(&name.to_case(Case::Camel), RESERVED)
}

impl NativeTypes for GoEmitter {
    fn primitive(&self, p: Primitive) -> String {
        match p {
            Primitive::Int | Primitive::Time => "int32",
            Primitive::Long | Primitive::Date => "int64",
            Primitive::Float | Primitive::Percent | Primitive::Permille | Primitive::Permyriad => {
                "float32"
            }
            Primitive::Bool => "bool",
            Primitive::String => "string",
        }
        .to_string()
    }

    fn vector(&self, arity: u8) -> String {
        format!("[{}]float32", arity)
    }

    fn list(&self, element: &str) -> String {
        format!("[]{}", element)
    }
}

impl CodeEmitter for GoEmitter {
    fn member_name(&self, field: &str) -> String {
        member(field)
    }

    fn emit_table(&self, table: &TableShape<'_>, out: &mut String) -> Result {
        writeln!(out, "// {}", banner(table.name))?;
        writeln!(out)?;
        writeln!(out, "package {}", PACKAGE)?;
        writeln!(out)?;

        writeln!(out, "type {} struct {{", table.name)?;
        for field in table.fields {
            write_doc(out, "\t", DocStyle::Line("//"), &field.description)?;
            writeln!(
                out,
                "\t{} {} `json:\"{}\"`",
                member(&field.name),
                self.type_of(&field.declared),
                field.name
            )?;
        }
        writeln!(out, "}}")?;

        if !table.has_container() {
            return Ok(());
        }

        let record = format!("*{}", table.name);
        let types = table.nested_types(
            &record,
            |key| self.type_of(&key.declared),
            |key, inner| format!("map[{}]{}", key, inner),
        );
        let depth = table.keys.len();
        let container = table.container_name();

        writeln!(out)?;
        writeln!(out, "type {} struct {{", container)?;
        writeln!(out, "\tRows {}", types[0])?;
        writeln!(out, "}}")?;
        writeln!(out)?;
        writeln!(out, "func New{}() *{} {{", container, container)?;
        writeln!(out, "\treturn &{}{{Rows: make({})}}", container, types[0])?;
        writeln!(out, "}}")?;
        writeln!(out)?;

        writeln!(out, "func (t *{}) Add(row {}) {{", container, record)?;
        writeln!(out, "\tc0 := t.Rows")?;
        for (d, key) in table.keys.iter().enumerate().take(depth - 1) {
            let k = member(&key.name);
            writeln!(out, "\tc{}, ok := c{}[row.{}]", d + 1, d, k)?;
            writeln!(out, "\tif !ok {{")?;
            writeln!(out, "\t\tc{} = make({})", d + 1, types[d + 1])?;
            writeln!(out, "\t\tc{}[row.{}] = c{}", d, k, d + 1)?;
            writeln!(out, "\t}}")?;
        }
        writeln!(
            out,
            "\tc{}[row.{}] = row",
            depth - 1,
            member(&table.keys[depth - 1].name)
        )?;
        writeln!(out, "}}")?;
        writeln!(out)?;

        let params: Vec<String> = table
            .keys
            .iter()
            .map(|k| format!("{} {}", param(&k.name), self.type_of(&k.declared)))
            .collect();
        writeln!(
            out,
            "func (t *{}) Get({}) {} {{",
            container,
            params.join(", "),
            record
        )?;
        writeln!(out, "\tc0 := t.Rows")?;
        for (d, key) in table.keys.iter().enumerate().take(depth - 1) {
            writeln!(out, "\tc{}, ok := c{}[{}]", d + 1, d, param(&key.name))?;
            writeln!(out, "\tif !ok {{")?;
            writeln!(out, "\t\treturn nil")?;
            writeln!(out, "\t}}")?;
        }
        writeln!(
            out,
            "\treturn c{}[{}]",
            depth - 1,
            param(&table.keys[depth - 1].name)
        )?;
        writeln!(out, "}}")
    }

    fn emit_enum(&self, table: &EnumTable, out: &mut String) -> Result {
        writeln!(out, "// {}", banner(&table.name))?;
        writeln!(out)?;
        writeln!(out, "package {}", PACKAGE)?;
        writeln!(out)?;
        writeln!(out, "type {} int32", table.name)?;
        writeln!(out)?;
        writeln!(out, "const (")?;
        for entry in &table.entries {
            write_doc(out, "\t", DocStyle::Line("//"), &entry.description)?;
            writeln!(
                out,
                "\t{}{} {} = {}",
                table.name,
                member(&entry.symbol),
                table.name,
                entry.value
            )?;
        }
        writeln!(out, ")")
    }
}
