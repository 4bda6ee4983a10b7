use std::fmt::{Result, Write};

use super::types::*;
use super::{write_doc, DocStyle};
use crate::schema::{EnumTable, Primitive};

const RESERVED: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

pub struct PythonEmitter;

fn ident(name: &str) -> String {
    safe_ident(name, RESERVED)
}

impl NativeTypes for PythonEmitter {
    fn primitive(&self, p: Primitive) -> String {
        match p {
            Primitive::Float | Primitive::Percent | Primitive::Permille | Primitive::Permyriad => {
                "float"
            }
            Primitive::Bool => "bool",
            Primitive::String => "str",
            _ => "int",
        }
        .to_string()
    }

    fn vector(&self, arity: u8) -> String {
        format!("Tuple[{}]", vec!["float"; arity as usize].join(", "))
    }

    fn list(&self, element: &str) -> String {
        format!("List[{}]", element)
    }
}

impl CodeEmitter for PythonEmitter {
    fn member_name(&self, field: &str) -> String {
        ident(field)
    }

    fn emit_table(&self, table: &TableShape<'_>, out: &mut String) -> Result {
        writeln!(out, "# {}", banner(table.name))?;
        writeln!(out, "from dataclasses import dataclass")?;
        writeln!(out, "from typing import Dict, List, Optional, Tuple")?;
        let enums = table.enum_refs();
        if !enums.is_empty() {
            writeln!(out)?;
            for name in enums {
                writeln!(out, "from .{} import {}", name, name)?;
            }
        }
        writeln!(out)?;
        writeln!(out)?;

        writeln!(out, "@dataclass")?;
        writeln!(out, "class {}:", table.name)?;
        if table.fields.is_empty() {
            writeln!(out, "    pass")?;
        }
        for field in table.fields {
            write_doc(out, "    ", DocStyle::Line("#:"), &field.description)?;
            writeln!(out, "    {}: {}", ident(&field.name), self.type_of(&field.declared))?;
        }

        if !table.has_container() {
            return Ok(());
        }

        let types = table.nested_types(
            table.name,
            |key| self.type_of(&key.declared),
            |key, inner| format!("Dict[{}, {}]", key, inner),
        );
        let depth = table.keys.len();

        writeln!(out)?;
        writeln!(out)?;
        writeln!(out, "class {}:", table.container_name())?;
        writeln!(out, "    def __init__(self) -> None:")?;
        writeln!(out, "        self.rows: {} = {{}}", types[0])?;
        writeln!(out)?;
        writeln!(out, "    def add(self, row: {}) -> None:", table.name)?;
        writeln!(out, "        c0 = self.rows")?;
        for (d, key) in table.keys.iter().enumerate().take(depth - 1) {
            writeln!(out, "        c{} = c{}.setdefault(row.{}, {{}})", d + 1, d, ident(&key.name))?;
        }
        writeln!(
            out,
            "        c{}[row.{}] = row",
            depth - 1,
            ident(&table.keys[depth - 1].name)
        )?;
        writeln!(out)?;

        let params: Vec<String> = table
            .keys
            .iter()
            .map(|k| format!("{}: {}", ident(&k.name), self.type_of(&k.declared)))
            .collect();
        writeln!(
            out,
            "    def get(self, {}) -> Optional[{}]:",
            params.join(", "),
            table.name
        )?;
        writeln!(out, "        c0 = self.rows")?;
        for (d, key) in table.keys.iter().enumerate().take(depth - 1) {
            writeln!(out, "        c{} = c{}.get({})", d + 1, d, ident(&key.name))?;
            writeln!(out, "        if c{} is None:", d + 1)?;
            writeln!(out, "            return None")?;
        }
        writeln!(
            out,
            "        return c{}.get({})",
            depth - 1,
            ident(&table.keys[depth - 1].name)
        )
    }

    fn emit_enum(&self, table: &EnumTable, out: &mut String) -> Result {
        writeln!(out, "# {}", banner(&table.name))?;
        writeln!(out, "from enum import IntEnum")?;
        writeln!(out)?;
        writeln!(out)?;
        writeln!(out, "class {}(IntEnum):", table.name)?;
        for entry in &table.entries {
            write_doc(out, "    ", DocStyle::Line("#:"), &entry.description)?;
            writeln!(out, "    {} = {}", ident(&entry.symbol), entry.value)?;
        }
        Ok(())
    }
}
