use std::fmt::{Result, Write};

use super::types::*;
use super::{write_doc, DocStyle};
use crate::export::json::VECTOR_COMPONENTS;
use crate::schema::{EnumTable, Primitive};

pub struct TypeScriptEmitter;

impl NativeTypes for TypeScriptEmitter {
    fn primitive(&self, p: Primitive) -> String {
        match p {
            Primitive::Bool => "boolean",
            Primitive::String => "string",
            _ => "number",
        }
        .to_string()
    }

    fn vector(&self, arity: u8) -> String {
        let members: Vec<String> = VECTOR_COMPONENTS[..arity as usize]
            .iter()
            .map(|c| format!("{}: number", c))
            .collect();
        format!("{{ {} }}", members.join("; "))
    }

    fn list(&self, element: &str) -> String {
        format!("{}[]", element)
    }
}

impl CodeEmitter for TypeScriptEmitter {
    fn emit_table(&self, table: &TableShape<'_>, out: &mut String) -> Result {
        writeln!(out, "// {}", banner(table.name))?;
        for name in table.enum_refs() {
            writeln!(out, "import {{ {} }} from \"./{}\";", name, name)?;
        }
        writeln!(out)?;

        writeln!(out, "export interface {} {{", table.name)?;
        for field in table.fields {
            write_doc(out, "    ", DocStyle::Block, &field.description)?;
            writeln!(out, "    {}: {};", field.name, self.type_of(&field.declared))?;
        }
        writeln!(out, "}}")?;

        if !table.has_container() {
            return Ok(());
        }

        let types = table.nested_types(
            table.name,
            |key| self.type_of(&key.declared),
            |key, inner| format!("Map<{}, {}>", key, inner),
        );
        let depth = table.keys.len();

        writeln!(out)?;
        writeln!(out, "export class {} {{", table.container_name())?;
        writeln!(out, "    readonly rows = new {}();", types[0])?;
        writeln!(out)?;
        writeln!(out, "    add(row: {}): void {{", table.name)?;
        writeln!(out, "        const c0 = this.rows;")?;
        for (d, key) in table.keys.iter().enumerate().take(depth - 1) {
            writeln!(out, "        let c{} = c{}.get(row.{});", d + 1, d, key.name)?;
            writeln!(out, "        if (c{} === undefined) {{", d + 1)?;
            writeln!(out, "            c{} = new {}();", d + 1, types[d + 1])?;
            writeln!(out, "            c{}.set(row.{}, c{});", d, key.name, d + 1)?;
            writeln!(out, "        }}")?;
        }
        writeln!(
            out,
            "        c{}.set(row.{}, row);",
            depth - 1,
            table.keys[depth - 1].name
        )?;
        writeln!(out, "    }}")?;
        writeln!(out)?;

        let params: Vec<String> = table
            .keys
            .iter()
            .map(|k| format!("{}: {}", k.name, self.type_of(&k.declared)))
            .collect();
        let chain: Vec<String> = table
            .keys
            .iter()
            .map(|k| format!("get({})", k.name))
            .collect();
        writeln!(
            out,
            "    get({}): {} | undefined {{",
            params.join(", "),
            table.name
        )?;
        writeln!(out, "        return this.rows.{};", chain.join("?."))?;
        writeln!(out, "    }}")?;
        writeln!(out, "}}")
    }

    fn emit_enum(&self, table: &EnumTable, out: &mut String) -> Result {
        writeln!(out, "// {}", banner(&table.name))?;
        writeln!(out)?;
        writeln!(out, "export enum {} {{", table.name)?;
        for entry in &table.entries {
            write_doc(out, "    ", DocStyle::Block, &entry.description)?;
            writeln!(out, "    {} = {},", entry.symbol, entry.value)?;
        }
        writeln!(out, "}}")
    }
}
