use std::fmt::{Result, Write};

use super::types::*;
use super::{inline_doc, write_doc, DocStyle};
use crate::export::json::VECTOR_COMPONENTS;
use crate::schema::{DeclaredType, EnumTable, Primitive};

/// ES module with JSDoc type annotations
pub struct JavaScriptEmitter;

impl NativeTypes for JavaScriptEmitter {
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
        format!("{{{}}}", members.join(", "))
    }

    fn list(&self, element: &str) -> String {
        format!("Array<{}>", element)
    }

    fn type_of(&self, declared: &DeclaredType) -> String {
        match declared {
            // Enum values travel as their integer value
            DeclaredType::EnumRef(_) => "number".to_string(),
            DeclaredType::Primitive(p) => self.primitive(*p),
            DeclaredType::Vector(n) => self.vector(*n),
            DeclaredType::List(crate::schema::ElementType::Primitive(p)) => {
                self.list(&self.primitive(*p))
            }
            DeclaredType::List(crate::schema::ElementType::Vector(n)) => {
                self.list(&self.vector(*n))
            }
            DeclaredType::LinkRef { key, .. } => self.primitive(*key),
        }
    }
}

impl CodeEmitter for JavaScriptEmitter {
    fn emit_table(&self, table: &TableShape<'_>, out: &mut String) -> Result {
        writeln!(out, "// {}", banner(table.name))?;
        writeln!(out)?;
        writeln!(out, "/**")?;
        writeln!(out, " * @typedef {{Object}} {}", table.name)?;
        for field in table.fields {
            let doc = match inline_doc(&field.description, DocStyle::Block) {
                text if text.is_empty() => text,
                text => format!(" {}", text),
            };
            writeln!(
                out,
                " * @property {{{}}} {}{}",
                self.type_of(&field.declared),
                field.name,
                doc
            )?;
        }
        writeln!(out, " */")?;

        if !table.has_container() {
            writeln!(out)?;
            return writeln!(out, "export {{}};");
        }

        let types = table.nested_types(
            table.name,
            |key| self.type_of(&key.declared),
            |key, inner| format!("Map<{}, {}>", key, inner),
        );
        let depth = table.keys.len();

        writeln!(out)?;
        writeln!(out, "export class {} {{", table.container_name())?;
        writeln!(out, "    constructor() {{")?;
        writeln!(out, "        /** @type {{{}}} */", types[0])?;
        writeln!(out, "        this.rows = new Map();")?;
        writeln!(out, "    }}")?;
        writeln!(out)?;
        writeln!(out, "    /** @param {{{}}} row */", table.name)?;
        writeln!(out, "    add(row) {{")?;
        writeln!(out, "        const c0 = this.rows;")?;
        for (d, key) in table.keys.iter().enumerate().take(depth - 1) {
            writeln!(out, "        let c{} = c{}.get(row.{});", d + 1, d, key.name)?;
            writeln!(out, "        if (c{} === undefined) {{", d + 1)?;
            writeln!(out, "            c{} = new Map();", d + 1)?;
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

        writeln!(out, "    /**")?;
        for key in &table.keys {
            writeln!(
                out,
                "     * @param {{{}}} {}",
                self.type_of(&key.declared),
                key.name
            )?;
        }
        writeln!(out, "     * @returns {{{} | undefined}}", table.name)?;
        writeln!(out, "     */")?;
        let names: Vec<&str> = table.keys.iter().map(|k| k.name.as_str()).collect();
        let chain: Vec<String> = names.iter().map(|n| format!("get({})", n)).collect();
        writeln!(out, "    get({}) {{", names.join(", "))?;
        writeln!(out, "        return this.rows.{};", chain.join("?."))?;
        writeln!(out, "    }}")?;
        writeln!(out, "}}")
    }

    fn emit_enum(&self, table: &EnumTable, out: &mut String) -> Result {
        writeln!(out, "// {}", banner(&table.name))?;
        writeln!(out)?;
        writeln!(out, "export const {} = Object.freeze({{", table.name)?;
        for entry in &table.entries {
            write_doc(out, "    ", DocStyle::Block, &entry.description)?;
            writeln!(out, "    {}: {},", entry.symbol, entry.value)?;
        }
        writeln!(out, "}});")
    }
}
