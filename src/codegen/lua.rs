use std::fmt::{Result, Write};

use super::types::*;
use super::{inline_doc, DocStyle};
use crate::export::json::VECTOR_COMPONENTS;
use crate::schema::{EnumTable, Primitive};

const RESERVED: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// Lua module with EmmyLua annotations
pub struct LuaEmitter;

/// `row.name`, or `row["name"]` when the name is reserved
fn access(target: &str, name: &str) -> String {
    if RESERVED.contains(&name) {
        format!("{}[\"{}\"]", target, name)
    } else {
        format!("{}.{}", target, name)
    }
}

impl NativeTypes for LuaEmitter {
    fn primitive(&self, p: Primitive) -> String {
        match p {
            Primitive::Float | Primitive::Percent | Primitive::Permille | Primitive::Permyriad => {
                "number"
            }
            Primitive::Bool => "boolean",
            Primitive::String => "string",
            _ => "integer",
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
        format!("{}[]", element)
    }
}

impl CodeEmitter for LuaEmitter {
    fn emit_table(&self, table: &TableShape<'_>, out: &mut String) -> Result {
        writeln!(out, "-- {}", banner(table.name))?;
        writeln!(out)?;
        writeln!(out, "---@class {}", table.name)?;
        for field in table.fields {
            let doc = match inline_doc(&field.description, DocStyle::Line("--")) {
                text if text.is_empty() => text,
                text => format!(" {}", text),
            };
            writeln!(
                out,
                "---@field {} {}{}",
                field.name,
                self.type_of(&field.declared),
                doc
            )?;
        }

        if !table.has_container() {
            return Ok(());
        }

        let container = table.container_name();
        let depth = table.keys.len();

        writeln!(out)?;
        writeln!(out, "---@class {}", container)?;
        writeln!(out, "local {} = {{}}", container)?;
        writeln!(out, "{}.__index = {}", container, container)?;
        writeln!(out)?;
        writeln!(out, "function {}.new()", container)?;
        writeln!(out, "    return setmetatable({{ rows = {{}} }}, {})", container)?;
        writeln!(out, "end")?;
        writeln!(out)?;

        writeln!(out, "---@param row {}", table.name)?;
        writeln!(out, "function {}:add(row)", container)?;
        writeln!(out, "    local c0 = self.rows")?;
        for (d, key) in table.keys.iter().enumerate().take(depth - 1) {
            let k = access("row", &key.name);
            writeln!(out, "    local c{} = c{}[{}]", d + 1, d, k)?;
            writeln!(out, "    if c{} == nil then", d + 1)?;
            writeln!(out, "        c{} = {{}}", d + 1)?;
            writeln!(out, "        c{}[{}] = c{}", d, k, d + 1)?;
            writeln!(out, "    end")?;
        }
        writeln!(
            out,
            "    c{}[{}] = row",
            depth - 1,
            access("row", &table.keys[depth - 1].name)
        )?;
        writeln!(out, "end")?;
        writeln!(out)?;

        let params: Vec<String> = table
            .keys
            .iter()
            .map(|k| safe_ident(&k.name, RESERVED))
            .collect();
        for (key, name) in table.keys.iter().zip(&params) {
            writeln!(out, "---@param {} {}", name, self.type_of(&key.declared))?;
        }
        writeln!(out, "---@return {}|nil", table.name)?;
        writeln!(out, "function {}:get({})", container, params.join(", "))?;
        writeln!(out, "    local c0 = self.rows")?;
        for d in 0..depth - 1 {
            writeln!(out, "    local c{} = c{}[{}]", d + 1, d, params[d])?;
            writeln!(out, "    if c{} == nil then", d + 1)?;
            writeln!(out, "        return nil")?;
            writeln!(out, "    end")?;
        }
        writeln!(out, "    return c{}[{}]", depth - 1, params[depth - 1])?;
        writeln!(out, "end")?;
        writeln!(out)?;
        writeln!(out, "return {}", container)
    }

    fn emit_enum(&self, table: &EnumTable, out: &mut String) -> Result {
        writeln!(out, "-- {}", banner(&table.name))?;
        writeln!(out)?;
        writeln!(out, "---@enum {}", table.name)?;
        writeln!(out, "local {} = {{", table.name)?;
        for entry in &table.entries {
            let doc = match inline_doc(&entry.description, DocStyle::Line("--")) {
                text if text.is_empty() => text,
                text => format!(" -- {}", text),
            };
            writeln!(out, "    {} = {},{}", entry.symbol, entry.value, doc)?;
        }
        writeln!(out, "}}")?;
        writeln!(out)?;
        writeln!(out, "return {}", table.name)
    }
}
