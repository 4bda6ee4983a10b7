//! Codegen module: typed accessor sources for consuming languages.
//!
//! This module provides:
//! - The language lookup table (tag to extension keyword)
//! - The `CodeEmitter` trait and one emitter per language
//! - Entry points that turn a projected schema or an enum table into a source file
//! - `.proto` schemas for binary artifacts

pub mod types;
pub mod cangjie;
pub mod cpp;
pub mod csharp;
pub mod go;
pub mod java;
pub mod javascript;
pub mod lua;
pub mod proto;
pub mod python;
pub mod typescript;

pub use types::*;

use std::collections::HashMap;

use crate::compile::ProjectedSchema;
use crate::error::{CompileError, Result};
use crate::schema::EnumTable;
use crate::sheet::SheetKind;

/// Emitter for a resolved language; `None` when a table row has no emitter behind it.
pub fn emitter_for(lang: &Language) -> Option<&'static dyn CodeEmitter> {
    let emitter: &'static dyn CodeEmitter = match lang.tag {
        "cpp" => &cpp::CppEmitter,
        "csharp" => &csharp::CSharpEmitter,
        "cangjie" => &cangjie::CangjieEmitter,
        "go" => &go::GoEmitter,
        "java" => &java::JavaEmitter,
        "javascript" => &javascript::JavaScriptEmitter,
        "lua" => &lua::LuaEmitter,
        "python" => &python::PythonEmitter,
        "typescript" => &typescript::TypeScriptEmitter,
        _ => return None,
    };
    Some(emitter)
}

fn require_emitter(lang: &Language) -> Result<&'static dyn CodeEmitter> {
    emitter_for(lang).ok_or_else(|| {
        CompileError::target_config(format!("no code emitter for language '{}'", lang.tag))
    })
}

/// Record type (and container for DATA tables) for one projected schema.
pub fn generate_table(schema: &ProjectedSchema, lang: &Language) -> Result<GeneratedSource> {
    let emitter = require_emitter(lang)?;
    check_member_names(schema, emitter, lang)?;
    let keys = match schema.kind {
        SheetKind::Data => schema.key_fields(),
        _ => Vec::new(),
    };
    let shape = TableShape {
        name: &schema.name,
        fields: &schema.fields,
        keys,
    };

    let mut text = String::new();
    emitter.emit_table(&shape, &mut text).map_err(|e| {
        CompileError::io(format!("failed to render {} source: {}", lang.tag, e))
            .in_sheet(&schema.name)
    })?;

    Ok(GeneratedSource {
        file_name: source_file_name(&schema.name, lang),
        text,
    })
}

/// Two fields whose member names coincide in `lang` cannot share one record type.
fn check_member_names(
    schema: &ProjectedSchema,
    emitter: &dyn CodeEmitter,
    lang: &Language,
) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for field in &schema.fields {
        let member = emitter.member_name(&field.name);
        if let Some(first) = seen.insert(member.clone(), &field.name) {
            return Err(CompileError::type_error(format!(
                "fields '{}' and '{}' both become {} member '{}'",
                first, field.name, lang.tag, member
            ))
            .in_sheet(&schema.name));
        }
    }
    Ok(())
}

pub fn generate_enum(table: &EnumTable, lang: &Language) -> Result<GeneratedSource> {
    let emitter = require_emitter(lang)?;
    let mut text = String::new();
    emitter.emit_enum(table, &mut text).map_err(|e| {
        CompileError::io(format!("failed to render {} source: {}", lang.tag, e))
            .in_sheet(&table.name)
    })?;

    Ok(GeneratedSource {
        file_name: source_file_name(&table.name, lang),
        text,
    })
}

/// `<Table>.<keyword>`
pub fn source_file_name(table: &str, lang: &Language) -> String {
    format!("{}.{}", table, lang.keyword)
}

/// How a language spells documentation comments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocStyle {
    /// One prefixed comment per line, e.g. `//` or `#:`
    Line(&'static str),
    /// `/** .. */`
    Block,
    /// C# `/// <summary>` XML doc
    XmlSummary,
}

impl DocStyle {
    fn escape(self, line: &str) -> String {
        match self {
            DocStyle::Line(_) => line.to_string(),
            DocStyle::Block => line.replace("*/", "*\\/"),
            DocStyle::XmlSummary => line
                .replace('&', "&amp;")
                .replace('<', "&lt;")
                .replace('>', "&gt;"),
        }
    }
}

/// Non-blank lines of a description, escaped for `style`. Cells may carry `\r\n`, `\n`
/// or a lone `\r` between lines.
pub fn doc_lines(text: &str, style: DocStyle) -> Vec<String> {
    text.split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| style.escape(line))
        .collect()
}

/// Description folded onto one line, for docs that sit inside another comment.
pub fn inline_doc(text: &str, style: DocStyle) -> String {
    doc_lines(text, style).join(" ")
}

/// Write `text` as a doc comment at `indent`; nothing for an empty description.
pub fn write_doc(out: &mut String, indent: &str, style: DocStyle, text: &str) -> std::fmt::Result {
    use std::fmt::Write;

    let lines = doc_lines(text, style);
    match (style, lines.as_slice()) {
        (_, []) => Ok(()),
        (DocStyle::Line(prefix), lines) => {
            for line in lines {
                writeln!(out, "{}{} {}", indent, prefix, line)?;
            }
            Ok(())
        }
        (DocStyle::Block, [line]) => writeln!(out, "{}/** {} */", indent, line),
        (DocStyle::Block, lines) => {
            writeln!(out, "{}/**", indent)?;
            for line in lines {
                writeln!(out, "{} * {}", indent, line)?;
            }
            writeln!(out, "{} */", indent)
        }
        (DocStyle::XmlSummary, [line]) => writeln!(out, "{}/// <summary>{}</summary>", indent, line),
        (DocStyle::XmlSummary, lines) => {
            writeln!(out, "{}/// <summary>", indent)?;
            for line in lines {
                writeln!(out, "{}/// {}", indent, line)?;
            }
            writeln!(out, "{}/// </summary>", indent)
        }
    }
}
