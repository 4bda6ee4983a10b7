use std::fmt::{Result, Write};

use super::types::*;
use super::{write_doc, DocStyle};
use crate::schema::{EnumTable, Primitive};

const RESERVED: &[&str] = &[
    "auto", "bool", "break", "case", "catch", "char", "class", "const", "continue", "default",
    "delete", "do", "double", "else", "enum", "explicit", "extern", "false", "float", "for",
    "friend", "goto", "if", "inline", "int", "long", "namespace", "new", "operator", "private",
    "protected", "public", "register", "return", "short", "signed", "sizeof", "static",
    "struct", "switch", "template", "this", "throw", "true", "try", "typedef", "typename",
    "union", "unsigned", "using", "virtual", "void", "volatile", "while",
];

pub const NAMESPACE: &str = "gable";

/// Header-only C++17 source
pub struct CppEmitter;

fn ident(name: &str) -> String {
    safe_ident(name, RESERVED)
}

impl NativeTypes for CppEmitter {
    fn primitive(&self, p: Primitive) -> String {
        match p {
            Primitive::Int | Primitive::Time => "int32_t",
            Primitive::Long | Primitive::Date => "int64_t",
            Primitive::Float | Primitive::Percent | Primitive::Permille | Primitive::Permyriad => {
                "float"
            }
            Primitive::Bool => "bool",
            Primitive::String => "std::string",
        }
        .to_string()
    }

    fn vector(&self, arity: u8) -> String {
        format!("std::array<float, {}>", arity)
    }

    fn list(&self, element: &str) -> String {
        format!("std::vector<{}>", element)
    }
}

impl CodeEmitter for CppEmitter {
    fn member_name(&self, field: &str) -> String {
        ident(field)
    }

    fn emit_table(&self, table: &TableShape<'_>, out: &mut String) -> Result {
        writeln!(out, "// {}", banner(table.name))?;
        writeln!(out, "#pragma once")?;
        writeln!(out)?;
        for header in ["array", "cstdint", "map", "string", "vector"] {
            writeln!(out, "#include <{}>", header)?;
        }
        for name in table.enum_refs() {
            writeln!(out, "#include \"{}.cpp\"", name)?;
        }
        writeln!(out)?;
        writeln!(out, "namespace {} {{", NAMESPACE)?;
        writeln!(out)?;

        writeln!(out, "struct {} {{", table.name)?;
        for field in table.fields {
            write_doc(out, "    ", DocStyle::Line("//"), &field.description)?;
            writeln!(out, "    {} {};", self.type_of(&field.declared), ident(&field.name))?;
        }
        writeln!(out, "}};")?;

        if table.has_container() {
            writeln!(out)?;
            self.emit_container(table, out)?;
        }

        writeln!(out)?;
        writeln!(out, "}}  // namespace {}", NAMESPACE)
    }

    fn emit_enum(&self, table: &EnumTable, out: &mut String) -> Result {
        writeln!(out, "// {}", banner(&table.name))?;
        writeln!(out, "#pragma once")?;
        writeln!(out)?;
        writeln!(out, "#include <cstdint>")?;
        writeln!(out)?;
        writeln!(out, "namespace {} {{", NAMESPACE)?;
        writeln!(out)?;
        writeln!(out, "enum class {} : int32_t {{", table.name)?;
        for entry in &table.entries {
            write_doc(out, "    ", DocStyle::Line("//"), &entry.description)?;
            writeln!(out, "    {} = {},", ident(&entry.symbol), entry.value)?;
        }
        writeln!(out, "}};")?;
        writeln!(out)?;
        writeln!(out, "}}  // namespace {}", NAMESPACE)
    }
}

impl CppEmitter {
    fn emit_container(&self, table: &TableShape<'_>, out: &mut String) -> Result {
        let types = table.nested_types(
            table.name,
            |key| self.type_of(&key.declared),
            |key, inner| format!("std::map<{}, {}>", key, inner),
        );
        let depth = table.keys.len();

        writeln!(out, "class {} {{", table.container_name())?;
        writeln!(out, "public:")?;
        writeln!(out, "    void add(const {}& row) {{", table.name)?;
        writeln!(out, "        auto& c0 = rows_;")?;
        for (d, key) in table.keys.iter().enumerate().take(depth - 1) {
            writeln!(out, "        auto& c{} = c{}[row.{}];", d + 1, d, ident(&key.name))?;
        }
        writeln!(
            out,
            "        c{}[row.{}] = row;",
            depth - 1,
            ident(&table.keys[depth - 1].name)
        )?;
        writeln!(out, "    }}")?;
        writeln!(out)?;

        let params: Vec<String> = table
            .keys
            .iter()
            .map(|k| format!("const {}& {}", self.type_of(&k.declared), ident(&k.name)))
            .collect();
        writeln!(
            out,
            "    const {}* get({}) const {{",
            table.name,
            params.join(", ")
        )?;
        writeln!(out, "        const auto& c0 = rows_;")?;
        for (d, key) in table.keys.iter().enumerate() {
            let name = ident(&key.name);
            writeln!(out, "        auto it{} = c{}.find({});", d, d, name)?;
            writeln!(out, "        if (it{} == c{}.end()) {{", d, d)?;
            writeln!(out, "            return nullptr;")?;
            writeln!(out, "        }}")?;
            if d + 1 < depth {
                writeln!(out, "        const auto& c{} = it{}->second;", d + 1, d)?;
            }
        }
        writeln!(out, "        return &it{}->second;", depth - 1)?;
        writeln!(out, "    }}")?;
        writeln!(out)?;
        writeln!(out, "private:")?;
        writeln!(out, "    {} rows_;", types[0])?;
        writeln!(out, "}};")
    }
}
