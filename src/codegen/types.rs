use serde::Serialize;
use std::collections::BTreeSet;

use crate::schema::{DeclaredType, ElementType, FieldDef, Primitive};

/// One supported target language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    /// Canonical tag used in build targets
    pub tag: &'static str,
    /// File extension of generated sources; also the default platform tag
    pub keyword: &'static str,
    pub aliases: &'static [&'static str],
}

/// Every language the generator knows. Adding a language is a new row here plus an emitter.
pub const LANGUAGES: &[Language] = &[
    Language { tag: "cpp", keyword: "cpp", aliases: &["c", "c++"] },
    Language { tag: "csharp", keyword: "cs", aliases: &["cs", "c#"] },
    Language { tag: "cangjie", keyword: "cj", aliases: &["cj"] },
    Language { tag: "go", keyword: "go", aliases: &["golang"] },
    Language { tag: "java", keyword: "java", aliases: &[] },
    Language { tag: "javascript", keyword: "js", aliases: &["js"] },
    Language { tag: "lua", keyword: "lua", aliases: &[] },
    Language { tag: "python", keyword: "py", aliases: &["py"] },
    Language { tag: "typescript", keyword: "ts", aliases: &["ts"] },
];

/// Look a language up by tag or alias, case-insensitively.
pub fn resolve_language(tag: &str) -> Option<&'static Language> {
    let tag = tag.trim().to_ascii_lowercase();
    LANGUAGES
        .iter()
        .find(|lang| lang.tag == tag || lang.aliases.contains(&tag.as_str()))
}

/// Extension keyword for a language tag; `None` when the tag is unknown.
pub fn extension_for(tag: &str) -> Option<&'static str> {
    resolve_language(tag).map(|lang| lang.keyword)
}

/// Source text for one table in one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedSource {
    pub file_name: String,
    pub text: String,
}

/// Native spelling of declared types in one language
pub trait NativeTypes {
    fn primitive(&self, p: Primitive) -> String;
    fn vector(&self, arity: u8) -> String;
    fn list(&self, element: &str) -> String;

    fn type_of(&self, declared: &DeclaredType) -> String {
        match declared {
            DeclaredType::Primitive(p) => self.primitive(*p),
            DeclaredType::Vector(n) => self.vector(*n),
            DeclaredType::List(ElementType::Primitive(p)) => self.list(&self.primitive(*p)),
            DeclaredType::List(ElementType::Vector(n)) => self.list(&self.vector(*n)),
            DeclaredType::EnumRef(name) => name.clone(),
            DeclaredType::LinkRef { key, .. } => self.primitive(*key),
        }
    }
}

/// Emits source text for compiled tables
pub trait CodeEmitter: NativeTypes + Send + Sync {
    /// Record type plus `<Table>Table` container; KV tables get the record type only.
    fn emit_table(&self, table: &TableShape<'_>, out: &mut String) -> std::fmt::Result;

    fn emit_enum(&self, table: &crate::schema::EnumTable, out: &mut String) -> std::fmt::Result;

    /// Member name emitted for a field
    fn member_name(&self, field: &str) -> String {
        field.to_string()
    }
}

/// What an emitter needs to know about a table
pub struct TableShape<'a> {
    pub name: &'a str,
    pub fields: &'a [FieldDef],
    /// Key fields in nesting order; empty for KV tables
    pub keys: Vec<&'a FieldDef>,
}

impl<'a> TableShape<'a> {
    pub fn container_name(&self) -> String {
        format!("{}Table", self.name)
    }

    pub fn has_container(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Enum tables referenced by the shape's fields, sorted
    pub fn enum_refs(&self) -> Vec<&'a str> {
        let refs: BTreeSet<&'a str> = self
            .fields
            .iter()
            .filter_map(|f| f.declared.enum_name())
            .collect();
        refs.into_iter().collect()
    }

    /// Container value types by nesting depth: entry `d` is the map reached after `d`
    /// key lookups, the last entry is the record type itself.
    pub fn nested_types(
        &self,
        record: &str,
        key_type: impl Fn(&FieldDef) -> String,
        map: impl Fn(&str, &str) -> String,
    ) -> Vec<String> {
        let mut types = vec![record.to_string()];
        for key in self.keys.iter().rev() {
            let inner = types[0].clone();
            types.insert(0, map(&key_type(key), &inner));
        }
        types
    }
}

/// Header comment body shared by every generated file
pub fn banner(table: &str) -> String {
    format!("Generated by gable from {}. Do not edit.", table)
}

/// Append `_` to names that collide with a reserved word.
pub fn safe_ident(name: &str, reserved: &[&str]) -> String {
    if reserved.contains(&name) {
        format!("{}_", name)
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_lookup() {
        assert_eq!(extension_for("csharp"), Some("cs"));
        assert_eq!(extension_for("C#"), Some("cs"));
        assert_eq!(extension_for("golang"), Some("go"));
        assert_eq!(extension_for("c++"), Some("cpp"));
        assert_eq!(extension_for("TypeScript"), Some("ts"));
        assert_eq!(extension_for("cj"), Some("cj"));
        assert_eq!(extension_for("rust"), None);
        assert_eq!(extension_for(""), None);
    }

    #[test]
    fn test_language_table_is_consistent() {
        for lang in LANGUAGES {
            assert_eq!(resolve_language(lang.tag), Some(lang));
            for alias in lang.aliases {
                assert_eq!(resolve_language(alias).map(|l| l.tag), Some(lang.tag));
            }
        }
    }

    #[test]
    fn test_safe_ident() {
        assert_eq!(safe_ident("None", &["None", "class"]), "None_");
        assert_eq!(safe_ident("Normal", &["None", "class"]), "Normal");
    }
}
