use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::error::{CompileError, Result};
use crate::sheet::SheetKind;

/// Scalar types a cell can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    /// 32-bit integer
    Int,
    /// 64-bit integer
    Long,
    Float,
    Bool,
    String,
    /// Seconds since midnight
    Time,
    /// Unix seconds
    Date,
    /// `%`, stored as a fraction
    Percent,
    /// `‰`, stored as a fraction
    Permille,
    /// `‱`, stored as a fraction
    Permyriad,
}

impl Primitive {
    pub fn keyword(self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Float => "float",
            Primitive::Bool => "bool",
            Primitive::String => "string",
            Primitive::Time => "time",
            Primitive::Date => "date",
            Primitive::Percent => "%",
            Primitive::Permille => "‰",
            Primitive::Permyriad => "‱",
        }
    }

    fn from_keyword(text: &str) -> Option<Primitive> {
        let primitive = match text.to_ascii_lowercase().as_str() {
            "int" => Primitive::Int,
            "long" => Primitive::Long,
            "float" => Primitive::Float,
            "bool" => Primitive::Bool,
            "string" => Primitive::String,
            "time" => Primitive::Time,
            "date" => Primitive::Date,
            "%" => Primitive::Percent,
            "‰" => Primitive::Permille,
            "‱" => Primitive::Permyriad,
            _ => return None,
        };
        Some(primitive)
    }

    /// Integer-valued primitives, encoded as varints
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            Primitive::Int | Primitive::Long | Primitive::Time | Primitive::Date
        )
    }

    /// Float-valued primitives, encoded as fixed32
    pub fn is_fractional(self) -> bool {
        matches!(
            self,
            Primitive::Float | Primitive::Percent | Primitive::Permille | Primitive::Permyriad
        )
    }

    /// Divisor applied to whole-number percentage-family cells
    pub fn scale(self) -> f64 {
        match self {
            Primitive::Percent => 100.0,
            Primitive::Permille => 1000.0,
            Primitive::Permyriad => 10000.0,
            _ => 1.0,
        }
    }
}

/// Element type of a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    Primitive(Primitive),
    Vector(u8),
}

/// Cross-table reference written `Table.field` in the link row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkTarget {
    pub table: String,
    pub field: String,
}

impl std::fmt::Display for LinkTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.field)
    }
}

impl LinkTarget {
    pub fn parse(text: &str) -> Result<LinkTarget> {
        let (table, field) = text.trim().split_once('.').ok_or_else(|| {
            CompileError::layout(format!("link '{}' must be written Table.field", text))
        })?;
        if !is_identifier(table) || !is_identifier(field) {
            return Err(CompileError::layout(format!(
                "link '{}' must be written Table.field",
                text
            )));
        }
        Ok(LinkTarget {
            table: table.to_string(),
            field: field.to_string(),
        })
    }
}

/// Type declared in a sheet's type row (or type column for KV sheets)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclaredType {
    Primitive(Primitive),
    /// Fixed-arity float tuple, 2 to 4 components
    Vector(u8),
    List(ElementType),
    /// Symbol of the named enum table
    EnumRef(String),
    /// Value that must exist in another table's key column
    LinkRef { target: LinkTarget, key: Primitive },
}

impl DeclaredType {
    /// Parse the text of a type cell. Link references are attached separately with
    /// [`DeclaredType::with_link`] because they come from the link row.
    pub fn parse(text: &str) -> Result<DeclaredType> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CompileError::type_error("missing declared type"));
        }

        if let Some(inner) = text.strip_suffix("[]") {
            let element = match DeclaredType::parse(inner)? {
                DeclaredType::Primitive(p) => ElementType::Primitive(p),
                DeclaredType::Vector(n) => ElementType::Vector(n),
                _ => {
                    return Err(CompileError::type_error(format!(
                        "'{}' is not a list of primitives or vectors",
                        text
                    )))
                }
            };
            return Ok(DeclaredType::List(element));
        }

        if let Some(captures) = enum_ref_pattern().and_then(|re| re.captures(text)) {
            let name = captures[1].trim();
            if !is_identifier(name) {
                return Err(CompileError::type_error(format!(
                    "'{}' does not name an enum table",
                    text
                )));
            }
            return Ok(DeclaredType::EnumRef(name.to_string()));
        }

        match text.to_ascii_lowercase().as_str() {
            "vector2" => return Ok(DeclaredType::Vector(2)),
            "vector3" => return Ok(DeclaredType::Vector(3)),
            "vector4" => return Ok(DeclaredType::Vector(4)),
            _ => {}
        }

        Primitive::from_keyword(text)
            .map(DeclaredType::Primitive)
            .ok_or_else(|| CompileError::type_error(format!("unrecognized type '{}'", text)))
    }

    /// Turn an `int`, `long` or `string` field into a link reference.
    pub fn with_link(self, target: LinkTarget) -> Result<DeclaredType> {
        match self {
            DeclaredType::Primitive(key @ (Primitive::Int | Primitive::Long | Primitive::String)) => {
                Ok(DeclaredType::LinkRef { target, key })
            }
            other => Err(CompileError::type_error(format!(
                "link {} requires an int, long or string field, found '{}'",
                target, other
            ))),
        }
    }

    /// Types allowed in key fields
    pub fn can_be_key(&self) -> bool {
        matches!(
            self,
            DeclaredType::Primitive(Primitive::Int | Primitive::Long | Primitive::String | Primitive::Bool)
                | DeclaredType::EnumRef(_)
                | DeclaredType::LinkRef { .. }
        )
    }

    pub fn enum_name(&self) -> Option<&str> {
        match self {
            DeclaredType::EnumRef(name) => Some(name),
            _ => None,
        }
    }

    pub fn link(&self) -> Option<&LinkTarget> {
        match self {
            DeclaredType::LinkRef { target, .. } => Some(target),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclaredType::Primitive(p) => f.write_str(p.keyword()),
            DeclaredType::Vector(n) => write!(f, "vector{}", n),
            DeclaredType::List(ElementType::Primitive(p)) => write!(f, "{}[]", p.keyword()),
            DeclaredType::List(ElementType::Vector(n)) => write!(f, "vector{}[]", n),
            DeclaredType::EnumRef(name) => write!(f, "enum({})", name),
            DeclaredType::LinkRef { key, .. } => f.write_str(key.keyword()),
        }
    }
}

/// Set of platform tags. On a field an empty set means "every platform"; as a filter
/// an empty set selects every field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformSet(BTreeSet<String>);

impl PlatformSet {
    pub fn all() -> Self {
        PlatformSet(BTreeSet::new())
    }

    /// Split a platform cell on `,` `|` `;` and whitespace.
    pub fn parse(text: &str) -> Self {
        PlatformSet(
            text.split(|c: char| c == ',' || c == '|' || c == ';' || c.is_whitespace())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_lowercase)
                .collect(),
        )
    }

    pub fn single(tag: &str) -> Self {
        PlatformSet::parse(tag)
    }

    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(&tag.to_lowercase())
    }

    pub fn intersects(&self, other: &PlatformSet) -> bool {
        self.0.iter().any(|t| other.0.contains(t))
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Where a field's values live in the source grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldSource {
    /// DATA sheets: one column per field
    Column(u32),
    /// KV sheets: one row per field
    Row(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub declared: DeclaredType,
    pub platforms: PlatformSet,
    pub description: String,
    /// 1-based position in the full schema; stable binary field tag
    pub tag: u32,
    pub source: FieldSource,
}

impl FieldDef {
    pub fn link(&self) -> Option<&LinkTarget> {
        self.declared.link()
    }
}

/// Ordered key field names. DATA tables have at least one; KV tables have none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec(pub Vec<String>);

impl KeySpec {
    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|k| k == name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub kind: SheetKind,
    pub fields: Vec<FieldDef>,
    pub key: KeySpec,
}

impl TableSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.key.contains(name)
    }

    pub fn key_fields(&self) -> Vec<&FieldDef> {
        self.key
            .fields()
            .iter()
            .filter_map(|name| self.field(name))
            .collect()
    }

    /// Enum tables referenced by any field
    pub fn enum_dependencies(&self) -> BTreeSet<String> {
        self.fields
            .iter()
            .filter_map(|f| f.declared.enum_name().map(str::to_string))
            .collect()
    }

    /// Other tables referenced through link fields (self-links excluded)
    pub fn link_dependencies(&self) -> BTreeSet<String> {
        self.fields
            .iter()
            .filter_map(|f| f.link())
            .filter(|t| t.table != self.name)
            .map(|t| t.table.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumEntry {
    pub symbol: String,
    pub value: i64,
    pub description: String,
}

/// Symbolic-name-to-value mapping compiled from an ENUM sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumTable {
    pub name: String,
    pub entries: Vec<EnumEntry>,
}

impl EnumTable {
    /// Resolve a symbol name or a literal value present in the table.
    pub fn resolve(&self, raw: &str) -> Option<&EnumEntry> {
        let raw = raw.trim();
        if let Some(entry) = self.entries.iter().find(|e| e.symbol == raw) {
            return Some(entry);
        }
        let value = raw.parse::<i64>().ok().or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        })?;
        self.by_value(value)
    }

    pub fn by_value(&self, value: i64) -> Option<&EnumEntry> {
        self.entries.iter().find(|e| e.value == value)
    }

    pub fn first(&self) -> Option<&EnumEntry> {
        self.entries.first()
    }
}

/// Output of a sheet parser
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedSheet {
    Table(TableSchema),
    Enum(EnumTable),
}

impl ParsedSheet {
    pub fn name(&self) -> &str {
        match self {
            ParsedSheet::Table(schema) => &schema.name,
            ParsedSheet::Enum(table) => &table.name,
        }
    }
}

fn enum_ref_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)^enum\((.*)\)$").ok())
        .as_ref()
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(text: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_declared_types() {
        assert_eq!(DeclaredType::parse("int").unwrap(), DeclaredType::Primitive(Primitive::Int));
        assert_eq!(DeclaredType::parse(" Float ").unwrap(), DeclaredType::Primitive(Primitive::Float));
        assert_eq!(DeclaredType::parse("vector3").unwrap(), DeclaredType::Vector(3));
        assert_eq!(
            DeclaredType::parse("long[]").unwrap(),
            DeclaredType::List(ElementType::Primitive(Primitive::Long))
        );
        assert_eq!(
            DeclaredType::parse("vector2[]").unwrap(),
            DeclaredType::List(ElementType::Vector(2))
        );
        assert_eq!(
            DeclaredType::parse("enum(EPlayerType)").unwrap(),
            DeclaredType::EnumRef("EPlayerType".into())
        );
        assert_eq!(DeclaredType::parse("‰").unwrap(), DeclaredType::Primitive(Primitive::Permille));
    }

    #[test]
    fn test_parse_rejects_unknown_and_nested_types() {
        assert!(DeclaredType::parse("double").is_err());
        assert!(DeclaredType::parse("int[][]").is_err());
        assert!(DeclaredType::parse("enum(E Player)").is_err());
        assert!(DeclaredType::parse("enum(EPlayerType)[]").is_err());
        assert!(DeclaredType::parse("").is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for text in ["int", "string[]", "vector4", "enum(EKind)", "%", "date"] {
            let parsed = DeclaredType::parse(text).unwrap();
            assert_eq!(parsed.to_string(), text);
        }
    }

    #[test]
    fn test_link_target_syntax() {
        let target = LinkTarget::parse("Item.id").unwrap();
        assert_eq!(target.table, "Item");
        assert_eq!(target.field, "id");
        assert!(LinkTarget::parse("Item").is_err());
        assert!(LinkTarget::parse("Item.").is_err());
        assert!(LinkTarget::parse("1Item.id").is_err());
    }

    #[test]
    fn test_link_requires_scalar_key_type() {
        let target = LinkTarget::parse("Item.id").unwrap();
        assert!(DeclaredType::parse("int").unwrap().with_link(target.clone()).is_ok());
        assert!(DeclaredType::parse("float").unwrap().with_link(target).is_err());
    }

    #[test]
    fn test_platform_set_parsing() {
        let set = PlatformSet::parse("Client, server|cs");
        assert!(set.contains("client"));
        assert!(set.contains("SERVER"));
        assert!(set.contains("cs"));
        assert!(PlatformSet::parse("  ").is_all());
        assert!(set.intersects(&PlatformSet::single("server")));
        assert!(!set.intersects(&PlatformSet::single("ts")));
    }

    #[test]
    fn test_enum_resolves_symbol_or_value() {
        let table = EnumTable {
            name: "EPlayerType".into(),
            entries: vec![
                EnumEntry { symbol: "None".into(), value: 0, description: String::new() },
                EnumEntry { symbol: "Normal".into(), value: 1, description: String::new() },
            ],
        };
        assert_eq!(table.resolve("Normal").map(|e| e.value), Some(1));
        assert_eq!(table.resolve("0").map(|e| e.symbol.as_str()), Some("None"));
        assert_eq!(table.resolve("1.0").map(|e| e.value), Some(1));
        assert!(table.resolve("Special").is_none());
        assert!(table.resolve("7").is_none());
    }
}
