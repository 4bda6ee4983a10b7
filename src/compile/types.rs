use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::error::{CompileError, Result};
use crate::schema::{EnumTable, TableSchema};
use crate::sheet::SheetKind;

/// Typed value of one field in one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Empty link reference
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// Fixed-arity float tuple (x, y[, z[, w]])
    Vector(Vec<f64>),
    List(Vec<Value>),
    Enum { symbol: String, value: i64 },
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Key atom for duplicate detection and link lookup
    pub fn key_atom(&self) -> Option<KeyAtom> {
        match self {
            Value::Int(i) => Some(KeyAtom::Int(*i)),
            Value::Str(s) => Some(KeyAtom::Str(s.clone())),
            Value::Bool(b) => Some(KeyAtom::Bool(*b)),
            Value::Enum { value, .. } => Some(KeyAtom::Int(*value)),
            _ => None,
        }
    }
}

/// Hashable projection of a key value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyAtom {
    Int(i64),
    Str(String),
    Bool(bool),
}

impl std::fmt::Display for KeyAtom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyAtom::Int(i) => write!(f, "{}", i),
            KeyAtom::Str(s) => write!(f, "\"{}\"", s),
            KeyAtom::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Ordered key tuple of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(pub Vec<KeyAtom>);

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|a| a.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// One data row as typed values in schema field order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// 0-based source row
    pub row: u32,
    pub values: IndexMap<String, Value>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }
}

/// Schema plus its ordered records. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTable {
    pub schema: TableSchema,
    pub records: Vec<Record>,
}

impl CompiledTable {
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn kind(&self) -> SheetKind {
        self.schema.kind
    }

    pub fn key_of(&self, record: &Record) -> Option<RecordKey> {
        key_of(&self.schema, record)
    }

    /// Every distinct key atom found in `field`
    pub fn field_atoms(&self, field: &str) -> HashSet<KeyAtom> {
        self.records
            .iter()
            .filter_map(|r| r.get(field).and_then(Value::key_atom))
            .collect()
    }

    pub fn find(&self, key: &RecordKey) -> Option<&Record> {
        self.records
            .iter()
            .find(|r| self.key_of(r).as_ref() == Some(key))
    }
}

/// Key tuple of `record` under `schema`; `None` when a key value is missing.
pub fn key_of(schema: &TableSchema, record: &Record) -> Option<RecordKey> {
    schema
        .key
        .fields()
        .iter()
        .map(|name| record.get(name).and_then(Value::key_atom))
        .collect::<Option<Vec<_>>>()
        .map(RecordKey)
}

/// Compiled tables by name. Every name is written at most once.
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: BTreeMap<String, Arc<CompiledTable>>,
    enums: BTreeMap<String, Arc<EnumTable>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_table(&mut self, table: CompiledTable) -> Result<Arc<CompiledTable>> {
        let name = table.name().to_string();
        self.check_free(&name)?;
        let table = Arc::new(table);
        self.tables.insert(name, Arc::clone(&table));
        Ok(table)
    }

    pub fn insert_enum(&mut self, table: EnumTable) -> Result<Arc<EnumTable>> {
        let name = table.name.clone();
        self.check_free(&name)?;
        let table = Arc::new(table);
        self.enums.insert(name, Arc::clone(&table));
        Ok(table)
    }

    fn check_free(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            return Err(CompileError::duplicate_key(format!(
                "table '{}' is already registered",
                name
            )));
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name) || self.enums.contains_key(name)
    }

    pub fn table(&self, name: &str) -> Option<&Arc<CompiledTable>> {
        self.tables.get(name)
    }

    pub fn enum_table(&self, name: &str) -> Option<&Arc<EnumTable>> {
        self.enums.get(name)
    }

    /// Tables in name order
    pub fn tables(&self) -> impl Iterator<Item = &Arc<CompiledTable>> {
        self.tables.values()
    }

    /// Enum tables in name order
    pub fn enums(&self) -> impl Iterator<Item = &Arc<EnumTable>> {
        self.enums.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len() + self.enums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every registered name, tables and enums merged, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .keys()
            .chain(self.enums.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }
}
