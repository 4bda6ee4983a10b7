use serde::{Deserialize, Serialize};

use crate::schema::{FieldDef, KeySpec, PlatformSet, TableSchema};
use crate::sheet::SheetKind;

/// Platform tag that selects every field
pub const ALL_PLATFORMS: &str = "*";

/// Schema narrowed to the fields of one platform. Field order and binary tags are those
/// of the full schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedSchema {
    pub name: String,
    pub kind: SheetKind,
    pub fields: Vec<FieldDef>,
    pub key: KeySpec,
}

impl ProjectedSchema {
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
}

/// Selects the fields emitted for one platform tag set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetFilter {
    platforms: PlatformSet,
}

impl TargetFilter {
    pub fn new(platforms: PlatformSet) -> Self {
        TargetFilter { platforms }
    }

    /// Filter for one tag; `*` or an empty tag keeps every field.
    pub fn for_tag(tag: &str) -> Self {
        if tag.trim() == ALL_PLATFORMS {
            return TargetFilter::new(PlatformSet::all());
        }
        TargetFilter::new(PlatformSet::single(tag))
    }

    pub fn platforms(&self) -> &PlatformSet {
        &self.platforms
    }

    pub fn includes(&self, field: &FieldDef, is_key: bool) -> bool {
        is_key
            || self.platforms.is_all()
            || field.platforms.is_all()
            || field.platforms.intersects(&self.platforms)
    }

    pub fn project(&self, schema: &TableSchema) -> ProjectedSchema {
        ProjectedSchema {
            name: schema.name.clone(),
            kind: schema.kind,
            fields: schema
                .fields
                .iter()
                .filter(|f| self.includes(f, schema.is_key(&f.name)))
                .cloned()
                .collect(),
            key: schema.key.clone(),
        }
    }
}
