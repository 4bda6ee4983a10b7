use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

use super::coerce::TypeCoercer;
use super::types::*;
use crate::error::{CellLocation, CompileError, Result};
use crate::schema::{FieldDef, FieldSource, LinkTarget, TableSchema};
use crate::sheet::{Sheet, SheetKind, DATA_LAYOUT, KV_LAYOUT};

/// Builds typed records from a sheet's data rows, strictly in row order.
pub struct RecordBuilder<'a> {
    registry: &'a TableRegistry,
    coercer: TypeCoercer<'a>,
}

/// Link check waiting for the table's own rows
struct PendingSelfLink {
    row: u32,
    col: u32,
    field: String,
    atom: KeyAtom,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(registry: &'a TableRegistry) -> Self {
        RecordBuilder {
            registry,
            coercer: TypeCoercer::new(registry),
        }
    }

    pub fn build(&self, schema: &TableSchema, sheet: &Sheet) -> Result<CompiledTable> {
        let records = match schema.kind {
            SheetKind::Data => self.build_rows(schema, sheet)?,
            SheetKind::Kv => vec![self.build_kv(schema, sheet)?],
            SheetKind::Enum => {
                return Err(CompileError::layout("enum sheets do not produce records")
                    .in_sheet(&sheet.name))
            }
        };
        Ok(CompiledTable {
            schema: schema.clone(),
            records,
        })
    }

    fn build_rows(&self, schema: &TableSchema, sheet: &Sheet) -> Result<Vec<Record>> {
        let grid = &sheet.grid;
        let at = |row: u32, col: u32| CellLocation::cell(&sheet.name, row, col);
        let links = self.link_indexes(schema, &sheet.name)?;

        let mut records: Vec<Record> = Vec::new();
        let mut seen: HashMap<RecordKey, u32> = HashMap::new();
        let mut pending: Vec<PendingSelfLink> = Vec::new();

        for row in DATA_LAYOUT.first_data_row..grid.row_count() {
            if grid.is_blank_row(row) {
                continue;
            }

            let mut values = IndexMap::with_capacity(schema.fields.len());
            for field in &schema.fields {
                let col = column_of(field);
                let cell = grid.cell(row, col);

                if schema.is_key(&field.name) && cell.is_blank() {
                    return Err(CompileError::layout(format!(
                        "key field '{}' is empty",
                        field.name
                    ))
                    .at(at(row, col)));
                }

                let value = self
                    .coercer
                    .coerce(cell, &field.declared)
                    .map_err(|e| e.at(at(row, col)))?;

                if let (Some(target), Some(atom)) = (field.link(), value.key_atom()) {
                    match links.get(&field.name) {
                        Some(index) => {
                            if !index.contains(&atom) {
                                return Err(dangling(&atom, target).at(at(row, col)));
                            }
                        }
                        None => pending.push(PendingSelfLink {
                            row,
                            col,
                            field: target.field.clone(),
                            atom,
                        }),
                    }
                }

                values.insert(field.name.clone(), value);
            }

            let record = Record { row, values };
            if let Some(key) = key_of(schema, &record) {
                if let Some(first_row) = seen.get(&key) {
                    let key_col = schema
                        .key_fields()
                        .first()
                        .map(|f| column_of(f))
                        .unwrap_or(0);
                    return Err(CompileError::duplicate_key(format!(
                        "key {} already used on row {}",
                        key,
                        first_row + 1
                    ))
                    .at(at(row, key_col)));
                }
                seen.insert(key, row);
            }
            records.push(record);
        }

        if !pending.is_empty() {
            let mut own: HashMap<&str, HashSet<KeyAtom>> = HashMap::new();
            for link in &pending {
                let atoms = own.entry(link.field.as_str()).or_insert_with(|| {
                    records
                        .iter()
                        .filter_map(|r| r.get(&link.field).and_then(Value::key_atom))
                        .collect()
                });
                if !atoms.contains(&link.atom) {
                    let target = LinkTarget {
                        table: schema.name.clone(),
                        field: link.field.clone(),
                    };
                    return Err(dangling(&link.atom, &target).at(at(link.row, link.col)));
                }
            }
        }

        tracing::debug!(table = %schema.name, records = records.len(), "built records");
        Ok(records)
    }

    /// Key sets of every table linked from `schema`, by linking field. Self-links are
    /// left out and checked once the table's own rows exist.
    fn link_indexes(
        &self,
        schema: &TableSchema,
        sheet: &str,
    ) -> Result<HashMap<String, HashSet<KeyAtom>>> {
        let mut indexes = HashMap::new();
        for field in &schema.fields {
            let Some(target) = field.link() else {
                continue;
            };
            let location = CellLocation::cell(sheet, DATA_LAYOUT.link_row, column_of(field));

            let target_schema = if target.table == schema.name {
                schema
            } else {
                let table = self.registry.table(&target.table).ok_or_else(|| {
                    CompileError::unresolved(format!("linked table '{}' does not exist", target.table))
                        .at(location.clone())
                })?;
                &table.schema
            };

            if !target_schema.is_key(&target.field) {
                return Err(CompileError::unresolved(format!(
                    "link {} does not name a key field",
                    target
                ))
                .at(location));
            }

            if target.table != schema.name {
                if let Some(table) = self.registry.table(&target.table) {
                    indexes.insert(field.name.clone(), table.field_atoms(&target.field));
                }
            }
        }
        Ok(indexes)
    }

    fn build_kv(&self, schema: &TableSchema, sheet: &Sheet) -> Result<Record> {
        let mut values = IndexMap::with_capacity(schema.fields.len());
        for field in &schema.fields {
            let row = match field.source {
                FieldSource::Row(row) => row,
                FieldSource::Column(_) => KV_LAYOUT.first_data_row,
            };
            let location = CellLocation::cell(&sheet.name, row, KV_LAYOUT.value_col);
            let value = self
                .coercer
                .coerce(sheet.grid.cell(row, KV_LAYOUT.value_col), &field.declared)
                .map_err(|e| e.at(location))?;
            values.insert(field.name.clone(), value);
        }
        Ok(Record {
            row: KV_LAYOUT.first_data_row,
            values,
        })
    }
}

fn column_of(field: &FieldDef) -> u32 {
    match field.source {
        FieldSource::Column(col) => col,
        FieldSource::Row(_) => KV_LAYOUT.value_col,
    }
}

fn dangling(atom: &KeyAtom, target: &LinkTarget) -> CompileError {
    CompileError::unresolved(format!("{} is not a key of {}", atom, target))
}
