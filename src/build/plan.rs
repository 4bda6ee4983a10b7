use std::collections::{BTreeMap, BTreeSet};

use crate::compile::TableRegistry;
use crate::error::{CompileError, Result};
use crate::schema::{DeclaredType, FieldSource, Primitive, TableSchema};
use crate::sheet::DATA_LAYOUT;

/// Build order for DATA tables: every table in a wave only links to tables already in the
/// registry or in an earlier wave.
#[derive(Debug, Default)]
pub struct DataPlan {
    pub waves: Vec<Vec<String>>,
    /// Tables rejected before building, with the reason
    pub failures: Vec<(String, CompileError)>,
}

impl DataPlan {
    pub fn table_count(&self) -> usize {
        self.waves.iter().map(Vec::len).sum()
    }
}

/// Resolve the references of every DATA schema and order the tables by their links.
///
/// `failed` names sheets that already failed; references to them are unresolved. Tables on a
/// link cycle are rejected, as is every table that links into one.
pub fn plan_data_tables(
    schemas: &[&TableSchema],
    registry: &TableRegistry,
    failed: &BTreeSet<String>,
) -> DataPlan {
    let mut plan = DataPlan::default();
    let by_name: BTreeMap<&str, &TableSchema> =
        schemas.iter().map(|s| (s.name.as_str(), *s)).collect();

    // Edges to other DATA tables still in the plan
    let mut deps: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for schema in schemas {
        match check_references(schema, registry, &by_name, failed) {
            Ok(links) => {
                deps.insert(schema.name.as_str(), links);
            }
            Err(err) => plan.failures.push((schema.name.clone(), err)),
        }
    }

    // Tables that link to a rejected table are rejected too
    loop {
        let rejected: Vec<(&str, &str)> = deps
            .iter()
            .filter_map(|(name, links)| {
                links
                    .iter()
                    .find(|dep| !deps.contains_key(*dep))
                    .map(|dep| (*name, *dep))
            })
            .collect();
        if rejected.is_empty() {
            break;
        }
        for (name, dep) in rejected {
            deps.remove(name);
            plan.failures.push((
                name.to_string(),
                CompileError::unresolved(format!("linked table '{}' failed to compile", dep))
                    .in_sheet(name),
            ));
        }
    }

    let mut remaining = deps;
    let mut done: BTreeSet<&str> = BTreeSet::new();
    loop {
        let wave: Vec<&str> = remaining
            .iter()
            .filter(|(_, links)| links.iter().all(|dep| done.contains(dep)))
            .map(|(name, _)| *name)
            .collect();
        if wave.is_empty() {
            break;
        }
        for name in &wave {
            remaining.remove(name);
            done.insert(*name);
        }
        plan.waves.push(wave.into_iter().map(str::to_string).collect());
    }

    for name in remaining.keys() {
        let cycle: Vec<&str> = remaining
            .keys()
            .filter(|other| reaches(&remaining, name, other) && reaches(&remaining, other, name))
            .copied()
            .collect();
        let err = if cycle.contains(name) {
            CompileError::unresolved(format!("link cycle between tables {}", cycle.join(", ")))
        } else {
            CompileError::unresolved("links into a table on a link cycle")
        };
        plan.failures.push((name.to_string(), err.in_sheet(name)));
    }

    plan.failures.sort_by(|a, b| a.0.cmp(&b.0));
    plan
}

/// Check enum and link targets; returns the DATA tables this schema links to.
fn check_references<'a>(
    schema: &TableSchema,
    registry: &TableRegistry,
    data_tables: &BTreeMap<&'a str, &'a TableSchema>,
    failed: &BTreeSet<String>,
) -> Result<BTreeSet<&'a str>> {
    let mut links = BTreeSet::new();

    for field in &schema.fields {
        let col = match field.source {
            FieldSource::Column(col) => col,
            FieldSource::Row(_) => 0,
        };

        if let Some(name) = field.declared.enum_name() {
            if registry.enum_table(name).is_none() {
                let reason = if failed.contains(name) {
                    format!("enum table '{}' failed to compile", name)
                } else {
                    format!("unknown enum table '{}'", name)
                };
                return Err(CompileError::unresolved(reason).at_cell(
                    &schema.name,
                    DATA_LAYOUT.type_row,
                    col,
                ));
            }
        }

        let DeclaredType::LinkRef { target, key } = &field.declared else {
            continue;
        };
        let target_schema = if target.table == schema.name {
            schema
        } else if let Some((name, linked)) = data_tables.get_key_value(target.table.as_str()) {
            links.insert(*name);
            *linked
        } else if let Some(table) = registry.table(&target.table) {
            &table.schema
        } else {
            let reason = if failed.contains(&target.table) {
                format!("linked table '{}' failed to compile", target.table)
            } else {
                format!("unknown linked table '{}'", target.table)
            };
            return Err(CompileError::unresolved(reason).at_cell(
                &schema.name,
                DATA_LAYOUT.link_row,
                col,
            ));
        };

        // A missing or non-key target field is reported when the rows are built
        if let Some(target_field) = target_schema.field(&target.field) {
            if !key_matches(*key, &target_field.declared) {
                return Err(CompileError::type_error(format!(
                    "field '{}' is {} but link {} holds {} keys",
                    field.name,
                    key.keyword(),
                    target,
                    target_field.declared
                ))
                .at_cell(&schema.name, DATA_LAYOUT.type_row, col));
            }
        }
    }

    Ok(links)
}

/// Whether values of a link field typed `key` can equal keys of the `target` field
fn key_matches(key: Primitive, target: &DeclaredType) -> bool {
    let target_key = match target {
        DeclaredType::Primitive(p) => *p,
        DeclaredType::LinkRef { key, .. } => *key,
        DeclaredType::EnumRef(_) => Primitive::Int,
        _ => return false,
    };
    match key {
        Primitive::String => target_key == Primitive::String,
        _ => target_key.is_integral(),
    }
}

/// Whether `to` is reachable from `from` in one or more steps
fn reaches(graph: &BTreeMap<&str, BTreeSet<&str>>, from: &str, to: &str) -> bool {
    let mut stack: Vec<&str> = graph
        .get(from)
        .map(|links| links.iter().copied().collect())
        .unwrap_or_default();
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if seen.insert(node) {
            if let Some(links) = graph.get(node) {
                stack.extend(links.iter().copied());
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::{DeclaredType, EnumEntry, EnumTable, FieldDef, KeySpec, LinkTarget, PlatformSet};
    use crate::sheet::SheetKind;

    fn field(name: &str, declared: DeclaredType, col: u32) -> FieldDef {
        FieldDef {
            name: name.into(),
            declared,
            platforms: PlatformSet::all(),
            description: String::new(),
            tag: col + 1,
            source: FieldSource::Column(col),
        }
    }

    /// Table keyed by `id` with one link field per entry of `links`
    fn table(name: &str, links: &[&str]) -> TableSchema {
        let mut fields = vec![field("id", DeclaredType::parse("int").unwrap(), 0)];
        for (i, target) in links.iter().enumerate() {
            let declared = DeclaredType::parse("int")
                .unwrap()
                .with_link(LinkTarget::parse(&format!("{}.id", target)).unwrap())
                .unwrap();
            fields.push(field(&format!("ref{}", i), declared, i as u32 + 1));
        }
        TableSchema {
            name: name.into(),
            kind: SheetKind::Data,
            fields,
            key: KeySpec(vec!["id".into()]),
        }
    }

    #[test]
    fn test_waves_follow_links() {
        let item = table("Item", &[]);
        let shop = table("Shop", &["Item"]);
        let npc = table("Npc", &["Shop", "Item"]);
        let registry = TableRegistry::new();

        let plan = plan_data_tables(&[&npc, &shop, &item], &registry, &BTreeSet::new());
        assert!(plan.failures.is_empty());
        assert_eq!(
            plan.waves,
            vec![vec!["Item".to_string()], vec!["Shop".to_string()], vec!["Npc".to_string()]]
        );
    }

    #[test]
    fn test_self_link_does_not_block() {
        let node = table("Node", &["Node"]);
        let plan = plan_data_tables(&[&node], &TableRegistry::new(), &BTreeSet::new());
        assert_eq!(plan.waves, vec![vec!["Node".to_string()]]);
    }

    #[test]
    fn test_cycle_members_and_dependents_are_rejected() {
        let a = table("A", &["B"]);
        let b = table("B", &["A"]);
        let c = table("C", &["A"]);
        let d = table("D", &[]);

        let plan = plan_data_tables(&[&a, &b, &c, &d], &TableRegistry::new(), &BTreeSet::new());
        assert_eq!(plan.waves, vec![vec!["D".to_string()]]);

        let failed: Vec<&str> = plan.failures.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(failed, vec!["A", "B", "C"]);
        assert!(plan.failures.iter().all(|(_, e)| e.kind == ErrorKind::UnresolvedReference));
        assert!(plan.failures[0].1.message.contains("link cycle between tables A, B"));
        assert!(plan.failures[2].1.message.contains("link cycle"));
    }

    #[test]
    fn test_missing_enum_is_unresolved_at_type_cell() {
        let mut player = table("Player", &[]);
        player
            .fields
            .push(field("kind", DeclaredType::parse("enum(EPlayerType)").unwrap(), 1));

        let plan = plan_data_tables(&[&player], &TableRegistry::new(), &BTreeSet::new());
        let (name, err) = &plan.failures[0];
        assert_eq!(name, "Player");
        assert_eq!(err.kind, ErrorKind::UnresolvedReference);
        assert_eq!(err.to_string(), "unresolved reference at Player!B3: unknown enum table 'EPlayerType'");
    }

    #[test]
    fn test_failed_dependency_propagates() {
        let shop = table("Shop", &["Item"]);
        let npc = table("Npc", &["Shop"]);
        let failed: BTreeSet<String> = ["Item".to_string()].into_iter().collect();

        let plan = plan_data_tables(&[&shop, &npc], &TableRegistry::new(), &failed);
        assert_eq!(plan.table_count(), 0);
        assert!(plan.failures[1].1.message.contains("'Item' failed to compile"));
        assert!(plan.failures[0].1.message.contains("'Shop' failed to compile"));
    }

    #[test]
    fn test_link_key_type_mismatch_fails_once_at_plan_time() {
        let item = table("Item", &[]);
        let mut shop = table("Shop", &[]);
        let declared = DeclaredType::parse("string")
            .unwrap()
            .with_link(LinkTarget::parse("Item.id").unwrap())
            .unwrap();
        shop.fields.push(field("item", declared, 1));

        let plan = plan_data_tables(&[&shop, &item], &TableRegistry::new(), &BTreeSet::new());
        assert_eq!(plan.waves, vec![vec!["Item".to_string()]]);
        assert_eq!(plan.failures.len(), 1);
        let (name, err) = &plan.failures[0];
        assert_eq!(name, "Shop");
        assert_eq!(err.kind, ErrorKind::Type);
        assert_eq!(
            err.to_string(),
            "type error at Shop!B3: field 'item' is string but link Item.id holds int keys"
        );
    }

    #[test]
    fn test_long_link_into_int_key_is_accepted() {
        let item = table("Item", &[]);
        let mut shop = table("Shop", &[]);
        let declared = DeclaredType::parse("long")
            .unwrap()
            .with_link(LinkTarget::parse("Item.id").unwrap())
            .unwrap();
        shop.fields.push(field("item", declared, 1));

        let plan = plan_data_tables(&[&shop, &item], &TableRegistry::new(), &BTreeSet::new());
        assert!(plan.failures.is_empty());
        assert_eq!(plan.table_count(), 2);
    }

    #[test]
    fn test_links_into_registry_tables_resolve() {
        let mut registry = TableRegistry::new();
        registry
            .insert_enum(EnumTable {
                name: "EKind".into(),
                entries: vec![EnumEntry { symbol: "A".into(), value: 0, description: String::new() }],
            })
            .unwrap();
        let mut item = table("Item", &[]);
        item.fields.push(field("kind", DeclaredType::parse("enum(EKind)").unwrap(), 1));

        let plan = plan_data_tables(&[&item], &registry, &BTreeSet::new());
        assert!(plan.failures.is_empty());
        assert_eq!(plan.table_count(), 1);
    }
}
