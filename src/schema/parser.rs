use std::collections::HashSet;

use super::types::*;
use crate::error::{CellLocation, CompileError, Result};
use crate::sheet::{CellValue, Sheet, SheetKind, DATA_LAYOUT, ENUM_LAYOUT, KV_LAYOUT};

/// Marks a key field in the field-name cell
pub const KEY_MARKER: char = '*';

/// Turns one sheet's metadata rows into a schema. Each sheet kind has its own parser
/// because DATA sheets are field-per-column while KV and ENUM sheets are field-per-row.
pub trait SheetParser: Send + Sync {
    fn parse(&self, sheet: &Sheet) -> Result<ParsedSheet>;
}

pub struct DataSheetParser;
pub struct KvSheetParser;
pub struct EnumSheetParser;

/// Parser for a sheet kind
pub fn parser_for(kind: SheetKind) -> &'static dyn SheetParser {
    match kind {
        SheetKind::Data => &DataSheetParser,
        SheetKind::Kv => &KvSheetParser,
        SheetKind::Enum => &EnumSheetParser,
    }
}

/// Parse a sheet with the parser matching its kind.
pub fn parse_sheet(sheet: &Sheet) -> Result<ParsedSheet> {
    check_table_name(sheet)?;
    parser_for(sheet.kind).parse(sheet)
}

fn check_table_name(sheet: &Sheet) -> Result<()> {
    if is_identifier(&sheet.name) {
        Ok(())
    } else {
        Err(CompileError::layout(format!(
            "'{}' is not a valid table name",
            sheet.name
        ))
        .in_sheet(&sheet.name))
    }
}

/// Split `*name` into (`name`, is_key).
fn split_key_marker(raw: &str) -> (&str, bool) {
    match raw.strip_prefix(KEY_MARKER) {
        Some(rest) => (rest.trim(), true),
        None => (raw, false),
    }
}

fn check_field_name(name: &str, seen: &mut HashSet<String>) -> Result<()> {
    if !is_identifier(name) {
        return Err(CompileError::layout(format!(
            "'{}' is not a valid field name",
            name
        )));
    }
    if !seen.insert(name.to_string()) {
        return Err(CompileError::layout(format!("duplicate field name '{}'", name)));
    }
    Ok(())
}

impl SheetParser for DataSheetParser {
    fn parse(&self, sheet: &Sheet) -> Result<ParsedSheet> {
        let layout = DATA_LAYOUT;
        let grid = &sheet.grid;
        let at = |row: u32, col: u32| CellLocation::cell(&sheet.name, row, col);

        let mut fields: Vec<FieldDef> = Vec::new();
        let mut marked_keys: Vec<String> = Vec::new();
        let mut seen = HashSet::new();

        for col in 0..grid.col_count() {
            let raw_name = grid.text(layout.field_row, col);
            let type_text = grid.text(layout.type_row, col);

            if raw_name.is_empty() {
                if !type_text.is_empty() {
                    return Err(CompileError::layout("type declared without a field name")
                        .at(at(layout.field_row, col)));
                }
                continue;
            }

            let (name, is_key) = split_key_marker(&raw_name);
            check_field_name(name, &mut seen).map_err(|e| e.at(at(layout.field_row, col)))?;

            let mut declared =
                DeclaredType::parse(&type_text).map_err(|e| e.at(at(layout.type_row, col)))?;

            let link_text = grid.text(layout.link_row, col);
            if !link_text.is_empty() {
                let target =
                    LinkTarget::parse(&link_text).map_err(|e| e.at(at(layout.link_row, col)))?;
                declared = declared
                    .with_link(target)
                    .map_err(|e| e.at(at(layout.type_row, col)))?;
            }

            if is_key {
                marked_keys.push(name.to_string());
            }

            fields.push(FieldDef {
                name: name.to_string(),
                declared,
                platforms: PlatformSet::parse(&grid.text(layout.platform_row, col)),
                description: grid.text(layout.desc_row, col),
                tag: fields.len() as u32 + 1,
                source: FieldSource::Column(col),
            });
        }

        if fields.is_empty() {
            return Err(CompileError::layout("sheet declares no fields")
                .at(CellLocation::row(&sheet.name, layout.field_row)));
        }

        let key = if marked_keys.is_empty() {
            vec![fields[0].name.clone()]
        } else {
            marked_keys
        };

        for name in &key {
            if let Some(field) = fields.iter().find(|f| &f.name == name) {
                if !field.declared.can_be_key() {
                    let col = match field.source {
                        FieldSource::Column(col) => col,
                        FieldSource::Row(_) => 0,
                    };
                    return Err(CompileError::type_error(format!(
                        "key field '{}' cannot have type '{}'",
                        field.name, field.declared
                    ))
                    .at(at(layout.type_row, col)));
                }
            }
        }

        Ok(ParsedSheet::Table(TableSchema {
            name: sheet.name.clone(),
            kind: SheetKind::Data,
            fields,
            key: KeySpec(key),
        }))
    }
}

impl SheetParser for KvSheetParser {
    fn parse(&self, sheet: &Sheet) -> Result<ParsedSheet> {
        let layout = KV_LAYOUT;
        let grid = &sheet.grid;
        let at = |row: u32, col: u32| CellLocation::cell(&sheet.name, row, col);

        let mut fields: Vec<FieldDef> = Vec::new();
        let mut seen = HashSet::new();

        for row in layout.first_data_row..grid.row_count() {
            if grid.is_blank_row(row) {
                continue;
            }

            let name = grid.text(row, layout.field_col);
            let type_text = grid.text(row, layout.type_col);
            if name.is_empty() {
                let message = if type_text.is_empty() {
                    "row holds data but no field name or type"
                } else {
                    "type declared without a field name"
                };
                return Err(CompileError::layout(message).at(at(row, layout.field_col)));
            }

            check_field_name(&name, &mut seen).map_err(|e| e.at(at(row, layout.field_col)))?;
            let declared =
                DeclaredType::parse(&type_text).map_err(|e| e.at(at(row, layout.type_col)))?;

            fields.push(FieldDef {
                name,
                declared,
                platforms: PlatformSet::parse(&grid.text(row, layout.platform_col)),
                description: grid.text(row, layout.desc_col),
                tag: fields.len() as u32 + 1,
                source: FieldSource::Row(row),
            });
        }

        Ok(ParsedSheet::Table(TableSchema {
            name: sheet.name.clone(),
            kind: SheetKind::Kv,
            fields,
            key: KeySpec::default(),
        }))
    }
}

impl SheetParser for EnumSheetParser {
    fn parse(&self, sheet: &Sheet) -> Result<ParsedSheet> {
        let layout = ENUM_LAYOUT;
        let grid = &sheet.grid;
        let at = |row: u32, col: u32| CellLocation::cell(&sheet.name, row, col);

        let mut entries: Vec<EnumEntry> = Vec::new();

        for row in layout.first_data_row..grid.row_count() {
            if grid.is_blank_row(row) {
                continue;
            }

            let symbol = grid.text(row, layout.field_col);
            if !is_identifier(&symbol) {
                return Err(CompileError::layout(format!(
                    "'{}' is not a valid enum symbol",
                    symbol
                ))
                .at(at(row, layout.field_col)));
            }
            if entries.iter().any(|e| e.symbol == symbol) {
                return Err(CompileError::duplicate_key(format!(
                    "enum symbol '{}' is declared twice",
                    symbol
                ))
                .at(at(row, layout.field_col)));
            }

            let value = enum_value(grid.cell(row, layout.value_col))
                .map_err(|e| e.at(at(row, layout.value_col)))?;
            // One symbol per value
            if let Some(first) = entries.iter().find(|e| e.value == value) {
                return Err(CompileError::duplicate_key(format!(
                    "enum value {} of '{}' is already used by '{}'",
                    value, symbol, first.symbol
                ))
                .at(at(row, layout.value_col)));
            }

            entries.push(EnumEntry {
                symbol,
                value,
                description: grid.text(row, layout.desc_col),
            });
        }

        if entries.is_empty() {
            return Err(CompileError::layout("enum sheet declares no symbols").in_sheet(&sheet.name));
        }

        Ok(ParsedSheet::Enum(EnumTable {
            name: sheet.name.clone(),
            entries,
        }))
    }
}

fn enum_value(cell: &CellValue) -> Result<i64> {
    match cell {
        CellValue::Number(n) if n.fract() == 0.0 => Ok(*n as i64),
        CellValue::Empty => Err(CompileError::layout("enum symbol has no value")),
        other => {
            let text = other.as_text();
            text.parse::<i64>().map_err(|_| {
                CompileError::type_error(format!("enum value '{}' is not an integer", text))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sheet::SheetGrid;

    fn data_sheet(name: &str, rows: Vec<Vec<&str>>) -> Sheet {
        Sheet::new(name, SheetKind::Data, SheetGrid::from_text_rows(rows))
    }

    fn player_rows() -> Vec<Vec<&'static str>> {
        vec![
            vec!["ID", "Name", "Type", "Secret", ""],
            vec!["id", "name", "type", "secret", ""],
            vec!["int", "string", "enum(EPlayerType)", "string", ""],
            vec!["", "", "", "server", ""],
            vec!["", "", "", "", ""],
            vec!["1001", "Hero", "Normal", "s1", ""],
        ]
    }

    fn expect_table(parsed: ParsedSheet) -> TableSchema {
        match parsed {
            ParsedSheet::Table(schema) => schema,
            ParsedSheet::Enum(_) => panic!("expected a table schema"),
        }
    }

    #[test]
    fn test_data_sheet_fields_in_column_order() {
        let schema = expect_table(parse_sheet(&data_sheet("Player", player_rows())).unwrap());

        let names: Vec<_> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "type", "secret"]);
        assert_eq!(schema.key.fields(), &["id".to_string()]);
        assert_eq!(schema.fields[2].declared, DeclaredType::EnumRef("EPlayerType".into()));
        assert!(schema.fields[3].platforms.contains("server"));
        assert!(schema.fields[0].platforms.is_all());
        assert_eq!(schema.fields[3].tag, 4);
        assert_eq!(schema.fields[0].description, "ID");
    }

    #[test]
    fn test_marked_fields_form_composite_key() {
        let sheet = data_sheet(
            "Tier",
            vec![
                vec!["", "", ""],
                vec!["*id", "*level", "cost"],
                vec!["int", "int", "float"],
            ],
        );
        let schema = expect_table(parse_sheet(&sheet).unwrap());
        assert_eq!(schema.key.fields(), &["id".to_string(), "level".to_string()]);
        assert_eq!(schema.fields[1].name, "level");
    }

    #[test]
    fn test_duplicate_field_name_is_layout_error() {
        let sheet = data_sheet(
            "Player",
            vec![vec!["", ""], vec!["id", "id"], vec!["int", "int"]],
        );
        let err = parse_sheet(&sheet).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Layout);
        assert_eq!(err.location, Some(CellLocation::cell("Player", 1, 1)));
    }

    #[test]
    fn test_unknown_type_is_type_error() {
        let sheet = data_sheet(
            "Player",
            vec![vec!["", ""], vec!["id", "hp"], vec!["int", "double"]],
        );
        let err = parse_sheet(&sheet).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
        assert_eq!(err.location, Some(CellLocation::cell("Player", 2, 1)));
    }

    #[test]
    fn test_type_without_field_name_is_layout_error() {
        let sheet = data_sheet(
            "Player",
            vec![vec!["", ""], vec!["id", ""], vec!["int", "int"]],
        );
        let err = parse_sheet(&sheet).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Layout);
    }

    #[test]
    fn test_malformed_link_is_layout_error() {
        let sheet = data_sheet(
            "Drop",
            vec![
                vec!["", ""],
                vec!["id", "item"],
                vec!["int", "int"],
                vec!["", ""],
                vec!["", "Item"],
            ],
        );
        let err = parse_sheet(&sheet).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Layout);
        assert_eq!(err.location, Some(CellLocation::cell("Drop", 4, 1)));
    }

    #[test]
    fn test_link_row_turns_field_into_link() {
        let sheet = data_sheet(
            "Drop",
            vec![
                vec!["", ""],
                vec!["id", "item"],
                vec!["int", "int"],
                vec!["", ""],
                vec!["", "Item.id"],
            ],
        );
        let schema = expect_table(parse_sheet(&sheet).unwrap());
        assert_eq!(
            schema.fields[1].link(),
            Some(&LinkTarget { table: "Item".into(), field: "id".into() })
        );
        assert_eq!(schema.link_dependencies().into_iter().collect::<Vec<_>>(), vec!["Item"]);
    }

    #[test]
    fn test_float_key_is_rejected() {
        let sheet = data_sheet("Player", vec![vec![""], vec!["id"], vec!["float"]]);
        let err = parse_sheet(&sheet).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
    }

    #[test]
    fn test_kv_sheet_is_field_per_row() {
        let sheet = Sheet::new(
            "GameConst",
            SheetKind::Kv,
            SheetGrid::from_text_rows(vec![
                vec!["field", "type", "platform", "value", "desc"],
                vec!["map_height", "float", "", "12.5", "desc"],
                vec!["", "", "", "", ""],
                vec!["difficulty", "enum(EDifficulty)", "client", "Hard", ""],
            ]),
        );
        let schema = expect_table(parse_sheet(&sheet).unwrap());
        assert_eq!(schema.kind, SheetKind::Kv);
        assert!(schema.key.is_empty());
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.fields[0].source, FieldSource::Row(1));
        assert_eq!(schema.fields[1].source, FieldSource::Row(3));
        assert_eq!(schema.fields[1].tag, 2);
        assert_eq!(schema.fields[0].description, "desc");
    }

    #[test]
    fn test_enum_sheet_entries() {
        let sheet = Sheet::new(
            "EPlayerType",
            SheetKind::Enum,
            SheetGrid::from_text_rows(vec![
                vec!["field", "value", "desc"],
                vec!["None", "0", ""],
                vec!["Normal", "1", "regular"],
                vec!["Special", "2", ""],
            ]),
        );
        match parse_sheet(&sheet).unwrap() {
            ParsedSheet::Enum(table) => {
                assert_eq!(table.name, "EPlayerType");
                assert_eq!(table.entries.len(), 3);
                assert_eq!(table.entries[1].value, 1);
                assert_eq!(table.entries[1].description, "regular");
            }
            ParsedSheet::Table(_) => panic!("expected an enum table"),
        }
    }

    #[test]
    fn test_enum_duplicate_symbol_reports_second_row() {
        let sheet = Sheet::new(
            "EKind",
            SheetKind::Enum,
            SheetGrid::from_text_rows(vec![
                vec!["field", "value", "desc"],
                vec!["A", "0", ""],
                vec!["A", "1", ""],
            ]),
        );
        let err = parse_sheet(&sheet).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateKey);
        assert_eq!(err.location, Some(CellLocation::cell("EKind", 2, 0)));
    }

    #[test]
    fn test_enum_duplicate_value_reports_second_row() {
        let sheet = Sheet::new(
            "EKind",
            SheetKind::Enum,
            SheetGrid::from_text_rows(vec![
                vec!["field", "value", "desc"],
                vec!["A", "1", ""],
                vec!["B", "2", ""],
                vec!["C", "1", ""],
            ]),
        );
        let err = parse_sheet(&sheet).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateKey);
        assert_eq!(err.location, Some(CellLocation::cell("EKind", 3, 1)));
        assert!(err.message.contains("already used by 'A'"));
    }

    #[test]
    fn test_kv_row_without_name_or_type_is_layout_error() {
        let sheet = Sheet::new(
            "GameConst",
            SheetKind::Kv,
            SheetGrid::from_text_rows(vec![
                vec!["field", "type", "platform", "value", "desc"],
                vec!["map_height", "float", "", "12.5", ""],
                vec!["", "", "", "40", "orphan value"],
            ]),
        );
        let err = parse_sheet(&sheet).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Layout);
        assert_eq!(err.location, Some(CellLocation::cell("GameConst", 2, 0)));
    }

    #[test]
    fn test_invalid_table_name() {
        let err = parse_sheet(&data_sheet("Player Data", player_rows())).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Layout);
    }
}
