use serde::{Deserialize, Serialize};

/// Represents a raw cell value as produced by the spreadsheet reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    Empty,
    String(String),
    Number(f64),
    Boolean(bool),
    DateTime(String), // ISO 8601 format
    Error(String),
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl CellValue {
    /// Empty cells and whitespace-only strings both count as blank.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text form used for header cells and text-based coercion.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::String(s) => s.trim().to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Boolean(b) => b.to_string(),
            CellValue::DateTime(s) => s.clone(),
            CellValue::Error(e) => format!("#{}", e),
        }
    }
}

/// Whole numbers print without a fractional part so that `1001.0` reads as `1001`.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Kind of a sheet, decided by where its file lives in the workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetKind {
    Data,
    Kv,
    Enum,
}

impl SheetKind {
    pub fn layout(self) -> RowLayout {
        match self {
            SheetKind::Data => RowLayout::Data(DATA_LAYOUT),
            SheetKind::Kv => RowLayout::Kv(KV_LAYOUT),
            SheetKind::Enum => RowLayout::Enum(ENUM_LAYOUT),
        }
    }

    /// KV and ENUM tables must be compiled before DATA tables.
    pub fn is_auxiliary(self) -> bool {
        !matches!(self, SheetKind::Data)
    }
}

impl std::fmt::Display for SheetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SheetKind::Data => "DATA",
            SheetKind::Kv => "KV",
            SheetKind::Enum => "ENUM",
        };
        f.write_str(name)
    }
}

/// Row offsets of a DATA sheet: one field per column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataLayout {
    pub desc_row: u32,
    pub field_row: u32,
    pub type_row: u32,
    pub platform_row: u32,
    pub link_row: u32,
    pub first_data_row: u32,
}

/// Column offsets of a KV sheet: one field per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KvLayout {
    pub field_col: u32,
    pub type_col: u32,
    pub platform_col: u32,
    pub value_col: u32,
    pub desc_col: u32,
    pub first_data_row: u32,
}

/// Column offsets of an ENUM sheet: one symbol per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumLayout {
    pub field_col: u32,
    pub value_col: u32,
    pub desc_col: u32,
    pub first_data_row: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLayout {
    Data(DataLayout),
    Kv(KvLayout),
    Enum(EnumLayout),
}

impl RowLayout {
    pub fn first_data_row(&self) -> u32 {
        match self {
            RowLayout::Data(l) => l.first_data_row,
            RowLayout::Kv(l) => l.first_data_row,
            RowLayout::Enum(l) => l.first_data_row,
        }
    }
}

pub const DATA_LAYOUT: DataLayout = DataLayout {
    desc_row: 0,
    field_row: 1,
    type_row: 2,
    platform_row: 3,
    link_row: 4,
    first_data_row: 5,
};

pub const KV_LAYOUT: KvLayout = KvLayout {
    field_col: 0,
    type_col: 1,
    platform_col: 2,
    value_col: 3,
    desc_col: 4,
    first_data_row: 1,
};

pub const ENUM_LAYOUT: EnumLayout = EnumLayout {
    field_col: 0,
    value_col: 1,
    desc_col: 2,
    first_data_row: 1,
};

/// Raw cells of one sheet, rows × columns. Rows may be ragged; missing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetGrid {
    pub rows: Vec<Vec<CellValue>>,
}

static EMPTY_CELL: CellValue = CellValue::Empty;

impl SheetGrid {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        SheetGrid { rows }
    }

    /// Build a grid from text cells; empty strings become `CellValue::Empty`.
    pub fn from_text_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| {
                        let text = cell.as_ref();
                        if text.is_empty() {
                            CellValue::Empty
                        } else {
                            CellValue::String(text.to_string())
                        }
                    })
                    .collect()
            })
            .collect();
        SheetGrid { rows }
    }

    pub fn row_count(&self) -> u32 {
        self.rows.len() as u32
    }

    pub fn col_count(&self) -> u32 {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0) as u32
    }

    pub fn cell(&self, row: u32, col: u32) -> &CellValue {
        self.rows
            .get(row as usize)
            .and_then(|r| r.get(col as usize))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn text(&self, row: u32, col: u32) -> String {
        self.cell(row, col).as_text()
    }

    pub fn is_blank_row(&self, row: u32) -> bool {
        self.rows
            .get(row as usize)
            .map(|r| r.iter().all(CellValue::is_blank))
            .unwrap_or(true)
    }
}

/// One logical sheet handed to the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    /// Table name derived from the sheet (worksheet name or file stem)
    pub name: String,
    pub kind: SheetKind,
    pub grid: SheetGrid,
}

impl Sheet {
    pub fn new(name: impl Into<String>, kind: SheetKind, grid: SheetGrid) -> Self {
        Sheet {
            name: name.into(),
            kind,
            grid,
        }
    }
}

/// A sheet located on disk but not read yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSource {
    pub path: std::path::PathBuf,
    pub kind: SheetKind,
    /// Worksheet to read; `None` reads every worksheet of the workbook
    pub anchor: Option<String>,
}
