use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Position of a cell inside a named sheet. Rows and columns are 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellLocation {
    pub sheet: String,
    pub row: Option<u32>,
    pub column: Option<u32>,
}

impl CellLocation {
    pub fn sheet(sheet: impl Into<String>) -> Self {
        CellLocation {
            sheet: sheet.into(),
            row: None,
            column: None,
        }
    }

    pub fn cell(sheet: impl Into<String>, row: u32, column: u32) -> Self {
        CellLocation {
            sheet: sheet.into(),
            row: Some(row),
            column: Some(column),
        }
    }

    pub fn row(sheet: impl Into<String>, row: u32) -> Self {
        CellLocation {
            sheet: sheet.into(),
            row: Some(row),
            column: None,
        }
    }
}

impl std::fmt::Display for CellLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.row, self.column) {
            (Some(row), Some(col)) => write!(
                f,
                "{}!{}{}",
                self.sheet,
                column_index_to_letter(col),
                row + 1
            ),
            (Some(row), None) => write!(f, "{} row {}", self.sheet, row + 1),
            (None, Some(col)) => write!(f, "{} column {}", self.sheet, column_index_to_letter(col)),
            (None, None) => write!(f, "{}", self.sheet),
        }
    }
}

/// Failure categories reported by the compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Row/column missing or malformed
    Layout,
    /// Unrecognized declared type or a cell that does not coerce
    Type,
    DuplicateKey,
    /// Enum symbol, link key or referenced table that cannot be found
    UnresolvedReference,
    /// Unknown language tag, unsupported output format
    TargetConfig,
    /// The spreadsheet reader could not produce a grid
    Read,
    /// Writing an artifact failed
    Io,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Layout => "layout error",
            ErrorKind::Type => "type error",
            ErrorKind::DuplicateKey => "duplicate key",
            ErrorKind::UnresolvedReference => "unresolved reference",
            ErrorKind::TargetConfig => "target config error",
            ErrorKind::Read => "read error",
            ErrorKind::Io => "io error",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Compiler error with an optional cell position.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}{}: {message}", location_suffix(.location))]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<CellLocation>,
}

pub type Result<T> = std::result::Result<T, CompileError>;

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        CompileError {
            kind,
            message: message.into(),
            location: None,
        }
    }

    pub fn layout(message: impl Into<String>) -> Self {
        CompileError::new(ErrorKind::Layout, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        CompileError::new(ErrorKind::Type, message)
    }

    pub fn duplicate_key(message: impl Into<String>) -> Self {
        CompileError::new(ErrorKind::DuplicateKey, message)
    }

    pub fn unresolved(message: impl Into<String>) -> Self {
        CompileError::new(ErrorKind::UnresolvedReference, message)
    }

    pub fn target_config(message: impl Into<String>) -> Self {
        CompileError::new(ErrorKind::TargetConfig, message)
    }

    pub fn read_error(message: impl Into<String>) -> Self {
        CompileError::new(ErrorKind::Read, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        CompileError::new(ErrorKind::Io, message)
    }

    pub fn cancelled() -> Self {
        CompileError::new(ErrorKind::Cancelled, "compile run was cancelled")
    }

    /// Attach a location, keeping an existing one.
    pub fn at(mut self, location: CellLocation) -> Self {
        if self.location.is_none() {
            self.location = Some(location);
        }
        self
    }

    pub fn at_cell(self, sheet: &str, row: u32, column: u32) -> Self {
        self.at(CellLocation::cell(sheet, row, column))
    }

    pub fn in_sheet(self, sheet: &str) -> Self {
        self.at(CellLocation::sheet(sheet))
    }
}

fn location_suffix(location: &Option<CellLocation>) -> String {
    match location {
        Some(location) => format!(" at {}", location),
        None => String::new(),
    }
}

/// Convert column index (0-based) to spreadsheet column letter (A, B, ..., Z, AA, AB, ...)
pub fn column_index_to_letter(index: u32) -> String {
    let mut result = String::new();
    let mut n = index + 1;

    while n > 0 {
        n -= 1;
        let c = (b'A' + (n % 26) as u8) as char;
        result.insert(0, c);
        n /= 26;
    }

    result
}
