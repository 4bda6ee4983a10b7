use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use super::types::{TableRegistry, Value};
use crate::error::{CompileError, Result};
use crate::schema::{DeclaredType, ElementType, Primitive};
use crate::sheet::{format_number, CellValue};

/// Separator between scalar list elements
pub const LIST_SEPARATOR: char = ',';
/// Separator between vector list elements
pub const VECTOR_LIST_SEPARATOR: char = ';';
/// Separator between vector components
pub const VECTOR_SEPARATOR: char = ',';

const SECONDS_PER_DAY: f64 = 86400.0;
/// Spreadsheet serial of 1970-01-01
const UNIX_EPOCH_SERIAL: f64 = 25569.0;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Converts raw cells into typed values. Enum references are resolved against the
/// registry; link targets are checked by the record builder.
pub struct TypeCoercer<'a> {
    registry: &'a TableRegistry,
}

impl<'a> TypeCoercer<'a> {
    pub fn new(registry: &'a TableRegistry) -> Self {
        TypeCoercer { registry }
    }

    pub fn coerce(&self, cell: &CellValue, declared: &DeclaredType) -> Result<Value> {
        if cell.is_blank() {
            return self.default_value(declared);
        }
        if let CellValue::Error(e) = cell {
            return Err(CompileError::type_error(format!("cell holds an error value #{}", e)));
        }

        match declared {
            DeclaredType::Primitive(p) => coerce_primitive(cell, *p),
            DeclaredType::Vector(n) => coerce_vector(&cell.as_text(), *n),
            DeclaredType::List(element) => coerce_list(&cell.as_text(), *element),
            DeclaredType::EnumRef(name) => self.coerce_enum(cell, name),
            DeclaredType::LinkRef { key, .. } => coerce_primitive(cell, *key),
        }
    }

    /// Value of an empty cell
    pub fn default_value(&self, declared: &DeclaredType) -> Result<Value> {
        match declared {
            DeclaredType::Primitive(p) => Ok(primitive_default(*p)),
            DeclaredType::Vector(n) => Ok(Value::Vector(vec![0.0; *n as usize])),
            DeclaredType::List(_) => Ok(Value::List(Vec::new())),
            DeclaredType::EnumRef(name) => {
                let table = self.registry.enum_table(name).ok_or_else(|| missing_enum(name))?;
                table
                    .first()
                    .map(|e| Value::Enum {
                        symbol: e.symbol.clone(),
                        value: e.value,
                    })
                    .ok_or_else(|| {
                        CompileError::unresolved(format!("enum '{}' has no symbols", name))
                    })
            }
            DeclaredType::LinkRef { .. } => Ok(Value::Null),
        }
    }

    fn coerce_enum(&self, cell: &CellValue, name: &str) -> Result<Value> {
        let table = self.registry.enum_table(name).ok_or_else(|| missing_enum(name))?;
        let raw = cell.as_text();
        table
            .resolve(&raw)
            .map(|e| Value::Enum {
                symbol: e.symbol.clone(),
                value: e.value,
            })
            .ok_or_else(|| {
                CompileError::unresolved(format!("'{}' is not a symbol of enum '{}'", raw, name))
            })
    }
}

fn missing_enum(name: &str) -> CompileError {
    CompileError::unresolved(format!("enum table '{}' does not exist", name))
}

pub fn primitive_default(p: Primitive) -> Value {
    match p {
        Primitive::Int | Primitive::Long | Primitive::Time | Primitive::Date => Value::Int(0),
        Primitive::Float | Primitive::Percent | Primitive::Permille | Primitive::Permyriad => {
            Value::Float(0.0)
        }
        Primitive::Bool => Value::Bool(false),
        Primitive::String => Value::Str(String::new()),
    }
}

fn mismatch(raw: &str, p: Primitive) -> CompileError {
    CompileError::type_error(format!("'{}' is not a {}", raw, p.keyword()))
}

pub fn coerce_primitive(cell: &CellValue, p: Primitive) -> Result<Value> {
    match p {
        Primitive::Int => {
            let v = parse_integer(cell, p)?;
            if v < i32::MIN as i64 || v > i32::MAX as i64 {
                return Err(CompileError::type_error(format!(
                    "{} is out of range for int",
                    v
                )));
            }
            Ok(Value::Int(v))
        }
        Primitive::Long => parse_integer(cell, p).map(Value::Int),
        Primitive::Float => parse_float(cell, p).map(Value::Float),
        Primitive::Percent | Primitive::Permille | Primitive::Permyriad => {
            parse_scaled(cell, p).map(Value::Float)
        }
        Primitive::Bool => parse_bool(cell).map(Value::Bool),
        Primitive::String => Ok(Value::Str(match cell {
            CellValue::String(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            other => other.as_text(),
        })),
        Primitive::Time => parse_time(cell).map(Value::Int),
        Primitive::Date => parse_date(cell).map(Value::Int),
    }
}

fn parse_integer(cell: &CellValue, p: Primitive) -> Result<i64> {
    match cell {
        CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.2e18 => {
            Ok(*n as i64)
        }
        CellValue::String(s) => s.trim().parse::<i64>().map_err(|_| mismatch(s.trim(), p)),
        other => Err(mismatch(&other.as_text(), p)),
    }
}

fn parse_float(cell: &CellValue, p: Primitive) -> Result<f64> {
    match cell {
        CellValue::Number(n) if n.is_finite() => Ok(*n),
        CellValue::String(s) => parse_finite(s.trim()).ok_or_else(|| mismatch(s.trim(), p)),
        other => Err(mismatch(&other.as_text(), p)),
    }
}

fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// `%` cells hold fractions unless written with the symbol; `‰` and `‱` cells hold
/// whole numbers of the unit.
fn parse_scaled(cell: &CellValue, p: Primitive) -> Result<f64> {
    let text = cell.as_text();
    if let Some(stripped) = text.strip_suffix(p.keyword()) {
        return parse_finite(stripped.trim())
            .map(|v| v / p.scale())
            .ok_or_else(|| mismatch(&text, p));
    }
    let value = parse_float(cell, p)?;
    match p {
        Primitive::Percent => Ok(value),
        _ => Ok(value / p.scale()),
    }
}

fn parse_bool(cell: &CellValue) -> Result<bool> {
    match cell {
        CellValue::Boolean(b) => Ok(*b),
        CellValue::Number(n) if *n == 1.0 => Ok(true),
        CellValue::Number(n) if *n == 0.0 => Ok(false),
        other => {
            let text = other.as_text();
            match text.to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(mismatch(&text, Primitive::Bool)),
            }
        }
    }
}

/// Seconds since midnight
fn parse_time(cell: &CellValue) -> Result<i64> {
    let p = Primitive::Time;
    match cell {
        CellValue::Number(n) if (0.0..1.0).contains(n) => Ok((n * SECONDS_PER_DAY).round() as i64),
        CellValue::Number(n) if n.fract() == 0.0 && *n >= 0.0 && *n < SECONDS_PER_DAY => {
            Ok(*n as i64)
        }
        CellValue::DateTime(iso) => NaiveDateTime::parse_from_str(iso, "%Y-%m-%dT%H:%M:%S")
            .map(|dt| dt.time().num_seconds_from_midnight() as i64)
            .map_err(|_| mismatch(iso, p)),
        CellValue::String(s) => {
            let text = s.trim();
            if let Ok(seconds) = text.parse::<i64>() {
                if (0..SECONDS_PER_DAY as i64).contains(&seconds) {
                    return Ok(seconds);
                }
                return Err(mismatch(text, p));
            }
            ["%H:%M:%S", "%H:%M"]
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
                .map(|t| t.num_seconds_from_midnight() as i64)
                .ok_or_else(|| mismatch(text, p))
        }
        other => Err(mismatch(&other.as_text(), p)),
    }
}

/// Unix seconds (UTC). Numeric cells are spreadsheet serials; integer text is taken
/// as unix seconds already.
fn parse_date(cell: &CellValue) -> Result<i64> {
    let p = Primitive::Date;
    match cell {
        CellValue::Number(n) if n.is_finite() => {
            Ok(((n - UNIX_EPOCH_SERIAL) * SECONDS_PER_DAY).round() as i64)
        }
        CellValue::DateTime(text) | CellValue::String(text) => {
            let text = text.trim();
            if let Ok(seconds) = text.parse::<i64>() {
                return Ok(seconds);
            }
            parse_datetime_text(text)
                .map(|dt| dt.and_utc().timestamp())
                .ok_or_else(|| mismatch(text, p))
        }
        other => Err(mismatch(&other.as_text(), p)),
    }
}

fn parse_datetime_text(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn coerce_vector(text: &str, arity: u8) -> Result<Value> {
    let inner = text
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')');
    let parts: Vec<&str> = inner.split(VECTOR_SEPARATOR).map(str::trim).collect();
    if parts.len() != arity as usize {
        return Err(CompileError::type_error(format!(
            "'{}' does not have {} components",
            text, arity
        )));
    }
    parts
        .iter()
        .map(|part| {
            parse_finite(part).ok_or_else(|| {
                CompileError::type_error(format!("'{}' is not a vector{}", text, arity))
            })
        })
        .collect::<Result<Vec<f64>>>()
        .map(Value::Vector)
}

pub fn coerce_list(text: &str, element: ElementType) -> Result<Value> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Value::List(Vec::new()));
    }
    let separator = match element {
        ElementType::Primitive(_) => LIST_SEPARATOR,
        ElementType::Vector(_) => VECTOR_LIST_SEPARATOR,
    };

    text.split(separator)
        .enumerate()
        .map(|(i, part)| {
            let part = part.trim();
            if part.is_empty() {
                return Err(CompileError::type_error(format!(
                    "list element {} of '{}' is empty",
                    i + 1,
                    text
                )));
            }
            match element {
                ElementType::Primitive(p) => {
                    coerce_primitive(&CellValue::String(part.to_string()), p)
                }
                ElementType::Vector(n) => coerce_vector(part, n),
            }
        })
        .collect::<Result<Vec<Value>>>()
        .map(Value::List)
}
