//! In-memory tabular dataset shared by every stage.
//!
//! A dataset is a header plus row-major records, with one inferred
//! [`ColumnKind`] per column. Values are typed according to their column's
//! kind: integer columns hold `Int`, float columns hold `Float`, text columns
//! hold `Text` (numbers found in a text column stay strings).

pub mod csv_io;

use std::fmt;

/// Tokens read as a missing value.
pub const NA_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "NULL", "null", "None", "<NA>", "#N/A",
];

pub fn is_na(raw: &str) -> bool {
    NA_TOKENS.contains(&raw.trim())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Text written to a CSV cell. Null becomes the empty field.
    pub fn to_field(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            other => f.write_str(&other.to_field()),
        }
    }
}

/// Whole floats keep a trailing `.0` so the column reads back as float.
fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }

    /// Storage type of a column given its raw cells. A column with no
    /// non-null cells is `Float`, the same as an all-NaN column.
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a str>) -> ColumnKind {
        let mut kind = None;
        for raw in cells.into_iter().filter(|c| !is_na(c)) {
            let raw = raw.trim();
            if kind != Some(ColumnKind::Float) && raw.parse::<i64>().is_ok() {
                kind = Some(ColumnKind::Integer);
            } else if raw.parse::<f64>().is_ok() {
                kind = Some(ColumnKind::Float);
            } else {
                return ColumnKind::Text;
            }
        }
        kind.unwrap_or(ColumnKind::Float)
    }

    /// Parse one raw cell into this kind's value.
    pub fn parse(self, raw: &str) -> Value {
        if is_na(raw) {
            return Value::Null;
        }
        let trimmed = raw.trim();
        match self {
            ColumnKind::Integer => trimmed
                .parse::<i64>()
                .map(Value::Int)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
            ColumnKind::Float => trimmed
                .parse::<f64>()
                .map(Value::Float)
                .unwrap_or_else(|_| Value::Text(raw.to_string())),
            ColumnKind::Text => Value::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Text => "text",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub kinds: Vec<ColumnKind>,
    pub rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Build from string cells, inferring each column's kind.
    pub fn from_raw(columns: Vec<String>, raw_rows: Vec<Vec<String>>) -> Dataset {
        let kinds: Vec<ColumnKind> = (0..columns.len())
            .map(|i| ColumnKind::infer(raw_rows.iter().map(|r| r[i].as_str())))
            .collect();
        let rows = raw_rows
            .iter()
            .map(|r| {
                r.iter()
                    .zip(&kinds)
                    .map(|(cell, kind)| kind.parse(cell))
                    .collect()
            })
            .collect();
        Dataset {
            columns,
            kinds,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |r| &r[idx])
    }

    pub fn null_count(&self, idx: usize) -> usize {
        self.column_values(idx).filter(|v| v.is_null()).count()
    }

    /// `(column, value)` pairs of one record, in column order.
    pub fn record(&self, row: usize) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.rows[row].iter())
    }
}
