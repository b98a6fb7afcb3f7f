//! Post-load dtype normalization.
//!
//! Part files store every column as text. Once a table is materialized the
//! columns are cleaned (NULs stripped, blank cells emptied) and promoted to
//! dates or integers where every value allows it. A column that cannot be
//! promoted stays text; normalization never fails on data.

use crate::errors::DatasusResult;
use crate::models::dbase_utils::{DBASE_TYPE_KEY, DbfFieldKind};
use arrow::array::{
    Array, ArrayRef, AsArray, Date32Array, Float64Array, Int64Array, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::sync::Arc;

/// Columns holding integer codes stored as text
pub const INTEGER_CODED_COLUMNS: &[&str] = &[
    "CODMUNRES",
    "CODMUNOCOR",
    "CODMUNNATU",
    "CODMUNNASC",
    "CODMUNCART",
    "CODMUNRESD",
    "SEXO",
    "RACACOR",
    "ESTCIV",
    "ESC",
    "LOCNASC",
    "LOCOCOR",
    "TPOBITO",
];

const DATE_FORMATS: &[&str] = &["%Y%m%d", "%d%m%Y"];

/// Target type of a schema-tagged column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Varchar,
    Numeric,
    Integer,
    Date,
    /// `YYYYWW` epidemiological week reduced to the week number
    EpiWeek,
}

/// Per-database mapping from column names to target types.
///
/// A pattern ending in `*` matches by prefix. Exact names win over
/// prefixes; among prefixes the first registered wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeTable {
    rules: Vec<(String, ColumnType)>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, pattern: &str, column_type: ColumnType) -> Self {
        self.rules.push((pattern.to_uppercase(), column_type));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn lookup(&self, column: &str) -> Option<ColumnType> {
        let column = column.to_uppercase();
        self.rules
            .iter()
            .find(|(pattern, _)| *pattern == column)
            .or_else(|| {
                self.rules.iter().find(|(pattern, _)| {
                    pattern
                        .strip_suffix('*')
                        .is_some_and(|prefix| column.starts_with(prefix))
                })
            })
            .map(|(_, column_type)| *column_type)
    }

    /// Types declared by the DBF header, read back from field metadata
    pub fn from_schema(schema: &Schema) -> Self {
        let mut table = Self::new();
        for field in schema.fields() {
            let Some(code) = field
                .metadata()
                .get(DBASE_TYPE_KEY)
                .and_then(|value| value.chars().next())
            else {
                continue;
            };
            let column_type = match DbfFieldKind::from_code(code) {
                DbfFieldKind::Integer => ColumnType::Integer,
                kind if kind.is_numeric() => ColumnType::Numeric,
                DbfFieldKind::Date => ColumnType::Date,
                _ => continue,
            };
            table = table.with(field.name(), column_type);
        }
        table
    }
}

/// Normalizes every column of `batch`; `types` adds explicit casts
pub fn normalize_batch(batch: &RecordBatch, types: Option<&TypeTable>) -> DatasusResult<RecordBatch> {
    let schema = batch.schema();
    let columns: Vec<(Field, ArrayRef)> = (0..batch.num_columns())
        .into_par_iter()
        .map(|i| normalize_column(schema.field(i), batch.column(i), types))
        .collect();

    let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = columns.into_iter().unzip();
    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    Ok(RecordBatch::try_new(Arc::new(schema), arrays)?)
}

fn normalize_column(
    field: &Field,
    array: &ArrayRef,
    types: Option<&TypeTable>,
) -> (Field, ArrayRef) {
    if array.data_type() != &DataType::Utf8 {
        return (field.clone(), array.clone());
    }
    let cleaned = clean_strings(array.as_string::<i32>());
    let name = field.name().to_uppercase();

    let target = types.and_then(|t| t.lookup(&name)).or_else(|| {
        if name.starts_with("DT_") {
            Some(ColumnType::Date)
        } else if INTEGER_CODED_COLUMNS.contains(&name.as_str()) {
            Some(ColumnType::Integer)
        } else {
            None
        }
    });

    let converted = match target {
        Some(column_type) => cast_strings(&cleaned, column_type),
        None => None,
    };
    match converted {
        Some(array) => {
            let field = Field::new(field.name(), array.data_type().clone(), true)
                .with_metadata(field.metadata().clone());
            (field, array)
        }
        None => {
            if target.is_some_and(|t| t != ColumnType::Varchar) {
                log::debug!("column {} kept as text: not every value converts", field.name());
            }
            (field.clone(), Arc::new(cleaned) as ArrayRef)
        }
    }
}

/// Strips NULs and turns whitespace-only cells into empty strings
pub fn clean_strings(array: &StringArray) -> StringArray {
    array
        .iter()
        .map(|value| {
            value.map(|v| {
                let v = v.replace('\0', "");
                if v.trim().is_empty() { String::new() } else { v }
            })
        })
        .collect()
}

/// Casts a text column, or returns `None` when some value does not convert.
/// Empty cells become NULL.
pub fn cast_strings(array: &StringArray, column_type: ColumnType) -> Option<ArrayRef> {
    let present = || array.iter().map(|v| v.filter(|s| !s.trim().is_empty()));
    match column_type {
        ColumnType::Varchar => Some(Arc::new(array.clone())),
        ColumnType::Integer => {
            let values: Option<Vec<Option<i64>>> =
                present().map(|v| convert(v, parse_digits)).collect();
            Some(Arc::new(Int64Array::from(values?)))
        }
        ColumnType::EpiWeek => {
            let values: Option<Vec<Option<i64>>> = present()
                .map(|v| convert(v, |s| parse_digits(s).map(|n| n % 100)))
                .collect();
            Some(Arc::new(Int64Array::from(values?)))
        }
        ColumnType::Numeric => {
            let values: Option<Vec<Option<f64>>> = present()
                .map(|v| convert(v, |s| s.trim().replace(',', ".").parse::<f64>().ok()))
                .collect();
            Some(Arc::new(Float64Array::from(values?)))
        }
        ColumnType::Date => DATE_FORMATS.iter().find_map(|format| {
            let values: Option<Vec<Option<i32>>> = present()
                .map(|v| convert(v, |s| parse_date(s, format)))
                .collect();
            values.map(|v| Arc::new(Date32Array::from(v)) as ArrayRef)
        }),
    }
}

/// NULL stays NULL; `None` when a present value fails to parse
fn convert<T>(value: Option<&str>, parse: impl Fn(&str) -> Option<T>) -> Option<Option<T>> {
    match value {
        None => Some(None),
        Some(s) => parse(s).map(Some),
    }
}

/// Digit strings only, internal whitespace ignored
fn parse_digits(value: &str) -> Option<i64> {
    let digits: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_date(value: &str, format: &str) -> Option<i32> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    let date = NaiveDate::parse_from_str(value.trim(), format).ok()?;
    i32::try_from((date - epoch).num_days()).ok()
}
