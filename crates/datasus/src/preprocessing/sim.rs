//! Counting and pro rata redistribution of SIM records.
//!
//! Count frames hold one text column per grouping variable plus a `Float64`
//! [`COUNT_COLUMN`]. Redistribution moves the mass of rows with unknown
//! coordinates onto the fully known rows that agree with them, so the total
//! is preserved.

use super::decoders::ILL_DEFINED_CHAPTER;
use super::{NAN_STRING, required_column, text_column};
use crate::errors::{DatasusError, DatasusResult};
use arrow::array::{Array, ArrayRef, AsArray, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use arrow::record_batch::RecordBatch;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const COUNT_COLUMN: &str = "COUNTS";

/// Counts the rows of `frame` per distinct combination of `columns`.
///
/// Keys are compared as text; a null key counts as [`NAN_STRING`]. The result
/// is sorted by key.
pub fn group_and_count(frame: &RecordBatch, columns: &[&str]) -> DatasusResult<RecordBatch> {
    let keys: Vec<StringArray> = columns
        .iter()
        .map(|name| text_column(required_column(frame, name)?))
        .collect::<DatasusResult<_>>()?;

    let mut counts: BTreeMap<Vec<String>, f64> = BTreeMap::new();
    for row in 0..frame.num_rows() {
        let key = keys
            .iter()
            .map(|column| {
                if column.is_null(row) {
                    NAN_STRING.to_string()
                } else {
                    column.value(row).to_string()
                }
            })
            .collect();
        *counts.entry(key).or_insert(0.0) += 1.0;
    }

    let table = CountTable {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        keys: counts.keys().cloned().collect(),
        counts: counts.into_values().collect(),
    };
    table.into_batch()
}

/// [`redistribute_missing_with`] using [`NAN_STRING`]
pub fn redistribute_missing(counts: &RecordBatch, columns: &[&str]) -> DatasusResult<RecordBatch> {
    redistribute_missing_with(counts, columns, NAN_STRING)
}

/// Spreads the counts of rows with unknown (`nan`) coordinates in `columns`
/// over the fully known rows.
///
/// Rows are handled by stratum of missingness. A row is matched against
/// the known rows that agree on its known coordinates; when those sum to
/// zero the last known coordinate is dropped and the match retried. Only
/// fully known rows are returned. Fails when some mass has nowhere to go.
pub fn redistribute_missing_with(
    counts: &RecordBatch,
    columns: &[&str],
    nan: &str,
) -> DatasusResult<RecordBatch> {
    let table = CountTable::from_batch(counts)?;
    let filter = table.positions(columns)?;
    let width = filter.len();
    if width == 0 {
        return table.into_batch();
    }
    // mask bit i set when columns[i] is missing
    let missing_mask = |key: &[String]| -> usize {
        filter
            .iter()
            .enumerate()
            .filter(|(_, column)| key[**column] == nan)
            .fold(0, |mask, (i, _)| mask | (1 << i))
    };

    let mut complete = CountTable::empty(table.columns.clone());
    let mut strata: HashMap<usize, Vec<(Vec<String>, f64)>> = HashMap::new();
    for (key, count) in table.keys.into_iter().zip(table.counts) {
        match missing_mask(&key) {
            0 => complete.push(key, count),
            _ if count == 0.0 => {}
            mask => strata.entry(mask).or_default().push((key, count)),
        }
    }

    let full = (1usize << width) - 1;
    let mut receivers = Receivers::new(complete, filter);
    // first column most significant, known before missing
    for step in 1..=full {
        let missing = (0..width)
            .filter(|i| step & (1 << (width - 1 - *i)) != 0)
            .fold(0, |mask, i| mask | (1 << i));
        for (key, count) in strata.remove(&missing).unwrap_or_default() {
            receivers.spread(&key, full & !missing, count)?;
        }
    }
    receivers.table.into_batch()
}

/// Spreads the counts of rows whose `column` equals `sentinel` over the
/// other rows that agree on `columns`, relaxing the match like
/// [`redistribute_missing`]. Rows holding the sentinel are dropped.
pub fn redistribute_sentinel(
    counts: &RecordBatch,
    column: &str,
    sentinel: &str,
    columns: &[&str],
) -> DatasusResult<RecordBatch> {
    let table = CountTable::from_batch(counts)?;
    let target = table.positions(&[column])?[0];
    let filter = table.positions(columns)?;

    let mut others = CountTable::empty(table.columns.clone());
    let mut flagged = Vec::new();
    for (key, count) in table.keys.into_iter().zip(table.counts) {
        if key[target] != sentinel {
            others.push(key, count);
        } else if count > 0.0 {
            flagged.push((key, count));
        }
    }

    let full = (1usize << filter.len()) - 1;
    let mut receivers = Receivers::new(others, filter);
    for (key, count) in flagged {
        receivers.spread(&key, full, count)?;
    }
    receivers.table.into_batch()
}

/// Redistributes the ill-defined causes chapter of `CID10_CHAPTER`
pub fn redistribute_cid_chapter(counts: &RecordBatch, columns: &[&str]) -> DatasusResult<RecordBatch> {
    redistribute_sentinel(
        counts,
        "CID10_CHAPTER",
        &ILL_DEFINED_CHAPTER.to_string(),
        columns,
    )
}

/// Row-major view of a count frame
#[derive(Debug, Clone, Default)]
struct CountTable {
    columns: Vec<String>,
    keys: Vec<Vec<String>>,
    counts: Vec<f64>,
}

impl CountTable {
    fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    fn from_batch(batch: &RecordBatch) -> DatasusResult<Self> {
        let counts = cast(required_column(batch, COUNT_COLUMN)?, &DataType::Float64)?;
        let counts: Vec<f64> = counts
            .as_primitive::<Float64Type>()
            .iter()
            .map(|c| c.unwrap_or(0.0))
            .collect();

        let schema = batch.schema();
        let mut columns = Vec::new();
        let mut texts = Vec::new();
        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            if field.name() != COUNT_COLUMN {
                columns.push(field.name().clone());
                texts.push(text_column(column)?);
            }
        }
        let keys = (0..batch.num_rows())
            .map(|row| {
                texts
                    .iter()
                    .map(|column| {
                        if column.is_null(row) {
                            NAN_STRING.to_string()
                        } else {
                            column.value(row).to_string()
                        }
                    })
                    .collect()
            })
            .collect();
        Ok(Self {
            columns,
            keys,
            counts,
        })
    }

    fn positions(&self, names: &[&str]) -> DatasusResult<Vec<usize>> {
        let missing: Vec<&str> = names
            .iter()
            .filter(|name| !self.columns.iter().any(|c| c == *name))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(DatasusError::validation("column", missing));
        }
        Ok(names
            .iter()
            .filter_map(|name| self.columns.iter().position(|c| c == name))
            .collect())
    }

    fn push(&mut self, key: Vec<String>, count: f64) {
        self.keys.push(key);
        self.counts.push(count);
    }

    fn into_batch(self) -> DatasusResult<RecordBatch> {
        let mut fields: Vec<Field> = self
            .columns
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, false))
            .collect();
        fields.push(Field::new(COUNT_COLUMN, DataType::Float64, false));

        let mut arrays: Vec<ArrayRef> = (0..self.columns.len())
            .map(|i| {
                let values: StringArray =
                    self.keys.iter().map(|key| Some(key[i].as_str())).collect();
                Arc::new(values) as ArrayRef
            })
            .collect();
        arrays.push(Arc::new(Float64Array::from(self.counts)));
        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}

/// Rows that can receive redistributed mass, indexed lazily by each subset
/// of known columns
struct Receivers {
    table: CountTable,
    filter: Vec<usize>,
    index: HashMap<usize, HashMap<Vec<String>, Vec<usize>>>,
}

impl Receivers {
    fn new(table: CountTable, filter: Vec<usize>) -> Self {
        Self {
            table,
            filter,
            index: HashMap::new(),
        }
    }

    fn project(filter: &[usize], key: &[String], known: usize) -> Vec<String> {
        filter
            .iter()
            .enumerate()
            .filter(|(i, _)| known & (1 << *i) != 0)
            .map(|(_, &column)| key[column].clone())
            .collect()
    }

    fn matching(&mut self, key: &[String], known: usize) -> Vec<usize> {
        let Self {
            table,
            filter,
            index,
        } = self;
        let by_key = index.entry(known).or_insert_with(|| {
            let mut by_key: HashMap<Vec<String>, Vec<usize>> = HashMap::new();
            for (row, row_key) in table.keys.iter().enumerate() {
                by_key
                    .entry(Self::project(filter, row_key, known))
                    .or_default()
                    .push(row);
            }
            by_key
        });
        by_key
            .get(&Self::project(filter, key, known))
            .cloned()
            .unwrap_or_default()
    }

    /// Adds `amount` pro rata to the rows matching `key` on `known`
    fn spread(&mut self, key: &[String], mut known: usize, amount: f64) -> DatasusResult<()> {
        loop {
            let rows = self.matching(key, known);
            let total: f64 = rows.iter().map(|&row| self.table.counts[row]).sum();
            if total > 0.0 {
                for row in rows {
                    let current = self.table.counts[row];
                    self.table.counts[row] = current + amount * current / total;
                }
                return Ok(());
            }
            if known == 0 {
                return Err(DatasusError::validation("counts", [key.join("|")]));
            }
            let last = usize::BITS - 1 - known.leading_zeros();
            known &= !(1usize << last);
        }
    }
}
