//! Decoding and aggregation helpers for loaded tables.
//!
//! Frames are Arrow [`RecordBatch`](arrow::record_batch::RecordBatch)es as
//! returned by [`Table::to_frame`](crate::models::local::Table::to_frame).
//! Categorical outputs are text columns in which a missing value is spelled
//! with a placeholder ([`NAN_STRING`] by default) so that it can be counted
//! and redistributed like any other category.

pub mod decoders;
pub mod sim;

pub use decoders::{
    AgeClasses, AgeUnit, CID10_CHAPTERS, Cid10Chapter, ILL_DEFINED_CHAPTER, SimTranslateOptions,
    add_check_digit, calculate_digit, cid10_chapter, classify_age, decode_age_sim,
    decode_age_sinan, decode_ages_sim, decode_ages_sinan, decode_race, decode_sex,
    is_valid_geocode, translate_sim_variables,
};
pub use sim::{
    COUNT_COLUMN, group_and_count, redistribute_cid_chapter, redistribute_missing,
    redistribute_missing_with, redistribute_sentinel,
};

use crate::errors::DatasusResult;
use arrow::array::{ArrayRef, AsArray, StringArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;

/// Placeholder of a missing category
pub const NAN_STRING: &str = "nan";

/// A column rendered as text, whatever its stored type
pub(crate) fn text_column(column: &ArrayRef) -> DatasusResult<StringArray> {
    let casted = cast(column, &DataType::Utf8)?;
    Ok(casted.as_string::<i32>().clone())
}

/// Column `name` of `batch`, failing with a validation error naming it
pub(crate) fn required_column<'a>(batch: &'a RecordBatch, name: &str) -> DatasusResult<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| crate::errors::DatasusError::validation("column", [name]))
}
