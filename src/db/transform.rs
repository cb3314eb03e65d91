//! Row transformers turning a result set into a caller-facing value.

use crate::db::types::RowReader;
use crate::error::StoreResult;
use crate::models::RowRecord;
use std::collections::HashSet;

/// Converts fetched rows into an output value.
///
/// `apply` returns `Ok(None)` when the rows hold no value for this
/// transformer, e.g. a scalar read over an empty result set.
pub trait RowTransform {
    type Output;

    /// Whether only the first row is needed. The executor stops fetching after it.
    fn first_row_only(&self) -> bool {
        true
    }

    fn apply<R: RowReader>(&self, rows: &[R]) -> StoreResult<Option<Self::Output>>;
}

/// Every row as a label-to-string mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadRecords;

impl RowTransform for ReadRecords {
    type Output = Vec<RowRecord>;

    fn first_row_only(&self) -> bool {
        false
    }

    fn apply<R: RowReader>(&self, rows: &[R]) -> StoreResult<Option<Self::Output>> {
        let Some(first) = rows.first() else {
            return Ok(Some(Vec::new()));
        };

        // Duplicate labels collapse to the first column carrying them.
        let mut seen = HashSet::new();
        let columns: Vec<(String, usize)> = first
            .column_labels()
            .into_iter()
            .enumerate()
            .filter(|(_, label)| seen.insert(label.clone()))
            .map(|(idx, label)| (label, idx))
            .collect();

        let records = rows
            .iter()
            .map(|row| -> StoreResult<RowRecord> {
                let mut record = RowRecord::with_capacity(columns.len());
                for (label, idx) in &columns {
                    record.insert(label.clone(), row.read_string(*idx)?);
                }
                Ok(record)
            })
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Some(records))
    }
}

/// First column of the first row as an integer; NULL reads as 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadInt;

impl RowTransform for ReadInt {
    type Output = i64;

    fn apply<R: RowReader>(&self, rows: &[R]) -> StoreResult<Option<i64>> {
        rows.first()
            .map(|row| -> StoreResult<i64> { Ok(row.read_int(0)?.unwrap_or(0)) })
            .transpose()
    }
}

/// First column of the first row as a boolean; NULL reads as false.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadBool;

impl RowTransform for ReadBool {
    type Output = bool;

    fn apply<R: RowReader>(&self, rows: &[R]) -> StoreResult<Option<bool>> {
        rows.first()
            .map(|row| -> StoreResult<bool> { Ok(row.read_bool(0)?.unwrap_or(false)) })
            .transpose()
    }
}

/// First column of the first row as a string; NULL reads as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadString;

impl RowTransform for ReadString {
    type Output = String;

    fn apply<R: RowReader>(&self, rows: &[R]) -> StoreResult<Option<String>> {
        match rows.first() {
            Some(row) => row.read_string(0),
            None => Ok(None),
        }
    }
}
