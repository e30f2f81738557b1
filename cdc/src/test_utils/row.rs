use bytes::Bytes;
use chrono::{NaiveTime, Timelike};

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::replication::source::ResultRow;
use crate::types::{Cell, TransactionLogPosition};

/// A raw change row held in memory.
///
/// Like the drivers it stands in for, its generic accessor drops the sub-second part of
/// time-of-day values. Only [`ResultRow::time`] returns them in full.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryResultRow {
    values: Vec<Cell>,
}

impl MemoryResultRow {
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    /// Builds a row in the default layout: commit position, row position, operation, a null update
    /// mask, then `payload`.
    pub fn change(position: &TransactionLogPosition, operation: i32, payload: Vec<Cell>) -> Self {
        let mut values = Vec::with_capacity(payload.len() + 4);
        values.push(Cell::Bytes(position.commit.as_bytes().to_vec()));
        values.push(Cell::Bytes(position.row.as_bytes().to_vec()));
        values.push(Cell::I32(operation));
        values.push(Cell::Null);
        values.extend(payload);

        Self { values }
    }

    /// Replaces the value at `index`.
    pub fn with_value(mut self, index: usize, value: Cell) -> Self {
        self.values[index] = value;
        self
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    fn get(&self, index: usize) -> CdcResult<&Cell> {
        match self.values.get(index) {
            Some(value) => Ok(value),
            None => bail!(
                ErrorKind::SourceQueryFailed,
                "Column index out of range",
                format!("index {index}, row has {} columns", self.values.len())
            ),
        }
    }
}

impl ResultRow for MemoryResultRow {
    fn bytes(&self, index: usize) -> CdcResult<Option<Bytes>> {
        match self.get(index)? {
            Cell::Null => Ok(None),
            Cell::Bytes(bytes) => Ok(Some(Bytes::copy_from_slice(bytes))),
            other => bail!(
                ErrorKind::ConversionError,
                "Column is not binary",
                format!("index {index} holds {other:?}")
            ),
        }
    }

    fn int(&self, index: usize) -> CdcResult<Option<i32>> {
        match self.get(index)? {
            Cell::Null => Ok(None),
            Cell::I16(value) => Ok(Some(i32::from(*value))),
            Cell::I32(value) => Ok(Some(*value)),
            other => bail!(
                ErrorKind::ConversionError,
                "Column is not an integer",
                format!("index {index} holds {other:?}")
            ),
        }
    }

    fn value(&self, index: usize) -> CdcResult<Cell> {
        match self.get(index)? {
            Cell::Time(time) => Ok(Cell::Time(time.with_nanosecond(0).unwrap_or(*time))),
            other => Ok(other.clone()),
        }
    }

    fn time(&self, index: usize) -> CdcResult<Option<NaiveTime>> {
        match self.get(index)? {
            Cell::Null => Ok(None),
            Cell::Time(time) => Ok(Some(*time)),
            other => bail!(
                ErrorKind::ConversionError,
                "Column is not a time of day",
                format!("index {index} holds {other:?}")
            ),
        }
    }
}
