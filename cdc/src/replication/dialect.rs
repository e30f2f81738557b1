use bytes::Bytes;
use cdc_config::shared::{ChangeSourceConfig, UnknownColumnPolicy};

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::replication::source::ResultRow;
use crate::types::{LogPosition, MaxPositionProbe, TransactionLogPosition};

/// How a concrete source lays out change stream rows and which accessor quirks it has.
///
/// Built once from a validated [`ChangeSourceConfig`] and shared by every cursor of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceDialect {
    pub position_width: usize,
    pub commit_position_column: usize,
    pub row_position_column: usize,
    pub operation_column: usize,
    pub update_mask_column: Option<usize>,
    pub data_column_offset: usize,
    pub typed_time_accessor: bool,
    pub unknown_column_policy: UnknownColumnPolicy,
}

impl SourceDialect {
    /// Validates `config` and converts it into a dialect.
    pub fn try_from_config(config: &ChangeSourceConfig) -> CdcResult<Self> {
        config.validate()?;

        Ok(config.into())
    }

    /// Decodes a position read from a probe or a marker column.
    ///
    /// An empty value maps to [`LogPosition::NONE`]. Any other width than the dialect's is
    /// rejected.
    pub fn decode_position(&self, raw: Bytes) -> CdcResult<LogPosition> {
        if !raw.is_empty() && raw.len() != self.position_width {
            bail!(
                ErrorKind::InvalidPosition,
                "Log position has an unexpected width",
                format!(
                    "expected {} bytes, got {} bytes",
                    self.position_width,
                    raw.len()
                )
            );
        }

        Ok(LogPosition::new(raw))
    }

    /// Decodes the raw `(max_position, max_transactional_position)` pair of a probe.
    pub fn decode_probe(
        &self,
        (max, max_transactional): (Bytes, Bytes),
    ) -> CdcResult<MaxPositionProbe> {
        MaxPositionProbe::new(
            self.decode_position(max)?,
            self.decode_position(max_transactional)?,
        )
    }

    /// Reads the commit and row markers of a change row.
    ///
    /// Both markers are mandatory on change rows: a missing or empty marker is an error.
    pub fn read_position<R: ResultRow>(&self, row: &R) -> CdcResult<TransactionLogPosition> {
        let commit = self.read_marker(row, self.commit_position_column, "commit position")?;
        let row = self.read_marker(row, self.row_position_column, "row position")?;

        Ok(TransactionLogPosition::new(commit, row))
    }

    /// Reads the operation code of a change row.
    pub fn read_operation<R: ResultRow>(&self, row: &R) -> CdcResult<i32> {
        match row.int(self.operation_column)? {
            Some(operation) => Ok(operation),
            None => bail!(
                ErrorKind::InvalidState,
                "Change row has no operation code",
                format!("column {} is null", self.operation_column)
            ),
        }
    }

    /// Reads the update mask of a change row, if the source exposes one.
    pub fn read_update_mask<R: ResultRow>(&self, row: &R) -> CdcResult<Option<Bytes>> {
        match self.update_mask_column {
            Some(column) => row.bytes(column),
            None => Ok(None),
        }
    }

    fn read_marker<R: ResultRow>(
        &self,
        row: &R,
        column: usize,
        marker: &'static str,
    ) -> CdcResult<LogPosition> {
        match row.bytes(column)? {
            Some(raw) if !raw.is_empty() => self.decode_position(raw),
            _ => bail!(
                ErrorKind::InvalidPosition,
                "Change row has no position marker",
                format!("{marker} in column {column} is null")
            ),
        }
    }
}

impl From<&ChangeSourceConfig> for SourceDialect {
    fn from(config: &ChangeSourceConfig) -> Self {
        Self {
            position_width: config.position_width,
            commit_position_column: config.commit_position_column,
            row_position_column: config.row_position_column,
            operation_column: config.operation_column,
            update_mask_column: config.update_mask_column,
            data_column_offset: config.data_column_offset,
            typed_time_accessor: config.typed_time_accessor,
            unknown_column_policy: config.unknown_column_policy,
        }
    }
}

impl Default for SourceDialect {
    fn default() -> Self {
        Self::from(&ChangeSourceConfig::default())
    }
}
