use std::collections::{HashMap, HashSet};

use cdc_config::shared::UnknownColumnPolicy;
use tracing::warn;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::replication::dialect::SourceDialect;
use crate::replication::source::ResultRow;
use crate::types::{Cell, ColumnType, ResultColumn, TableRow, TableSchema};

/// Where each raw payload column lands in the full-width row.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ColumnMapping {
    /// Raw payload columns are exactly the schema columns, in order.
    Identity,
    /// Target index per raw payload column, [`None`] for discarded columns.
    Indexed(Vec<Option<usize>>),
}

/// Accessor used to extract one raw payload column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnReader {
    Generic,
    TypedTime,
}

impl ColumnReader {
    fn for_column(column: &ResultColumn, dialect: &SourceDialect) -> Self {
        if dialect.typed_time_accessor && column.typ == ColumnType::Time {
            ColumnReader::TypedTime
        } else {
            ColumnReader::Generic
        }
    }

    fn read<R: ResultRow>(self, row: &R, index: usize) -> CdcResult<Cell> {
        match self {
            ColumnReader::Generic => row.value(index),
            ColumnReader::TypedTime => Ok(row.time(index)?.into()),
        }
    }
}

/// Maps the payload columns of a change stream onto the authoritative table schema.
///
/// A capture instance may record fewer columns than the table has, or record them under a
/// layout that differs from the current schema. The reconciler is built once per
/// (schema, result columns) pair and then turns every raw row into a [`TableRow`] of schema
/// width, with [`Cell::Null`] in every slot that has no raw counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowReconciler {
    width: usize,
    data_column_offset: usize,
    mapping: ColumnMapping,
    readers: Vec<ColumnReader>,
}

impl RowReconciler {
    /// Builds the mapping from `columns`, the full result metadata marker columns included.
    pub fn build(
        schema: &TableSchema,
        columns: &[ResultColumn],
        dialect: &SourceDialect,
    ) -> CdcResult<Self> {
        let Some(payload) = columns.get(dialect.data_column_offset..) else {
            bail!(
                ErrorKind::InvalidState,
                "Change stream has fewer columns than marker columns",
                format!(
                    "table {}: {} columns, data starts at column {}",
                    schema.name,
                    columns.len(),
                    dialect.data_column_offset
                )
            );
        };

        let readers = payload
            .iter()
            .map(|column| ColumnReader::for_column(column, dialect))
            .collect();

        let identity = payload.len() == schema.width()
            && payload
                .iter()
                .zip(schema.column_names())
                .all(|(column, name)| column.name == name);

        let mapping = if identity {
            ColumnMapping::Identity
        } else {
            ColumnMapping::Indexed(Self::index_columns(schema, payload, dialect)?)
        };

        Ok(Self {
            width: schema.width(),
            data_column_offset: dialect.data_column_offset,
            mapping,
            readers,
        })
    }

    fn index_columns(
        schema: &TableSchema,
        payload: &[ResultColumn],
        dialect: &SourceDialect,
    ) -> CdcResult<Vec<Option<usize>>> {
        let positions: HashMap<&str, usize> = schema
            .column_names()
            .enumerate()
            .map(|(index, name)| (name, index))
            .collect();

        let mut seen = HashSet::with_capacity(payload.len());
        let mut targets = Vec::with_capacity(payload.len());
        let mut discarded = Vec::new();

        for column in payload {
            if !seen.insert(column.name.as_str()) {
                bail!(
                    ErrorKind::DuplicateCapturedColumn,
                    "Captured column appears more than once in the change stream",
                    format!("column `{}` of table {}", column.name, schema.name)
                );
            }

            match positions.get(column.name.as_str()) {
                Some(&index) => targets.push(Some(index)),
                None if dialect.unknown_column_policy == UnknownColumnPolicy::Discard => {
                    discarded.push(column.name.as_str());
                    targets.push(None);
                }
                None => bail!(
                    ErrorKind::UnknownCapturedColumn,
                    "Captured column not found in table schema",
                    format!("column `{}` of table {}", column.name, schema.name)
                ),
            }
        }

        if !discarded.is_empty() {
            warn!(
                table = %schema.name,
                columns = ?discarded,
                "discarding captured columns missing from the table schema"
            );
        }

        Ok(targets)
    }

    /// Returns `true` when raw payload columns are copied positionally.
    pub fn is_identity(&self) -> bool {
        self.mapping == ColumnMapping::Identity
    }

    /// Width of the rows produced by this reconciler.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Builds the full-width row for `row`.
    pub fn reconcile<R: ResultRow>(&self, row: &R) -> CdcResult<TableRow> {
        let offset = self.data_column_offset;

        let values = match &self.mapping {
            ColumnMapping::Identity => self
                .readers
                .iter()
                .enumerate()
                .map(|(i, reader)| reader.read(row, offset + i))
                .collect::<CdcResult<Vec<_>>>()?,
            ColumnMapping::Indexed(targets) => {
                let mut values = vec![Cell::Null; self.width];
                for (i, (target, reader)) in targets.iter().zip(&self.readers).enumerate() {
                    if let Some(target) = target {
                        values[*target] = reader.read(row, offset + i)?;
                    }
                }
                values
            }
        };

        Ok(TableRow::new(values))
    }
}
