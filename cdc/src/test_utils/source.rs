use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures::stream;
use tokio::sync::Mutex;

use crate::bail;
use crate::error::{CdcError, CdcResult, ErrorKind};
use crate::replication::source::{ChangeStream, ChangeStreamSource, PositionProbeSource};
use crate::test_utils::row::MemoryResultRow;
use crate::test_utils::schema::result_columns;
use crate::types::{
    Cell, ChangeTable, ColumnType, LogPosition, PositionRange, ResultColumn,
    TransactionLogPosition,
};

/// Rows handed out by [`MemoryChangeSource`].
pub type MemoryRows = stream::Iter<std::vec::IntoIter<CdcResult<MemoryResultRow>>>;

#[derive(Debug)]
struct StoredChange {
    position: TransactionLogPosition,
    row: MemoryResultRow,
}

#[derive(Debug, Default)]
struct Inner {
    max_position: LogPosition,
    max_transactional_position: LogPosition,
    columns: HashMap<String, Vec<ResultColumn>>,
    changes: HashMap<String, Vec<StoredChange>>,
    probe_failure: Option<CdcError>,
    stream_failures: HashMap<String, (usize, CdcError)>,
    opened: Vec<(String, PositionRange)>,
}

/// In-memory change source serving both the position probe and the change streams.
///
/// Pushing a change moves both maximum positions forward; heartbeats only move the overall one.
#[derive(Debug, Clone, Default)]
pub struct MemoryChangeSource {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryChangeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a capture instance whose stream returns its captured columns, typed after the
    /// table schema. Columns missing from the schema are typed as text.
    pub async fn register_table(&self, table: &ChangeTable) {
        let payload = table
            .captured_columns
            .iter()
            .map(|name| {
                let typ = table
                    .schema
                    .column_schemas
                    .iter()
                    .find(|column| &column.name == name)
                    .map_or(ColumnType::Text, |column| column.typ);
                (name.as_str(), typ)
            })
            .collect::<Vec<_>>();

        let mut inner = self.inner.lock().await;
        inner
            .columns
            .insert(table.capture_instance.clone(), result_columns(&payload));
    }

    /// Overrides the payload columns returned for `capture_instance`.
    pub async fn set_stream_columns(&self, capture_instance: &str, payload: &[(&str, ColumnType)]) {
        let mut inner = self.inner.lock().await;
        inner
            .columns
            .insert(capture_instance.to_string(), result_columns(payload));
    }

    /// Records a change in the default row layout.
    pub async fn push_change(
        &self,
        capture_instance: &str,
        position: TransactionLogPosition,
        operation: i32,
        payload: Vec<Cell>,
    ) {
        let row = MemoryResultRow::change(&position, operation, payload);
        self.push_row(capture_instance, position, row).await;
    }

    /// Records a raw row served at `position`.
    pub async fn push_row(
        &self,
        capture_instance: &str,
        position: TransactionLogPosition,
        row: MemoryResultRow,
    ) {
        let mut inner = self.inner.lock().await;
        if position.commit > inner.max_position {
            inner.max_position = position.commit.clone();
        }
        if position.commit > inner.max_transactional_position {
            inner.max_transactional_position = position.commit.clone();
        }

        inner
            .changes
            .entry(capture_instance.to_string())
            .or_default()
            .push(StoredChange { position, row });
    }

    /// Moves the overall maximum position without any transactional change.
    pub async fn record_heartbeat(&self, position: LogPosition) {
        let mut inner = self.inner.lock().await;
        if position > inner.max_position {
            inner.max_position = position;
        }
    }

    /// Sets both maximum positions, bypassing the bookkeeping of pushed changes.
    pub async fn set_max_positions(
        &self,
        max_position: LogPosition,
        max_transactional_position: LogPosition,
    ) {
        let mut inner = self.inner.lock().await;
        inner.max_position = max_position;
        inner.max_transactional_position = max_transactional_position;
    }

    /// Makes every following probe fail with `error`.
    pub async fn fail_probe_with(&self, error: CdcError) {
        self.inner.lock().await.probe_failure = Some(error);
    }

    /// Makes streams of `capture_instance` yield `error` after `rows` rows.
    pub async fn fail_stream_after(&self, capture_instance: &str, rows: usize, error: CdcError) {
        let mut inner = self.inner.lock().await;
        inner
            .stream_failures
            .insert(capture_instance.to_string(), (rows, error));
    }

    pub async fn clear_failures(&self) {
        let mut inner = self.inner.lock().await;
        inner.probe_failure = None;
        inner.stream_failures.clear();
    }

    /// Capture instances and ranges of every stream opened so far.
    pub async fn opened_streams(&self) -> Vec<(String, PositionRange)> {
        self.inner.lock().await.opened.clone()
    }
}

impl PositionProbeSource for MemoryChangeSource {
    async fn max_positions(&self) -> CdcResult<(Bytes, Bytes)> {
        let inner = self.inner.lock().await;
        if let Some(error) = &inner.probe_failure {
            return Err(error.clone());
        }

        Ok((
            inner.max_position.clone().into_bytes(),
            inner.max_transactional_position.clone().into_bytes(),
        ))
    }
}

impl ChangeStreamSource for MemoryChangeSource {
    type Row = MemoryResultRow;
    type Rows = MemoryRows;

    async fn open_stream(
        &self,
        table: &ChangeTable,
        range: &PositionRange,
    ) -> CdcResult<ChangeStream<MemoryRows>> {
        let mut inner = self.inner.lock().await;

        let Some(columns) = inner.columns.get(&table.capture_instance).cloned() else {
            bail!(
                ErrorKind::SourceQueryFailed,
                "Capture instance does not exist",
                format!("capture instance {}", table.capture_instance)
            );
        };

        let mut selected = Vec::new();
        for change in inner
            .changes
            .get(&table.capture_instance)
            .map(Vec::as_slice)
            .unwrap_or_default()
        {
            if range.contains(&change.position)? {
                selected.push(change);
            }
        }
        selected.sort_by(|a, b| {
            a.position
                .partial_cmp(&b.position)
                .unwrap_or(Ordering::Equal)
        });

        let mut rows: Vec<CdcResult<MemoryResultRow>> =
            selected.into_iter().map(|change| Ok(change.row.clone())).collect();
        if let Some((after, error)) = inner.stream_failures.get(&table.capture_instance) {
            rows.truncate(*after);
            rows.push(Err(error.clone()));
        }

        inner
            .opened
            .push((table.capture_instance.clone(), range.clone()));

        Ok(ChangeStream::new(columns, stream::iter(rows)))
    }
}
