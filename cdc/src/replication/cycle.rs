use std::mem;
use std::sync::Arc;

use cdc_config::shared::CaptureConfig;
use tracing::{debug, info, trace, warn};

use crate::error::CdcResult;
use crate::failpoints::{POLL_CYCLE__AFTER_PROBE, cdc_fail_point};
use crate::replication::cursor::ChangeSourceCursor;
use crate::replication::dialect::SourceDialect;
use crate::replication::merge::{ChangeStreamMerger, MergedChange};
use crate::replication::source::{ChangeStreamSource, PositionProbeSource};
use crate::schema::SchemaCache;
use crate::sink::EventSink;
use crate::types::{
    BeginEvent, ChangeEvent, ChangeTable, CommitEvent, LogPosition, PositionRange, ProbeDecision,
    RowChangeEvent, TransactionLogPosition,
};

/// Result of one polling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Watermark to pass to the next cycle.
    pub next_low: TransactionLogPosition,
    /// Highest position known to the source, never below the commit position of the input
    /// watermark.
    pub high_water_mark: LogPosition,
    /// `true` when the probe showed no transactional change and no stream was opened.
    pub skipped: bool,
    /// Row events delivered to the sink.
    pub rows: usize,
    /// Transactions delivered to the sink.
    pub transactions: usize,
    /// Rows left to a newer capture instance.
    pub superseded: usize,
}

/// One probe-merge-deliver pass over a set of capture instances.
///
/// The cycle is stateless between runs: the caller passes the watermark of the last delivered
/// position in and gets the next one back.
pub struct PollCycle<S, K> {
    source: S,
    sink: K,
    dialect: SourceDialect,
    batch_max_size: usize,
    schema_cache: SchemaCache,
}

/// Events of the running cycle waiting to be written.
struct PendingBatch {
    events: Vec<ChangeEvent>,
    max_size: usize,
}

impl<S, K> PollCycle<S, K>
where
    S: PositionProbeSource + ChangeStreamSource,
    K: EventSink,
{
    pub fn new(
        source: S,
        sink: K,
        dialect: SourceDialect,
        batch_max_size: usize,
        schema_cache: SchemaCache,
    ) -> Self {
        Self {
            source,
            sink,
            dialect,
            batch_max_size: batch_max_size.max(1),
            schema_cache,
        }
    }

    /// Validates `config` and builds a cycle from its source layout and batch settings.
    pub fn from_config(
        config: &CaptureConfig,
        source: S,
        sink: K,
        schema_cache: SchemaCache,
    ) -> CdcResult<Self> {
        config.validate()?;
        let dialect = SourceDialect::try_from_config(&config.source)?;

        Ok(Self::new(
            source,
            sink,
            dialect,
            config.batch.max_size,
            schema_cache,
        ))
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schema_cache
    }

    /// Runs one cycle over `tables`, starting after `low`.
    ///
    /// Events are written as `Begin`, `Row`..., `Commit` per source transaction. On error, batches
    /// already written stay written and the returned watermark is lost, so the next cycle
    /// starting from the old `low` delivers them again.
    pub async fn run(
        &self,
        tables: &[Arc<ChangeTable>],
        low: TransactionLogPosition,
    ) -> CdcResult<CycleOutcome> {
        let raw_probe = self.source.max_positions().await?;
        let probe = self.dialect.decode_probe(raw_probe)?;

        cdc_fail_point(POLL_CYCLE__AFTER_PROBE)?;

        let high_water_mark = probe.max_position().clone().try_max(low.commit.clone())?;
        let next_floor = TransactionLogPosition::at_commit(probe.max_position().clone());

        let range = match probe.evaluate(&low)? {
            ProbeDecision::Skip { .. } => {
                debug!(
                    low = %low,
                    max_position = %probe.max_position(),
                    max_transactional_position = %probe.max_transactional_position(),
                    "no transactional changes, skipping scan"
                );

                return Ok(CycleOutcome {
                    next_low: low.try_max(next_floor)?,
                    high_water_mark,
                    skipped: true,
                    rows: 0,
                    transactions: 0,
                    superseded: 0,
                });
            }
            ProbeDecision::Scan { range } => range,
        };

        debug!(range = %range, tables = tables.len(), "scanning change streams");

        let mut merger = ChangeStreamMerger::new(self.open_cursors(tables, &range).await?);
        let mut batch = PendingBatch {
            events: Vec::with_capacity(self.batch_max_size),
            max_size: self.batch_max_size,
        };
        let mut open_transaction: Option<LogPosition> = None;
        let mut last_delivered = low;
        let mut rows = 0;
        let mut transactions = 0;

        while let Some(change) = merger.next().await? {
            if open_transaction.as_ref() != Some(&change.position.commit) {
                if let Some(commit_position) = open_transaction.take() {
                    self.push(&mut batch, ChangeEvent::Commit(CommitEvent { commit_position }))
                        .await?;
                }

                let commit_position = change.position.commit.clone();
                open_transaction = Some(commit_position.clone());
                transactions += 1;
                self.push(&mut batch, ChangeEvent::Begin(BeginEvent { commit_position }))
                    .await?;
            }

            last_delivered = change.position.clone();
            rows += 1;
            self.push(&mut batch, row_event(change)).await?;
        }

        if let Some(commit_position) = open_transaction {
            self.push(&mut batch, ChangeEvent::Commit(CommitEvent { commit_position }))
                .await?;
        }
        self.flush(&mut batch).await?;

        for cursor in merger.cursors() {
            if let Some(reconciler) = cursor.reconciler() {
                self.schema_cache
                    .put_reconciler(
                        cursor.table(),
                        cursor.columns(),
                        &self.dialect,
                        reconciler.clone(),
                    )
                    .await;
            }
        }

        let outcome = CycleOutcome {
            next_low: last_delivered.try_max(next_floor)?,
            high_water_mark,
            skipped: false,
            rows,
            transactions,
            superseded: merger.superseded(),
        };

        if outcome.rows > 0 {
            info!(
                rows = outcome.rows,
                transactions = outcome.transactions,
                next_low = %outcome.next_low,
                "delivered change events"
            );
        }

        Ok(outcome)
    }

    /// Opens one cursor per table. Every table is attempted, and all failures are returned
    /// together.
    async fn open_cursors(
        &self,
        tables: &[Arc<ChangeTable>],
        range: &PositionRange,
    ) -> CdcResult<Vec<ChangeSourceCursor<S::Row, S::Rows>>> {
        let mut cursors = Vec::with_capacity(tables.len());
        let mut errors = Vec::new();

        for table in tables {
            let stream = match self.source.open_stream(table, range).await {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(
                        table = %table.capture_instance,
                        error = %err,
                        "failed to open change stream"
                    );
                    errors.push(err);
                    continue;
                }
            };
            trace!(
                table = %table.capture_instance,
                columns = stream.columns.len(),
                "opened change stream"
            );

            let cached = self
                .schema_cache
                .get_reconciler(table, &stream.columns, &self.dialect)
                .await;
            let mut cursor = ChangeSourceCursor::new(table.clone(), self.dialect, stream);
            if let Some(reconciler) = cached {
                cursor = cursor.with_reconciler(reconciler);
            }

            cursors.push(cursor);
        }

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(cursors)
    }

    async fn push(&self, batch: &mut PendingBatch, event: ChangeEvent) -> CdcResult<()> {
        batch.events.push(event);
        if batch.events.len() >= batch.max_size {
            self.flush(batch).await?;
        }

        Ok(())
    }

    async fn flush(&self, batch: &mut PendingBatch) -> CdcResult<()> {
        if batch.events.is_empty() {
            return Ok(());
        }

        let events = mem::replace(&mut batch.events, Vec::with_capacity(batch.max_size));
        self.sink.write_events(events).await
    }
}

fn row_event(change: MergedChange) -> ChangeEvent {
    ChangeEvent::Row(RowChangeEvent {
        table_id: change.table.table_id,
        capture_instance: change.table.capture_instance.clone(),
        position: change.position,
        operation: change.operation,
        update_mask: change.update_mask,
        table_row: change.row,
    })
}
