use std::cmp::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use tracing::trace;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::replication::dialect::SourceDialect;
use crate::replication::source::{ChangeStream, ResultRow};
use crate::schema::RowReconciler;
use crate::types::{ChangeTable, ResultColumn, TableRow, TransactionLogPosition};

/// Lifecycle of a [`ChangeSourceCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Created, [`ChangeSourceCursor::advance`] not called yet.
    Ready,
    /// Parked on a row.
    Positioned,
    /// The stream is drained. Terminal.
    Exhausted,
    /// Reading the stream failed. Terminal.
    Failed,
}

/// Forward-only cursor over the change stream of one capture instance.
///
/// Dropping the cursor releases the underlying stream, whatever its state.
pub struct ChangeSourceCursor<R, S> {
    table: Arc<ChangeTable>,
    dialect: SourceDialect,
    columns: Vec<ResultColumn>,
    rows: S,
    state: CursorState,
    current_row: Option<R>,
    current_position: TransactionLogPosition,
    previous_position: Option<TransactionLogPosition>,
    reconciler: Option<Arc<RowReconciler>>,
}

impl<R, S> ChangeSourceCursor<R, S>
where
    R: ResultRow,
    S: Stream<Item = CdcResult<R>> + Unpin,
{
    pub fn new(table: Arc<ChangeTable>, dialect: SourceDialect, stream: ChangeStream<S>) -> Self {
        Self {
            table,
            dialect,
            columns: stream.columns,
            rows: stream.rows,
            state: CursorState::Ready,
            current_row: None,
            current_position: TransactionLogPosition::NULL,
            previous_position: None,
            reconciler: None,
        }
    }

    /// Uses an already built reconciler instead of building one on the first [`Self::get_row`].
    pub fn with_reconciler(mut self, reconciler: Arc<RowReconciler>) -> Self {
        self.reconciler = Some(reconciler);
        self
    }

    pub fn table(&self) -> &Arc<ChangeTable> {
        &self.table
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Result metadata of the change stream, marker columns included.
    pub fn columns(&self) -> &[ResultColumn] {
        &self.columns
    }

    /// Reconciler in use, once built or injected.
    pub fn reconciler(&self) -> Option<&Arc<RowReconciler>> {
        self.reconciler.as_ref()
    }

    /// Moves to the next row.
    ///
    /// Returns `false` once the stream is drained, and keeps returning `false` afterwards. A read
    /// or decode failure is returned as is and leaves the cursor [`CursorState::Failed`].
    pub async fn advance(&mut self) -> CdcResult<bool> {
        match self.state {
            CursorState::Exhausted => return Ok(false),
            CursorState::Failed => bail!(
                ErrorKind::InvalidCursorState,
                "Cannot advance a failed cursor",
                format!("capture instance {}", self.table.capture_instance)
            ),
            CursorState::Ready | CursorState::Positioned => {}
        }

        let next = match self.rows.try_next().await {
            Ok(Some(row)) => self.dialect.read_position(&row).map(|position| (row, position)),
            Ok(None) => {
                trace!(table = %self.table.capture_instance, "change stream exhausted");
                self.state = CursorState::Exhausted;
                self.current_row = None;
                self.previous_position = None;
                self.current_position = TransactionLogPosition::NULL;
                return Ok(false);
            }
            Err(err) => Err(err),
        };

        match next {
            Ok((row, position)) => {
                let previous = std::mem::replace(&mut self.current_position, position);
                self.previous_position = match self.state {
                    CursorState::Positioned => Some(previous),
                    _ => None,
                };
                self.current_row = Some(row);
                self.state = CursorState::Positioned;
                Ok(true)
            }
            Err(err) => {
                self.state = CursorState::Failed;
                self.current_row = None;
                Err(err)
            }
        }
    }

    /// Position of the current row, [`TransactionLogPosition::NULL`] once exhausted.
    pub fn current_position(&self) -> CdcResult<TransactionLogPosition> {
        match self.state {
            CursorState::Positioned => Ok(self.current_position.clone()),
            CursorState::Exhausted => Ok(TransactionLogPosition::NULL),
            CursorState::Ready | CursorState::Failed => self.invalid_state("read the position of"),
        }
    }

    /// Returns `true` when the current row commits after the previous one.
    ///
    /// Always `false` on the first row of the stream.
    pub fn is_new_transaction(&self) -> bool {
        if self.state != CursorState::Positioned {
            return false;
        }

        self.previous_position.as_ref().is_some_and(|previous| {
            self.current_position.commit.partial_cmp(&previous.commit) == Some(Ordering::Greater)
        })
    }

    /// Operation code of the current row.
    pub fn operation(&self) -> CdcResult<i32> {
        self.dialect.read_operation(self.positioned_row()?)
    }

    /// Update mask of the current row, if the source exposes one.
    pub fn update_mask(&self) -> CdcResult<Option<Bytes>> {
        self.dialect.read_update_mask(self.positioned_row()?)
    }

    /// Materializes the current row at the width of the table schema.
    ///
    /// The reconciler is built on the first call and reused for the rest of the stream.
    pub fn get_row(&mut self) -> CdcResult<TableRow> {
        let reconciler = match &self.reconciler {
            Some(reconciler) => reconciler.clone(),
            None => {
                let reconciler = Arc::new(RowReconciler::build(
                    &self.table.schema,
                    &self.columns,
                    &self.dialect,
                )?);
                self.reconciler = Some(reconciler.clone());
                reconciler
            }
        };

        reconciler.reconcile(self.positioned_row()?)
    }

    fn positioned_row(&self) -> CdcResult<&R> {
        match (&self.state, &self.current_row) {
            (CursorState::Positioned, Some(row)) => Ok(row),
            _ => self.invalid_state("read a row from"),
        }
    }

    fn invalid_state<T>(&self, action: &str) -> CdcResult<T> {
        bail!(
            ErrorKind::InvalidCursorState,
            "Cursor is not positioned on a row",
            format!(
                "cannot {action} cursor of {} in state {:?}",
                self.table.capture_instance, self.state
            )
        )
    }
}
