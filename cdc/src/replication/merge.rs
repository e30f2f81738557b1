use std::cmp::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use tracing::trace;

use crate::error::CdcResult;
use crate::replication::cursor::{ChangeSourceCursor, CursorState};
use crate::replication::source::ResultRow;
use crate::types::{ChangeTable, TableRow, TransactionLogPosition};

/// A row change picked by [`ChangeStreamMerger`], in global position order.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedChange {
    pub table: Arc<ChangeTable>,
    pub position: TransactionLogPosition,
    pub operation: i32,
    pub update_mask: Option<Bytes>,
    /// Whether the row starts a new transaction within its own capture instance.
    pub is_new_transaction: bool,
    pub row: TableRow,
}

/// K-way merge of the cursors of one polling cycle.
///
/// Always yields the row of the cursor with the lowest current position. Equal positions are
/// yielded in cursor order. Rows committed at or after the stop position of their capture
/// instance are skipped.
pub struct ChangeStreamMerger<R, S> {
    cursors: Vec<ChangeSourceCursor<R, S>>,
    primed: bool,
    last_yielded: Option<usize>,
    superseded: usize,
}

impl<R, S> ChangeStreamMerger<R, S>
where
    R: ResultRow,
    S: Stream<Item = CdcResult<R>> + Unpin,
{
    pub fn new(cursors: Vec<ChangeSourceCursor<R, S>>) -> Self {
        Self {
            cursors,
            primed: false,
            last_yielded: None,
            superseded: 0,
        }
    }

    /// Returns the next change in position order, or [`None`] once every cursor is exhausted.
    ///
    /// The first call reads the first row of every cursor and reports the failures of all of them
    /// at once.
    pub async fn next(&mut self) -> CdcResult<Option<MergedChange>> {
        if !self.primed {
            self.primed = true;

            let mut errors = Vec::new();
            for cursor in &mut self.cursors {
                if let Err(err) = cursor.advance().await {
                    errors.push(err);
                }
            }
            if !errors.is_empty() {
                return Err(errors.into());
            }
        } else if let Some(index) = self.last_yielded.take() {
            self.cursors[index].advance().await?;
        }

        loop {
            let Some(index) = self.lowest()? else {
                return Ok(None);
            };

            let cursor = &mut self.cursors[index];
            let position = cursor.current_position()?;

            if cursor.table().is_superseded_at(&position.commit)? {
                trace!(
                    table = %cursor.table().capture_instance,
                    position = %position,
                    "skipping change owned by a newer capture instance"
                );
                self.superseded += 1;
                cursor.advance().await?;
                continue;
            }

            self.last_yielded = Some(index);

            return Ok(Some(MergedChange {
                table: cursor.table().clone(),
                operation: cursor.operation()?,
                update_mask: cursor.update_mask()?,
                is_new_transaction: cursor.is_new_transaction(),
                row: cursor.get_row()?,
                position,
            }));
        }
    }

    /// Number of rows skipped because a newer capture instance owns them.
    pub fn superseded(&self) -> usize {
        self.superseded
    }

    pub fn cursors(&self) -> &[ChangeSourceCursor<R, S>] {
        &self.cursors
    }

    fn lowest(&self) -> CdcResult<Option<usize>> {
        let mut lowest: Option<(usize, TransactionLogPosition)> = None;

        for (index, cursor) in self.cursors.iter().enumerate() {
            if cursor.state() != CursorState::Positioned {
                continue;
            }

            let position = cursor.current_position()?;
            let is_lower = match &lowest {
                Some((_, current)) => position.try_cmp(current)? == Ordering::Less,
                None => true,
            };
            if is_lower {
                lowest = Some((index, position));
            }
        }

        Ok(lowest.map(|(index, _)| index))
    }
}
