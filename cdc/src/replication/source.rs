//! Contracts of the collaborators that feed the change-capture core.

use std::future::Future;

use bytes::Bytes;
use chrono::NaiveTime;
use futures::Stream;

use crate::error::CdcResult;
use crate::types::{Cell, ChangeTable, PositionRange, ResultColumn};

/// One raw row of a change stream result.
///
/// Indices are zero-based positions in the result, marker columns included.
pub trait ResultRow: Send {
    /// Reads a binary column, used for position markers and update masks.
    fn bytes(&self, index: usize) -> CdcResult<Option<Bytes>>;

    /// Reads an integer column, used for the operation code.
    fn int(&self, index: usize) -> CdcResult<Option<i32>>;

    /// Reads any payload column through the source's generic accessor.
    fn value(&self, index: usize) -> CdcResult<Cell>;

    /// Reads a time-of-day column through the source's typed accessor.
    ///
    /// Sources whose generic accessor truncates sub-second precision for this type must return
    /// the full value here.
    fn time(&self, index: usize) -> CdcResult<Option<NaiveTime>>;
}

/// An opened change stream: the result metadata and a forward-only stream of raw rows.
pub struct ChangeStream<S> {
    pub columns: Vec<ResultColumn>,
    pub rows: S,
}

impl<S> ChangeStream<S> {
    pub fn new(columns: Vec<ResultColumn>, rows: S) -> Self {
        Self { columns, rows }
    }
}

/// Source of the two maximum positions consulted once per polling cycle.
pub trait PositionProbeSource {
    /// Returns the raw `(max_position, max_transactional_position)` pair.
    fn max_positions(&self) -> impl Future<Output = CdcResult<(Bytes, Bytes)>> + Send;
}

/// Source of per-capture-instance change streams.
pub trait ChangeStreamSource {
    type Row: ResultRow;
    type Rows: Stream<Item = CdcResult<Self::Row>> + Send + Unpin;

    /// Opens the change stream of `table` for the positions in `range`.
    ///
    /// Rows must come out in non-decreasing `(commit, row)` order.
    fn open_stream(
        &self,
        table: &ChangeTable,
        range: &PositionRange,
    ) -> impl Future<Output = CdcResult<ChangeStream<Self::Rows>>> + Send;
}
