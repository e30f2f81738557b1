use std::fmt;

use bytes::Bytes;

use crate::types::{LogPosition, TableId, TableRow, TransactionLogPosition};

/// Start of a source transaction in the merged change stream.
#[derive(Debug, Clone, PartialEq)]
pub struct BeginEvent {
    /// Commit position of the transaction.
    pub commit_position: LogPosition,
}

/// End of a source transaction in the merged change stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitEvent {
    /// Commit position of the transaction.
    pub commit_position: LogPosition,
}

/// A single row change read from a capture instance.
#[derive(Debug, Clone, PartialEq)]
pub struct RowChangeEvent {
    pub table_id: TableId,
    pub capture_instance: String,
    pub position: TransactionLogPosition,
    /// Source operation code, passed through unchanged.
    pub operation: i32,
    /// Bitmask of the columns touched by an update, when the source exposes it.
    pub update_mask: Option<Bytes>,
    pub table_row: TableRow,
}

/// Events written to an [`crate::sink::EventSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Begin(BeginEvent),
    Commit(CommitEvent),
    Row(RowChangeEvent),
}

impl ChangeEvent {
    pub fn event_type(&self) -> EventType {
        self.into()
    }
}

/// Kind of a [`ChangeEvent`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Begin,
    Commit,
    Row,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventType::Begin => "begin",
            EventType::Commit => "commit",
            EventType::Row => "row",
        };
        f.write_str(name)
    }
}

impl From<&ChangeEvent> for EventType {
    fn from(event: &ChangeEvent) -> Self {
        match event {
            ChangeEvent::Begin(_) => EventType::Begin,
            ChangeEvent::Commit(_) => EventType::Commit,
            ChangeEvent::Row(_) => EventType::Row,
        }
    }
}
