use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::CdcResult;
use crate::types::LogPosition;

/// Identifier of a source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl TableId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableName {
    pub schema: String,
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> TableName {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// SQL type of a column as reported by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Bool,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Numeric,
    Text,
    Date,
    /// Time of day. Sources may lose sub-second precision on their generic accessor for this type.
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    Json,
    Binary,
}

/// One column of an authoritative table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub typ: ColumnType,
    pub nullable: bool,
    pub primary: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, typ: ColumnType, nullable: bool, primary: bool) -> Self {
        Self {
            name: name.into(),
            typ,
            nullable,
            primary,
        }
    }
}

/// Authoritative, ordered column list of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub id: TableId,
    pub name: TableName,
    pub column_schemas: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(id: TableId, name: TableName, column_schemas: Vec<ColumnSchema>) -> Self {
        Self {
            id,
            name,
            column_schemas,
        }
    }

    /// Number of columns in a full-width row of this table.
    pub fn width(&self) -> usize {
        self.column_schemas.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.column_schemas.iter().map(|c| c.name.as_str())
    }

    pub fn has_primary_keys(&self) -> bool {
        self.column_schemas.iter().any(|c| c.primary)
    }
}

/// A capture instance: the per-table change source and the columns it records.
///
/// A table can have two capture instances while its schema migrates. The validity window
/// `[start_position, stop_position)` says which commits belong to this instance;
/// [`LogPosition::NONE`] leaves a side open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeTable {
    pub capture_instance: String,
    pub table_id: TableId,
    pub captured_columns: Vec<String>,
    pub schema: Arc<TableSchema>,
    pub start_position: LogPosition,
    pub stop_position: LogPosition,
}

impl ChangeTable {
    /// Creates an open-ended capture instance.
    pub fn new(
        capture_instance: impl Into<String>,
        schema: Arc<TableSchema>,
        captured_columns: Vec<String>,
    ) -> Self {
        Self {
            capture_instance: capture_instance.into(),
            table_id: schema.id,
            captured_columns,
            schema,
            start_position: LogPosition::NONE,
            stop_position: LogPosition::NONE,
        }
    }

    /// Sets the validity window of the capture instance.
    pub fn with_window(mut self, start_position: LogPosition, stop_position: LogPosition) -> Self {
        self.start_position = start_position;
        self.stop_position = stop_position;
        self
    }

    /// Returns `true` when a change committed at `commit` belongs to a successor instance.
    pub fn is_superseded_at(&self, commit: &LogPosition) -> CdcResult<bool> {
        if self.stop_position.is_none() {
            return Ok(false);
        }

        Ok(commit.try_cmp(&self.stop_position)? != Ordering::Less)
    }
}

impl fmt::Display for ChangeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.capture_instance, self.schema.name)
    }
}

/// Metadata of one column of a change stream result, marker columns included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultColumn {
    pub name: String,
    pub typ: ColumnType,
}

impl ResultColumn {
    pub fn new(name: impl Into<String>, typ: ColumnType) -> Self {
        Self {
            name: name.into(),
            typ,
        }
    }
}
