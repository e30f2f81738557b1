use std::sync::Arc;

use crate::types::{
    ChangeTable, ColumnSchema, ColumnType, LogPosition, ResultColumn, TableId, TableName,
    TableSchema, TransactionLogPosition,
};

/// Names of the marker columns of the default change stream layout.
pub const MARKER_COLUMNS: [(&str, ColumnType); 4] = [
    ("__$start_lsn", ColumnType::Binary),
    ("__$seqval", ColumnType::Binary),
    ("__$operation", ColumnType::Int32),
    ("__$update_mask", ColumnType::Binary),
];

/// Ten-byte position whose last eight bytes hold `value` big-endian.
pub fn log_position(value: u64) -> LogPosition {
    let mut bytes = vec![0u8; 2];
    bytes.extend_from_slice(&value.to_be_bytes());
    LogPosition::new(bytes)
}

pub fn position(commit: u64, row: u64) -> TransactionLogPosition {
    TransactionLogPosition::new(log_position(commit), log_position(row))
}

/// Builds a `dbo` table schema. The first column is the primary key.
pub fn table_schema(id: u32, name: &str, columns: &[(&str, ColumnType)]) -> Arc<TableSchema> {
    let column_schemas = columns
        .iter()
        .enumerate()
        .map(|(i, (column, typ))| ColumnSchema::new(*column, *typ, i != 0, i == 0))
        .collect();

    Arc::new(TableSchema::new(
        TableId::new(id),
        TableName::new("dbo", name),
        column_schemas,
    ))
}

pub fn change_table(
    capture_instance: &str,
    schema: Arc<TableSchema>,
    captured: &[&str],
) -> ChangeTable {
    ChangeTable::new(
        capture_instance,
        schema,
        captured.iter().map(|c| c.to_string()).collect(),
    )
}

/// Result metadata in the default layout: the marker columns followed by `payload`.
pub fn result_columns(payload: &[(&str, ColumnType)]) -> Vec<ResultColumn> {
    MARKER_COLUMNS
        .iter()
        .copied()
        .chain(payload.iter().copied())
        .map(|(name, typ)| ResultColumn::new(name, typ))
        .collect()
}
