use crate::types::{ChangeEvent, EventType, TableId, TableRow, TransactionLogPosition};

pub fn event_types(events: &[ChangeEvent]) -> Vec<EventType> {
    events.iter().map(ChangeEvent::event_type).collect()
}

/// Positions of the row events, in delivery order.
pub fn row_positions(events: &[ChangeEvent]) -> Vec<TransactionLogPosition> {
    events
        .iter()
        .filter_map(|event| match event {
            ChangeEvent::Row(row) => Some(row.position.clone()),
            ChangeEvent::Begin(_) | ChangeEvent::Commit(_) => None,
        })
        .collect()
}

/// Rows delivered for `table_id`, in delivery order.
pub fn table_rows(events: &[ChangeEvent], table_id: TableId) -> Vec<TableRow> {
    events
        .iter()
        .filter_map(|event| match event {
            ChangeEvent::Row(row) if row.table_id == table_id => Some(row.table_row.clone()),
            _ => None,
        })
        .collect()
}
