use std::sync::Arc;

use cdc::error::ErrorKind;
use cdc::failpoints::POLL_CYCLE__AFTER_PROBE;
use cdc::replication::cycle::PollCycle;
use cdc::replication::dialect::SourceDialect;
use cdc::schema::SchemaCache;
use cdc::test_utils::MemoryEventSink;
use cdc::test_utils::event::row_positions;
use cdc::test_utils::failpoints::ConfiguredFailPoints;
use cdc::test_utils::schema::{change_table, position, table_schema};
use cdc::test_utils::source::MemoryChangeSource;
use cdc::types::{Cell, ChangeTable, ColumnType, TransactionLogPosition};
use cdc_telemetry::tracing::init_test_tracing;

async fn source_with_changes() -> (MemoryChangeSource, Arc<ChangeTable>) {
    let schema = table_schema(1, "orders", &[("id", ColumnType::Int32)]);
    let table = Arc::new(change_table("dbo_orders", schema, &["id"]));

    let source = MemoryChangeSource::new();
    source.register_table(&table).await;
    source
        .push_change("dbo_orders", position(1, 1), 2, vec![Cell::I32(1)])
        .await;

    (source, table)
}

fn cycle(source: &MemoryChangeSource) -> PollCycle<MemoryChangeSource, MemoryEventSink> {
    PollCycle::new(
        source.clone(),
        MemoryEventSink::new(),
        SourceDialect::default(),
        100,
        SchemaCache::new(),
    )
}

#[tokio::test]
async fn failure_after_probe_opens_no_stream() {
    init_test_tracing();
    let _fail_points =
        ConfiguredFailPoints::setup(&[(POLL_CYCLE__AFTER_PROBE, "return(source_io)")]);

    let (source, table) = source_with_changes().await;
    let cycle = cycle(&source);

    let err = cycle
        .run(&[table], TransactionLogPosition::NULL)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceIoError);
    assert!(source.opened_streams().await.is_empty());
    assert!(cycle.sink().events().await.is_empty());
}

#[tokio::test]
async fn cycle_recovers_once_the_failure_clears() {
    init_test_tracing();
    let (source, table) = source_with_changes().await;
    let cycle = cycle(&source);

    {
        let _fail_points = ConfiguredFailPoints::setup(&[(POLL_CYCLE__AFTER_PROBE, "1*return")]);

        let err = cycle
            .run(&[table.clone()], TransactionLogPosition::NULL)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let outcome = cycle
            .run(&[table.clone()], TransactionLogPosition::NULL)
            .await
            .unwrap();
        assert_eq!(outcome.next_low, position(1, 1));
    }

    assert_eq!(
        row_positions(&cycle.sink().events().await),
        vec![position(1, 1)]
    );
}
