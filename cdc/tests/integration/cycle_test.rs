use std::sync::Arc;

use cdc::cdc_error;
use cdc::error::ErrorKind;
use cdc::replication::cycle::PollCycle;
use cdc::replication::dialect::SourceDialect;
use cdc::schema::SchemaCache;
use cdc::test_utils::MemoryEventSink;
use cdc::test_utils::event::{event_types, row_positions, table_rows};
use cdc::test_utils::schema::{change_table, log_position, position, table_schema};
use cdc::test_utils::source::MemoryChangeSource;
use cdc::types::{
    Cell, ChangeEvent, ChangeTable, ColumnType, EventType, LogPosition, TableId, TableRow,
    TransactionLogPosition,
};
use cdc_telemetry::tracing::init_test_tracing;

struct Fixture {
    source: MemoryChangeSource,
    orders: Arc<ChangeTable>,
    customers: Arc<ChangeTable>,
}

async fn fixture() -> Fixture {
    let orders = Arc::new(change_table(
        "dbo_orders",
        table_schema(
            1,
            "orders",
            &[("id", ColumnType::Int32), ("amount", ColumnType::Numeric)],
        ),
        &["id", "amount"],
    ));
    let customers = Arc::new(change_table(
        "dbo_customers",
        table_schema(
            2,
            "customers",
            &[("id", ColumnType::Int32), ("name", ColumnType::Text)],
        ),
        &["id", "name"],
    ));

    let source = MemoryChangeSource::new();
    source.register_table(&orders).await;
    source.register_table(&customers).await;

    Fixture {
        source,
        orders,
        customers,
    }
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
async fn changes_from_several_tables_are_delivered_in_log_order() {
    init_test_tracing();
    let Fixture {
        source,
        orders,
        customers,
    } = fixture().await;

    source
        .push_change("dbo_orders", position(1, 1), 2, vec![Cell::I32(10), Cell::Null])
        .await;
    source
        .push_change("dbo_customers", position(1, 2), 2, vec![Cell::I32(7), Cell::from("Ada")])
        .await;
    source
        .push_change("dbo_orders", position(2, 1), 4, vec![Cell::I32(10), Cell::Null])
        .await;
    source
        .push_change("dbo_customers", position(3, 1), 1, vec![Cell::I32(7), Cell::Null])
        .await;

    let cycle = cycle(&source);
    let outcome = cycle
        .run(&[orders, customers], TransactionLogPosition::NULL)
        .await
        .unwrap();

    let events = cycle.sink().events().await;
    assert_eq!(
        row_positions(&events),
        vec![position(1, 1), position(1, 2), position(2, 1), position(3, 1)]
    );
    assert_eq!(
        event_types(&events),
        vec![
            EventType::Begin,
            EventType::Row,
            EventType::Row,
            EventType::Commit,
            EventType::Begin,
            EventType::Row,
            EventType::Commit,
            EventType::Begin,
            EventType::Row,
            EventType::Commit,
        ]
    );

    let ChangeEvent::Row(first) = &events[1] else {
        panic!("expected a row event, got {:?}", events[1]);
    };
    assert_eq!(first.capture_instance, "dbo_orders");
    assert_eq!(first.operation, 2);

    assert_eq!(outcome.rows, 4);
    assert_eq!(outcome.transactions, 3);
    assert_eq!(outcome.next_low, position(3, 1));
    assert_eq!(outcome.high_water_mark, log_position(3));
}

#[tokio::test]
async fn following_cycle_only_reads_newer_changes() {
    init_test_tracing();
    let Fixture {
        source,
        orders,
        customers,
    } = fixture().await;
    let tables = [orders, customers];

    source
        .push_change("dbo_orders", position(1, 1), 2, vec![Cell::I32(1), Cell::Null])
        .await;

    let cycle = cycle(&source);
    let first = cycle
        .run(&tables, TransactionLogPosition::NULL)
        .await
        .unwrap();
    assert_eq!(first.rows, 1);

    let idle = cycle.run(&tables, first.next_low.clone()).await.unwrap();
    assert!(idle.skipped);
    assert_eq!(idle.next_low, first.next_low);

    source
        .push_change("dbo_customers", position(2, 1), 2, vec![Cell::I32(5), Cell::Null])
        .await;
    let second = cycle.run(&tables, idle.next_low.clone()).await.unwrap();

    assert_eq!(second.rows, 1);
    assert_eq!(
        row_positions(&cycle.sink().events().await),
        vec![position(1, 1), position(2, 1)]
    );

    let opened = source.opened_streams().await;
    assert_eq!(opened.len(), 4);
    assert_eq!(opened[2].1.low, position(1, 1));
    assert_eq!(opened[2].1.high, log_position(2));
}

#[tokio::test]
async fn heartbeats_advance_the_watermark_without_scanning() {
    init_test_tracing();
    let Fixture { source, orders, .. } = fixture().await;

    source
        .push_change("dbo_orders", position(1, 1), 2, vec![Cell::I32(1), Cell::Null])
        .await;
    source.record_heartbeat(log_position(9)).await;

    let cycle = cycle(&source);
    let outcome = cycle.run(&[orders], position(1, 1)).await.unwrap();

    assert!(outcome.skipped);
    assert_eq!(outcome.next_low, TransactionLogPosition::at_commit(log_position(9)));
    assert!(source.opened_streams().await.is_empty());
}

#[tokio::test]
async fn high_water_mark_does_not_go_below_the_watermark() {
    init_test_tracing();
    let Fixture { source, orders, .. } = fixture().await;
    source
        .set_max_positions(log_position(3), log_position(3))
        .await;

    let cycle = cycle(&source);
    let outcome = cycle.run(&[orders], position(5, 1)).await.unwrap();

    assert!(outcome.skipped);
    assert_eq!(outcome.high_water_mark, log_position(5));
    assert_eq!(outcome.next_low, position(5, 1));
}

#[tokio::test]
async fn invalid_probe_aborts_the_cycle() {
    init_test_tracing();
    let Fixture { source, orders, .. } = fixture().await;
    source
        .set_max_positions(log_position(3), log_position(4))
        .await;

    let err = cycle(&source)
        .run(&[orders], TransactionLogPosition::NULL)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidProbe);
}

#[tokio::test]
async fn probe_failures_are_propagated() {
    init_test_tracing();
    let Fixture { source, orders, .. } = fixture().await;
    source
        .fail_probe_with(cdc_error!(ErrorKind::SourceQueryFailed, "Probe query failed"))
        .await;

    let err = cycle(&source)
        .run(&[orders], TransactionLogPosition::NULL)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceQueryFailed);
}

#[tokio::test]
async fn failed_cycle_is_redelivered_from_the_old_watermark() {
    init_test_tracing();
    let Fixture { source, orders, .. } = fixture().await;
    for row in 1..=3 {
        source
            .push_change("dbo_orders", position(1, row), 2, vec![Cell::I32(row as i32), Cell::Null])
            .await;
    }
    source
        .fail_stream_after(
            "dbo_orders",
            2,
            cdc_error!(ErrorKind::SourceIoError, "Connection reset"),
        )
        .await;

    let cycle = PollCycle::new(
        source.clone(),
        MemoryEventSink::new(),
        SourceDialect::default(),
        2,
        SchemaCache::new(),
    );
    let tables = [orders];

    let err = cycle
        .run(&tables, TransactionLogPosition::NULL)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceIoError);
    assert_eq!(
        row_positions(&cycle.sink().events().await),
        vec![position(1, 1)]
    );

    source.clear_failures().await;
    let outcome = cycle
        .run(&tables, TransactionLogPosition::NULL)
        .await
        .unwrap();

    assert_eq!(outcome.rows, 3);
    assert_eq!(
        row_positions(&cycle.sink().events().await),
        vec![position(1, 1), position(1, 1), position(1, 2), position(1, 3)]
    );
}

#[tokio::test]
async fn sink_failures_abort_the_cycle() {
    init_test_tracing();
    let Fixture { source, orders, .. } = fixture().await;
    source
        .push_change("dbo_orders", position(1, 1), 2, vec![Cell::I32(1), Cell::Null])
        .await;

    let cycle = cycle(&source);
    cycle
        .sink()
        .fail_writes_with(cdc_error!(ErrorKind::SinkError, "Destination unavailable"))
        .await;

    let err = cycle
        .run(&[orders], TransactionLogPosition::NULL)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SinkError);
}

#[tokio::test]
async fn capture_instances_hand_over_at_their_stop_position() {
    init_test_tracing();
    let schema = table_schema(
        1,
        "orders",
        &[("id", ColumnType::Int32), ("status", ColumnType::Text)],
    );
    let v1 = Arc::new(
        change_table("dbo_orders_v1", schema.clone(), &["id"])
            .with_window(LogPosition::NONE, log_position(3)),
    );
    let v2 = Arc::new(
        change_table("dbo_orders_v2", schema, &["id", "status"])
            .with_window(log_position(3), LogPosition::NONE),
    );

    let source = MemoryChangeSource::new();
    source.register_table(&v1).await;
    source.register_table(&v2).await;
    source
        .push_change("dbo_orders_v1", position(2, 1), 2, vec![Cell::I32(1)])
        .await;
    source
        .push_change("dbo_orders_v1", position(3, 1), 2, vec![Cell::I32(2)])
        .await;
    source
        .push_change("dbo_orders_v2", position(3, 1), 2, vec![Cell::I32(2), Cell::from("new")])
        .await;

    let cycle = cycle(&source);
    let outcome = cycle
        .run(&[v1, v2], TransactionLogPosition::NULL)
        .await
        .unwrap();

    assert_eq!(outcome.rows, 2);
    assert_eq!(outcome.superseded, 1);
    assert_eq!(
        table_rows(&cycle.sink().events().await, TableId::new(1)),
        vec![
            TableRow::new(vec![Cell::I32(1), Cell::Null]),
            TableRow::new(vec![Cell::I32(2), Cell::from("new")]),
        ]
    );
}

#[tokio::test]
async fn streams_failing_to_open_are_all_reported() {
    init_test_tracing();
    let Fixture { source, orders, .. } = fixture().await;
    source
        .push_change("dbo_orders", position(1, 1), 2, vec![Cell::I32(1), Cell::Null])
        .await;

    let schema = table_schema(9, "audit", &[("id", ColumnType::Int32)]);
    let audit_v1 = Arc::new(change_table("dbo_audit_v1", schema.clone(), &["id"]));
    let audit_v2 = Arc::new(change_table("dbo_audit_v2", schema, &["id"]));

    let cycle = cycle(&source);
    let err = cycle
        .run(&[audit_v1, orders, audit_v2], TransactionLogPosition::NULL)
        .await
        .unwrap_err();

    assert_eq!(
        err.kinds(),
        vec![ErrorKind::SourceQueryFailed, ErrorKind::SourceQueryFailed]
    );
    assert!(cycle.sink().events().await.is_empty());
}
