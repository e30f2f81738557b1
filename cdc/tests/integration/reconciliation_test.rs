use std::sync::Arc;

use cdc::error::{CdcResult, ErrorKind};
use cdc::replication::cycle::PollCycle;
use cdc::replication::dialect::SourceDialect;
use cdc::schema::SchemaCache;
use cdc::test_utils::MemoryEventSink;
use cdc::test_utils::event::table_rows;
use cdc::test_utils::schema::{change_table, position, table_schema};
use cdc::test_utils::source::MemoryChangeSource;
use cdc::types::{
    Cell, ChangeTable, ColumnType, TableId, TableRow, TableSchema, TransactionLogPosition,
};
use cdc_config::shared::UnknownColumnPolicy;
use cdc_telemetry::tracing::init_test_tracing;
use chrono::NaiveTime;

fn customers() -> Arc<TableSchema> {
    table_schema(
        3,
        "customers",
        &[
            ("id", ColumnType::Int32),
            ("name", ColumnType::Text),
            ("email", ColumnType::Text),
            ("opens_at", ColumnType::Time),
        ],
    )
}

async fn run_cycle(
    source: &MemoryChangeSource,
    dialect: SourceDialect,
    table: Arc<ChangeTable>,
) -> (CdcResult<()>, Vec<TableRow>) {
    let cycle = PollCycle::new(
        source.clone(),
        MemoryEventSink::new(),
        dialect,
        100,
        SchemaCache::new(),
    );
    let result = cycle
        .run(&[table], TransactionLogPosition::NULL)
        .await
        .map(|_| ());
    let rows = table_rows(&cycle.sink().events().await, TableId::new(3));

    (result, rows)
}

#[tokio::test]
async fn narrowed_capture_instance_is_widened_to_the_table_schema() {
    init_test_tracing();
    let table = Arc::new(change_table("dbo_customers", customers(), &["email", "id"]));
    let source = MemoryChangeSource::new();
    source.register_table(&table).await;
    source
        .push_change(
            "dbo_customers",
            position(1, 1),
            2,
            vec![Cell::from("ada@example.com"), Cell::I32(1)],
        )
        .await;

    let (result, rows) = run_cycle(&source, SourceDialect::default(), table).await;

    result.unwrap();
    assert_eq!(
        rows,
        vec![TableRow::new(vec![
            Cell::I32(1),
            Cell::Null,
            Cell::from("ada@example.com"),
            Cell::Null,
        ])]
    );
}

#[tokio::test]
async fn unknown_captured_column_fails_the_cycle() {
    init_test_tracing();
    let table = Arc::new(change_table("dbo_customers", customers(), &["id", "legacy"]));
    let source = MemoryChangeSource::new();
    source.register_table(&table).await;
    source
        .push_change(
            "dbo_customers",
            position(1, 1),
            2,
            vec![Cell::I32(1), Cell::from("old")],
        )
        .await;

    let (result, rows) = run_cycle(&source, SourceDialect::default(), table).await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::UnknownCapturedColumn);
    assert!(rows.is_empty());
}

#[tokio::test]
async fn unknown_captured_column_can_be_discarded() {
    init_test_tracing();
    let table = Arc::new(change_table("dbo_customers", customers(), &["id", "legacy"]));
    let source = MemoryChangeSource::new();
    source.register_table(&table).await;
    source
        .push_change(
            "dbo_customers",
            position(1, 1),
            2,
            vec![Cell::I32(1), Cell::from("old")],
        )
        .await;

    let dialect = SourceDialect {
        unknown_column_policy: UnknownColumnPolicy::Discard,
        ..SourceDialect::default()
    };
    let (result, rows) = run_cycle(&source, dialect, table).await;

    result.unwrap();
    assert_eq!(
        rows,
        vec![TableRow::new(vec![
            Cell::I32(1),
            Cell::Null,
            Cell::Null,
            Cell::Null,
        ])]
    );
}

#[tokio::test]
async fn duplicate_captured_column_fails_the_cycle() {
    init_test_tracing();
    let table = Arc::new(change_table("dbo_customers", customers(), &["id"]));
    let source = MemoryChangeSource::new();
    source.register_table(&table).await;
    source
        .set_stream_columns(
            "dbo_customers",
            &[("id", ColumnType::Int32), ("id", ColumnType::Int32)],
        )
        .await;
    source
        .push_change(
            "dbo_customers",
            position(1, 1),
            2,
            vec![Cell::I32(1), Cell::I32(1)],
        )
        .await;

    let (result, _) = run_cycle(&source, SourceDialect::default(), table).await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::DuplicateCapturedColumn);
}

#[tokio::test]
async fn time_of_day_keeps_sub_second_precision_through_typed_accessor() {
    init_test_tracing();
    let opens_at = NaiveTime::from_hms_nano_opt(9, 30, 15, 123_456_700).unwrap();
    let table = Arc::new(change_table(
        "dbo_customers",
        customers(),
        &["id", "name", "email", "opens_at"],
    ));
    let source = MemoryChangeSource::new();
    source.register_table(&table).await;
    source
        .push_change(
            "dbo_customers",
            position(1, 1),
            2,
            vec![Cell::I32(1), Cell::Null, Cell::Null, Cell::Time(opens_at)],
        )
        .await;

    let (result, rows) = run_cycle(&source, SourceDialect::default(), table.clone()).await;
    result.unwrap();
    assert_eq!(rows[0].values()[3], Cell::Time(opens_at));

    let generic = SourceDialect {
        typed_time_accessor: false,
        ..SourceDialect::default()
    };
    let (result, rows) = run_cycle(&source, generic, table).await;
    result.unwrap();
    assert_eq!(
        rows[0].values()[3],
        Cell::Time(NaiveTime::from_hms_opt(9, 30, 15).unwrap())
    );
}

#[tokio::test]
async fn shared_schema_cache_keeps_reconcilers_per_source_layout() {
    init_test_tracing();
    let opens_at = NaiveTime::from_hms_milli_opt(8, 0, 0, 123).unwrap();
    let table = Arc::new(change_table(
        "dbo_customers",
        customers(),
        &["id", "name", "email", "opens_at"],
    ));
    let source = MemoryChangeSource::new();
    source.register_table(&table).await;
    source
        .push_change(
            "dbo_customers",
            position(1, 1),
            2,
            vec![Cell::I32(1), Cell::Null, Cell::Null, Cell::Time(opens_at)],
        )
        .await;

    let schema_cache = SchemaCache::new();
    let typed = PollCycle::new(
        source.clone(),
        MemoryEventSink::new(),
        SourceDialect::default(),
        100,
        schema_cache.clone(),
    );
    typed
        .run(&[table.clone()], TransactionLogPosition::NULL)
        .await
        .unwrap();

    let generic = PollCycle::new(
        source,
        MemoryEventSink::new(),
        SourceDialect {
            typed_time_accessor: false,
            ..SourceDialect::default()
        },
        100,
        schema_cache.clone(),
    );
    generic
        .run(&[table], TransactionLogPosition::NULL)
        .await
        .unwrap();

    let typed_rows = table_rows(&typed.sink().events().await, TableId::new(3));
    let generic_rows = table_rows(&generic.sink().events().await, TableId::new(3));
    assert_eq!(typed_rows[0].values()[3], Cell::Time(opens_at));
    assert_eq!(
        generic_rows[0].values()[3],
        Cell::Time(NaiveTime::from_hms_opt(8, 0, 0).unwrap())
    );
    assert_eq!(schema_cache.reconciler_count().await, 2);
}
