use std::sync::Arc;
use std::time::Duration;

use cdc::cdc_error;
use cdc::concurrency::shutdown::create_shutdown_channel;
use cdc::error::ErrorKind;
use cdc::replication::cycle::PollCycle;
use cdc::replication::dialect::SourceDialect;
use cdc::replication::poller::{ChangeCapturePoller, start_position};
use cdc::schema::SchemaCache;
use cdc::test_utils::MemoryEventSink;
use cdc::test_utils::event::row_positions;
use cdc::test_utils::schema::{change_table, log_position, position, table_schema};
use cdc::test_utils::source::MemoryChangeSource;
use cdc::types::{Cell, ChangeTable, ColumnType, TransactionLogPosition};
use cdc_config::shared::{BatchConfig, CaptureConfig};
use cdc_telemetry::tracing::init_test_tracing;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

async fn orders(source: &MemoryChangeSource) -> Arc<ChangeTable> {
    let schema = table_schema(1, "orders", &[("id", ColumnType::Int32)]);
    let table = Arc::new(change_table("dbo_orders", schema, &["id"]));
    source.register_table(&table).await;
    table
}

async fn wait_for_rows(sink: &MemoryEventSink, count: usize) {
    for _ in 0..1_000 {
        if row_positions(&sink.events().await).len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    panic!("sink did not receive {count} rows");
}

#[tokio::test(start_paused = true)]
async fn poller_delivers_changes_until_shutdown() {
    init_test_tracing();
    let source = MemoryChangeSource::new();
    let table = orders(&source).await;
    let sink = MemoryEventSink::new();
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let cycle = PollCycle::new(
        source.clone(),
        sink.clone(),
        SourceDialect::default(),
        100,
        SchemaCache::new(),
    );
    let poller = ChangeCapturePoller::new(cycle, vec![table], POLL_INTERVAL, shutdown_rx);
    let handle = tokio::spawn(poller.run(TransactionLogPosition::NULL));

    source
        .push_change("dbo_orders", position(1, 1), 2, vec![Cell::I32(1)])
        .await;
    wait_for_rows(&sink, 1).await;

    source
        .push_change("dbo_orders", position(2, 1), 4, vec![Cell::I32(1)])
        .await;
    wait_for_rows(&sink, 2).await;

    shutdown_tx.shutdown();
    let progress = handle.await.unwrap().unwrap();

    assert_eq!(
        row_positions(&sink.events().await),
        vec![position(1, 1), position(2, 1)]
    );
    assert_eq!(progress.low, position(2, 1));
    assert_eq!(progress.high_water_mark, log_position(2));
    assert!(progress.cycles >= 2);
}

#[tokio::test(start_paused = true)]
async fn poller_follows_heartbeats_while_idle() {
    init_test_tracing();
    let source = MemoryChangeSource::new();
    let table = orders(&source).await;
    source.record_heartbeat(log_position(7)).await;
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let cycle = PollCycle::new(
        source.clone(),
        MemoryEventSink::new(),
        SourceDialect::default(),
        100,
        SchemaCache::new(),
    );
    let poller = ChangeCapturePoller::new(cycle, vec![table], POLL_INTERVAL, shutdown_rx);
    let handle = tokio::spawn(poller.run(TransactionLogPosition::NULL));

    tokio::time::sleep(POLL_INTERVAL * 5).await;
    shutdown_tx.shutdown();
    let progress = handle.await.unwrap().unwrap();

    assert_eq!(
        progress.low,
        TransactionLogPosition::at_commit(log_position(7))
    );
    assert_eq!(progress.high_water_mark, log_position(7));
    assert!(progress.cycles >= 1);
    assert!(source.opened_streams().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn poller_stops_on_cycle_error() {
    init_test_tracing();
    let source = MemoryChangeSource::new();
    let table = orders(&source).await;
    source
        .fail_probe_with(cdc_error!(ErrorKind::SourceIoError, "Connection refused"))
        .await;
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let cycle = PollCycle::new(
        source,
        MemoryEventSink::new(),
        SourceDialect::default(),
        100,
        SchemaCache::new(),
    );
    let poller = ChangeCapturePoller::new(cycle, vec![table], POLL_INTERVAL, shutdown_rx);

    let err = poller
        .run(TransactionLogPosition::NULL)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceIoError);
}

#[tokio::test(start_paused = true)]
async fn poller_built_from_config_resumes_after_start_position() {
    init_test_tracing();
    let source = MemoryChangeSource::new();
    let table = orders(&source).await;
    for (commit, row) in [(1, 1), (1, 2), (2, 1)] {
        source
            .push_change("dbo_orders", position(commit, row), 2, vec![Cell::I32(1)])
            .await;
    }

    let config = CaptureConfig {
        tables: vec!["dbo_orders".to_string()],
        start_position: Some(
            "0x00000000000000000001:0x00000000000000000001".to_string(),
        ),
        poll_interval_ms: 10,
        batch: BatchConfig { max_size: 2 },
        ..Default::default()
    };
    let sink = MemoryEventSink::new();
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let schema_cache = SchemaCache::new();
    schema_cache.add_change_table(table.as_ref().clone()).await;

    let poller =
        ChangeCapturePoller::from_config(&config, source, sink.clone(), schema_cache, shutdown_rx)
            .await
            .unwrap();
    let handle = tokio::spawn(poller.run(start_position(&config).unwrap()));

    wait_for_rows(&sink, 2).await;
    shutdown_tx.shutdown();
    let progress = handle.await.unwrap().unwrap();

    assert_eq!(
        row_positions(&sink.events().await),
        vec![position(1, 2), position(2, 1)]
    );
    assert_eq!(progress.low, position(2, 1));
}

#[tokio::test]
async fn poller_from_config_rejects_unregistered_capture_instances() {
    init_test_tracing();
    let source = MemoryChangeSource::new();
    let table = orders(&source).await;
    let schema_cache = SchemaCache::new();
    schema_cache.add_change_table(table.as_ref().clone()).await;

    let config = CaptureConfig {
        tables: vec!["dbo_orders".to_string(), "dbo_invoices".to_string()],
        ..Default::default()
    };
    let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let err = ChangeCapturePoller::from_config(
        &config,
        source,
        MemoryEventSink::new(),
        schema_cache,
        shutdown_rx,
    )
    .await
    .err()
    .unwrap();
    assert_eq!(err.kind(), ErrorKind::UnknownCaptureInstance);
}

#[test]
fn start_position_narrower_than_the_source_is_rejected() {
    let config = CaptureConfig {
        start_position: Some("0x0001:0x0002".to_string()),
        ..Default::default()
    };
    assert_eq!(
        start_position(&config).unwrap_err().kind(),
        ErrorKind::InvalidPosition
    );
}
