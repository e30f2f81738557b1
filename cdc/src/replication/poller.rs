use std::sync::Arc;
use std::time::Duration;

use cdc_config::shared::CaptureConfig;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::concurrency::shutdown::ShutdownRx;
use crate::conversions::hex::{parse_position_hex, parse_transaction_position_hex};
use crate::error::CdcResult;
use crate::replication::cycle::PollCycle;
use crate::replication::dialect::SourceDialect;
use crate::replication::source::{ChangeStreamSource, PositionProbeSource};
use crate::schema::SchemaCache;
use crate::sink::EventSink;
use crate::types::{ChangeTable, LogPosition, TransactionLogPosition};

/// Progress of a [`ChangeCapturePoller`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerProgress {
    /// Watermark after the last completed cycle.
    pub low: TransactionLogPosition,
    /// Highest position observed so far. Never decreases.
    pub high_water_mark: LogPosition,
    /// Completed cycles.
    pub cycles: u64,
}

/// Runs polling cycles on a fixed interval until shutdown is requested.
pub struct ChangeCapturePoller<S, K> {
    cycle: PollCycle<S, K>,
    tables: Vec<Arc<ChangeTable>>,
    poll_interval: Duration,
    shutdown_rx: ShutdownRx,
}

impl<S, K> ChangeCapturePoller<S, K>
where
    S: PositionProbeSource + ChangeStreamSource,
    K: EventSink,
{
    pub fn new(
        cycle: PollCycle<S, K>,
        tables: Vec<Arc<ChangeTable>>,
        poll_interval: Duration,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            cycle,
            tables,
            poll_interval,
            shutdown_rx,
        }
    }

    /// Validates `config` and builds a poller over the capture instances it names.
    ///
    /// Capture instances are looked up in `schema_cache`. An empty `tables` list polls every
    /// registered capture instance.
    pub async fn from_config(
        config: &CaptureConfig,
        source: S,
        sink: K,
        schema_cache: SchemaCache,
        shutdown_rx: ShutdownRx,
    ) -> CdcResult<Self> {
        let cycle = PollCycle::from_config(config, source, sink, schema_cache)?;
        let tables = cycle
            .schema_cache()
            .resolve_change_tables(&config.tables)
            .await?;

        Ok(Self::new(cycle, tables, poll_interval(config), shutdown_rx))
    }

    /// Polls until shutdown, starting after `start`.
    ///
    /// A failing cycle stops the poller and returns its error. Retrying is up to the caller,
    /// which resumes from the last progress it persisted.
    pub async fn run(mut self, start: TransactionLogPosition) -> CdcResult<PollerProgress> {
        let mut progress = PollerProgress {
            high_water_mark: start.commit.clone(),
            low: start,
            cycles: 0,
        };

        info!(
            tables = self.tables.len(),
            sink = K::name(),
            start = %progress.low,
            "starting change capture poller"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_rx.changed() => {
                    info!(
                        low = %progress.low,
                        cycles = progress.cycles,
                        "shutting down change capture poller"
                    );
                    break;
                }
                _ = interval.tick() => {}
            }

            let outcome = self.cycle.run(&self.tables, progress.low.clone()).await?;

            progress.low = outcome.next_low;
            progress.high_water_mark = progress.high_water_mark.try_max(outcome.high_water_mark)?;
            progress.cycles += 1;

            debug!(
                cycle = progress.cycles,
                skipped = outcome.skipped,
                low = %progress.low,
                high_water_mark = %progress.high_water_mark,
                "polling cycle completed"
            );
        }

        self.cycle.sink().shutdown().await?;

        Ok(progress)
    }
}

/// Resolves the configured starting watermark.
///
/// `commit:row` resumes strictly after that row. A single position resumes at the start of that
/// commit, so its rows are delivered. No value starts from the beginning of the retained changes.
/// Both parts must have the width configured for the source.
pub fn start_position(config: &CaptureConfig) -> CdcResult<TransactionLogPosition> {
    let TransactionLogPosition { commit, row } = match config.start_position.as_deref() {
        None => return Ok(TransactionLogPosition::NULL),
        Some(value) if value.contains(':') => parse_transaction_position_hex(value)?,
        Some(value) => TransactionLogPosition::at_commit(parse_position_hex(value)?),
    };

    let dialect = SourceDialect::from(&config.source);
    Ok(TransactionLogPosition::new(
        dialect.decode_position(commit.into_bytes())?,
        dialect.decode_position(row.into_bytes())?,
    ))
}

/// Poll interval configured in `config`.
pub fn poll_interval(config: &CaptureConfig) -> Duration {
    Duration::from_millis(config.poll_interval_ms)
}
