use std::future::Future;

use crate::error::CdcResult;
use crate::types::ChangeEvent;

/// Receives the events produced by polling cycles.
///
/// Events arrive in position order, in batches bounded by the configured batch size. A batch may
/// be delivered again after a failed cycle, so implementations must tolerate duplicates.
pub trait EventSink {
    /// Name of the sink, used in logs.
    fn name() -> &'static str;

    /// Flushes and releases resources held by the sink.
    fn shutdown(&self) -> impl Future<Output = CdcResult<()>> + Send {
        async { Ok(()) }
    }

    /// Writes a batch of events.
    fn write_events(&self, events: Vec<ChangeEvent>) -> impl Future<Output = CdcResult<()>> + Send;
}
