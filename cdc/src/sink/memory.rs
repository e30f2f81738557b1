use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::{CdcError, CdcResult};
use crate::sink::EventSink;
use crate::types::ChangeEvent;

#[derive(Debug, Default)]
struct Inner {
    events: Vec<ChangeEvent>,
    batch_sizes: Vec<usize>,
    write_failure: Option<CdcError>,
}

/// Event sink keeping everything in memory, for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSink {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every event written so far.
    pub async fn events(&self) -> Vec<ChangeEvent> {
        self.inner.lock().await.events.clone()
    }

    /// Returns the size of every batch written so far, in write order.
    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.inner.lock().await.batch_sizes.clone()
    }

    /// Makes every following write fail with `error`.
    pub async fn fail_writes_with(&self, error: CdcError) {
        self.inner.lock().await.write_failure = Some(error);
    }

    /// Drops stored events and any configured failure.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.events.clear();
        inner.batch_sizes.clear();
        inner.write_failure = None;
    }
}

impl EventSink for MemoryEventSink {
    fn name() -> &'static str {
        "memory"
    }

    async fn write_events(&self, events: Vec<ChangeEvent>) -> CdcResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(error) = &inner.write_failure {
            return Err(error.clone());
        }

        debug!("writing a batch of {} events", events.len());
        for event in &events {
            trace!("  {:?}", event);
        }

        inner.batch_sizes.push(events.len());
        inner.events.extend(events);

        Ok(())
    }
}
