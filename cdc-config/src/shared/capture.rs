use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::{BatchConfig, ChangeSourceConfig, ValidationError};

/// Top-level configuration of a change-capture poller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CaptureConfig {
    /// Capture instances to poll. Empty means every capture instance the source knows about.
    #[serde(default)]
    pub tables: Vec<String>,
    /// Position to resume after, as hex. Either a commit position (`0x0000002A000001F00003`) or a
    /// `commit:row` pair. Absent means the beginning of the retained change data.
    #[serde(default)]
    pub start_position: Option<String>,
    /// Pause between two polling cycles in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Batching of events written to the sink.
    #[serde(default)]
    pub batch: BatchConfig,
    /// Layout of the change stream rows.
    #[serde(default)]
    pub source: ChangeSourceConfig,
}

impl CaptureConfig {
    /// Default pause between polling cycles.
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

    /// Validates the whole configuration tree.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "poll_interval_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        self.batch.validate()?;
        self.source.validate()
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            start_position: None,
            poll_interval_ms: default_poll_interval_ms(),
            batch: BatchConfig::default(),
            source: ChangeSourceConfig::default(),
        }
    }
}

impl Config for CaptureConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["tables"];
}

fn default_poll_interval_ms() -> u64 {
    CaptureConfig::DEFAULT_POLL_INTERVAL_MS
}
