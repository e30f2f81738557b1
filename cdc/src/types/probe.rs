use std::cmp::Ordering;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};
use crate::types::{LogPosition, PositionRange, TransactionLogPosition};

/// Highest positions recorded by the source at the start of a polling cycle.
///
/// `max_position` may include heartbeat markers written while no transaction ran, so it is never
/// below `max_transactional_position`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxPositionProbe {
    max_position: LogPosition,
    max_transactional_position: LogPosition,
}

/// Outcome of evaluating a [`MaxPositionProbe`] against the last delivered position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeDecision {
    /// Nothing transactional happened since `low`. The high-water mark still moves to the probe's
    /// maximum position.
    Skip { high_water_mark: LogPosition },
    /// Transactional changes exist in `range`.
    Scan { range: PositionRange },
}

impl MaxPositionProbe {
    /// Builds a probe, rejecting a transactional maximum above the overall maximum.
    pub fn new(
        max_position: LogPosition,
        max_transactional_position: LogPosition,
    ) -> CdcResult<Self> {
        if max_transactional_position.try_cmp(&max_position)? == Ordering::Greater {
            bail!(
                ErrorKind::InvalidProbe,
                "Transactional maximum position exceeds the overall maximum position",
                format!(
                    "max position {max_position}, max transactional position {max_transactional_position}"
                )
            );
        }

        Ok(Self {
            max_position,
            max_transactional_position,
        })
    }

    pub fn max_position(&self) -> &LogPosition {
        &self.max_position
    }

    pub fn max_transactional_position(&self) -> &LogPosition {
        &self.max_transactional_position
    }

    /// Decides whether the cycle starting after `low` has anything to scan.
    ///
    /// Scanning is skipped when the newest transactional position is at or below the commit
    /// position of `low`, whatever the overall maximum is.
    pub fn evaluate(&self, low: &TransactionLogPosition) -> CdcResult<ProbeDecision> {
        if self.max_transactional_position.try_cmp(&low.commit)? != Ordering::Greater {
            return Ok(ProbeDecision::Skip {
                high_water_mark: self.max_position.clone(),
            });
        }

        Ok(ProbeDecision::Scan {
            range: PositionRange::new(low.clone(), self.max_position.clone()),
        })
    }
}
