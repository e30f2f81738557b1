use std::cmp::Ordering;
use std::fmt;

use bytes::Bytes;

use crate::bail;
use crate::conversions::hex::encode_hex_upper;
use crate::error::{CdcResult, ErrorKind};

/// Opaque position in a source transaction log.
///
/// Positions compare as unsigned big-endian byte strings. The empty position,
/// [`LogPosition::NONE`], means "no position" and sorts below every other value. Two non-empty
/// positions of different widths have no defined order: [`PartialOrd::partial_cmp`] returns
/// [`None`] and [`LogPosition::try_cmp`] fails with [`ErrorKind::PositionWidthMismatch`].
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct LogPosition(Bytes);

impl LogPosition {
    /// The "no position" value.
    pub const NONE: LogPosition = LogPosition(Bytes::new());

    /// Wraps raw position bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Wraps a static byte string, mostly useful for constants and tests.
    pub const fn from_static(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }

    /// Returns `true` for [`LogPosition::NONE`].
    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    /// Width of the position in bytes, zero for [`LogPosition::NONE`].
    pub fn width(&self) -> usize {
        self.0.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    /// Compares two positions, failing when both are set but have different widths.
    pub fn try_cmp(&self, other: &LogPosition) -> CdcResult<Ordering> {
        match self.partial_cmp(other) {
            Some(ordering) => Ok(ordering),
            None => bail!(
                ErrorKind::PositionWidthMismatch,
                "Cannot compare log positions of different widths",
                format!(
                    "{self} has {} bytes, {other} has {} bytes",
                    self.width(),
                    other.width()
                )
            ),
        }
    }

    /// Returns the larger of two positions.
    pub fn try_max(self, other: LogPosition) -> CdcResult<LogPosition> {
        match self.try_cmp(&other)? {
            Ordering::Less => Ok(other),
            Ordering::Equal | Ordering::Greater => Ok(self),
        }
    }
}

impl PartialOrd for LogPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.is_none(), other.is_none()) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) if self.width() == other.width() => Some(self.0.cmp(&other.0)),
            (false, false) => None,
        }
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return f.write_str("NONE");
        }

        write!(f, "0x{}", encode_hex_upper(&self.0))
    }
}

impl fmt::Debug for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogPosition({self})")
    }
}

impl From<Bytes> for LogPosition {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for LogPosition {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

/// Location of a row-level change: the commit position of its transaction and the position of
/// the row inside that transaction.
///
/// Ordering is lexicographic on `(commit, row)`.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct TransactionLogPosition {
    pub commit: LogPosition,
    pub row: LogPosition,
}

impl TransactionLogPosition {
    /// Position of an exhausted cursor, below every other position.
    pub const NULL: TransactionLogPosition = TransactionLogPosition {
        commit: LogPosition::NONE,
        row: LogPosition::NONE,
    };

    pub fn new(commit: LogPosition, row: LogPosition) -> Self {
        Self { commit, row }
    }

    /// Position just before the first row committed at `commit`.
    pub fn at_commit(commit: LogPosition) -> Self {
        Self {
            commit,
            row: LogPosition::NONE,
        }
    }

    pub fn is_null(&self) -> bool {
        self.commit.is_none() && self.row.is_none()
    }

    /// Compares commit positions first and row positions on ties.
    pub fn try_cmp(&self, other: &TransactionLogPosition) -> CdcResult<Ordering> {
        match self.commit.try_cmp(&other.commit)? {
            Ordering::Equal => self.row.try_cmp(&other.row),
            ordering => Ok(ordering),
        }
    }

    /// Returns the larger of two positions.
    pub fn try_max(self, other: TransactionLogPosition) -> CdcResult<TransactionLogPosition> {
        match self.try_cmp(&other)? {
            Ordering::Less => Ok(other),
            Ordering::Equal | Ordering::Greater => Ok(self),
        }
    }
}

impl PartialOrd for TransactionLogPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.try_cmp(other).ok()
    }
}

impl fmt::Display for TransactionLogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.commit, self.row)
    }
}

impl fmt::Debug for TransactionLogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionLogPosition({self})")
    }
}

/// Half-open range of positions `(low, high]` scanned by one polling cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionRange {
    /// Last position already delivered, excluded from the range.
    pub low: TransactionLogPosition,
    /// Highest commit position included in the range.
    pub high: LogPosition,
}

impl PositionRange {
    pub fn new(low: TransactionLogPosition, high: LogPosition) -> Self {
        Self { low, high }
    }

    /// Returns `true` when `position` lies strictly after `low` and commits at or before `high`.
    pub fn contains(&self, position: &TransactionLogPosition) -> CdcResult<bool> {
        Ok(position.try_cmp(&self.low)? == Ordering::Greater
            && position.commit.try_cmp(&self.high)? != Ordering::Greater)
    }
}

impl fmt::Display for PositionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}]", self.low, self.high)
    }
}
