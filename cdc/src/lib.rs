//! Log-based change data capture core.
//!
//! Orders row changes scattered across per-table capture instances into a single stream by
//! transaction log position, and rebuilds full-width rows when a capture instance records only a
//! subset of its table's columns.
//!
//! The entry points are [`replication::cycle::PollCycle`] for a single probe-merge-deliver pass
//! and [`replication::poller::ChangeCapturePoller`] for a long-running loop. Data sources plug in
//! through the traits of [`replication::source`], destinations through [`sink::EventSink`].

pub mod concurrency;
pub mod conversions;
pub mod error;
pub mod failpoints;
mod macros;
pub mod replication;
pub mod schema;
pub mod sink;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
