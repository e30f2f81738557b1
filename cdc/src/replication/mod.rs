//! Reading, ordering and delivering row changes from capture instances.
//!
//! A [`cycle::PollCycle`] probes the source, opens one [`cursor::ChangeSourceCursor`] per capture
//! instance, merges them by position with [`merge::ChangeStreamMerger`] and writes the result to
//! an [`crate::sink::EventSink`]. [`poller::ChangeCapturePoller`] repeats cycles until shutdown.

pub mod cursor;
pub mod cycle;
pub mod dialect;
pub mod merge;
pub mod poller;
pub mod source;
