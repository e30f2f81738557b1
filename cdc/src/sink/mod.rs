//! Destinations for the merged change events.

mod base;
pub mod memory;

pub use base::EventSink;
