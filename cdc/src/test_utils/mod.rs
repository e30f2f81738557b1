//! In-memory collaborators and builders for tests.

pub mod event;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod row;
pub mod schema;
pub mod source;

pub use crate::sink::memory::MemoryEventSink;
