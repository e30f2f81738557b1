//! Authoritative table schemas and the mapping of captured columns onto them.

pub mod cache;
pub mod reconciler;

pub use cache::SchemaCache;
pub use reconciler::RowReconciler;
