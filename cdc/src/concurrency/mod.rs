//! Coordination primitives for long-running pollers.

pub mod shutdown;
