//! Tracing setup shared by change-capture binaries and tests.

pub mod tracing;
