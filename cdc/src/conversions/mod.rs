//! Conversions between textual and binary representations of source values.

pub mod hex;
