//! Shared configuration types for change-capture polling.

mod base;
mod batch;
mod capture;
mod source;

pub use base::ValidationError;
pub use batch::BatchConfig;
pub use capture::CaptureConfig;
pub use source::{ChangeSourceConfig, UnknownColumnPolicy};
