//! Configuration for change-capture polling.
//!
//! Configuration is layered from `configuration/base.*`, `configuration/{environment}.*`
//! and `APP_`-prefixed environment variables, see [`load::load_config`].

pub mod environment;
pub mod load;
pub mod shared;

pub use load::{Config, LoadConfigError, load_config};
