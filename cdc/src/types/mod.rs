//! Value types shared across the crate: log positions, probes, rows, schemas and events.

mod cell;
mod event;
mod position;
mod probe;
mod schema;
mod table_row;

pub use cell::*;
pub use event::*;
pub use position::*;
pub use probe::*;
pub use schema::*;
pub use table_row::*;
