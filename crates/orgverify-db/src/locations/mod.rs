//! Queries for the `locations` table: the verification queue and the
//! per-location decision transitions.

mod read;
mod types;
mod write;

pub use read::{get_location, list_locations, list_pending_locations};
pub use types::{LocationRow, NewLocation, PendingLocationRow};
pub use write::{approve_location, insert_location, reject_location};
