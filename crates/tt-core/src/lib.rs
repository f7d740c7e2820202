//! Core storage and identity engine for the tt task tracker.

pub mod codec;
pub mod config;
pub mod description;
pub mod error;
pub mod identity;
pub mod item;
pub mod ledger;
pub mod status;
pub mod store;
pub mod tracker;

pub use error::{Result, TrackerError};
pub use identity::{Identity, Scope, Uid, Vid};
pub use item::{Item, Kind};
pub use status::Status;
pub use tracker::{Amendment, Tracker};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
