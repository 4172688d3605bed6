pub mod classify;
pub mod config;
pub mod error;
pub mod io;
pub mod plan;
pub mod roster;
pub mod summary;
pub mod types;

pub use error::{GuardlinkError, Result};
