#![deny(unreachable_pub)]

// Core modules
mod errors;
mod prelude;
mod req;

// Shared types
pub mod types;

// Feature modules
mod tracker;

// Re-exports
pub use errors::{Error, HttpErrorKind, SnapshotError};
pub use tracker::*;
pub use types::*;
