//! Shared domain types.
//!
//! Outcomes and predictions are what the tracker stores and serves; the page
//! types model the rendered snapshot handed over by the rendering sidecar.

mod outcome;
mod page;

pub use outcome::*;
pub use page::*;
