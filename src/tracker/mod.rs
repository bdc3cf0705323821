//! Outcome tracking and prediction pipeline.
//!
//! The pipeline is a single repeating poll cycle:
//! - **Source**: acquires a page snapshot from the rendering sidecar
//! - **PhaseTracker**: classifies the round as waiting, spinning or settled
//! - **Extractor**: reads the settled outcome from the results feed
//! - **Deduplicator**: drops the same settled outcome seen on a later poll
//! - **State**: bounded outcome/prediction histories plus accuracy bookkeeping
//! - **Predictor**: streak heuristics (reactive) or frequency sampling (batch)
//!
//! The query API reads copies of the state concurrently with the poll loop.

mod accuracy;
mod config;
mod dedup;
mod extractor;
mod history;
mod logging;
mod metrics;
mod phase;
mod poll;
mod predictor;
mod server;
mod source;
mod state;

#[cfg(test)]
mod tests;

pub use accuracy::*;
pub use config::*;
pub use dedup::*;
pub use extractor::*;
pub use history::*;
pub use logging::*;
pub use metrics::*;
pub use phase::*;
pub use poll::*;
pub use predictor::*;
pub use server::*;
pub use source::*;
pub use state::*;
