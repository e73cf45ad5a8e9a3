//! Client-side controller for asynchronous place-search jobs.
//!
//! Submits a search to the backend service, polls the resulting job to a
//! terminal state, retrieves results, and can request CSV/XLSX exports and a
//! server-side cancel. See `cli` for the binary entry points.

pub mod cli;
pub mod engine;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod session;
pub mod text_summary;
#[cfg(feature = "tui")]
pub mod tui;
pub mod validate;
