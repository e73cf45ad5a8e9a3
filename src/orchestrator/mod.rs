//! Application-level orchestration.
//!
//! This module owns the job run lifecycle (submit/supersede/cancel) and export
//! sequencing. UI/CLI layers drive it through commands and observe it through
//! events; they never touch engine tasks directly.

mod controller;
mod export;

pub use controller::{run_controller, UiCommand};
pub use export::resolve_download_url;
