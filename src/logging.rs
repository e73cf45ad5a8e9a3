//! Logger initialization.
//!
//! Non-TUI modes log to stderr; the TUI owns the terminal, so it logs to
//! `./mapsearch-cli.log` instead.

use log::LevelFilter;
use simplelog::{ColorChoice, Config, ConfigBuilder, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;

/// Destination for log output.
pub enum LogDestination {
    /// Write to ./mapsearch-cli.log in the current directory.
    File,
    /// Write to stderr.
    Terminal,
    /// Discard everything (silent mode).
    Off,
}

/// Initialize the global logger. Safe to call once per process; failures to
/// create the log file degrade to no logging rather than aborting the run.
pub fn initialize(destination: LogDestination, verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let config = build_config();

    match destination {
        LogDestination::Off => {}
        LogDestination::File => {
            if let Ok(file) = File::create("./mapsearch-cli.log") {
                let _ = WriteLogger::init(level, config, file);
            }
        }
        LogDestination::Terminal => {
            // Default to warnings on the terminal so progress output stays
            // readable; --verbose opens it up.
            let level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
            let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
        }
    }
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}
