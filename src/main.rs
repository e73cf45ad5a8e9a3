use anyhow::Result;
use clap::Parser;
use mapsearch_cli::cli;
use mapsearch_cli::logging::{self, LogDestination};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_silent = args.silent;
    let is_non_tui = args.silent || args.json || args.text;

    let destination = if is_silent {
        LogDestination::Off
    } else if is_non_tui || !cfg!(feature = "tui") {
        LogDestination::Terminal
    } else {
        LogDestination::File
    };
    logging::initialize(destination, args.verbose);

    match cli::run(args).await {
        Ok(()) => {
            // Explicitly exit with code 0 on success, especially for non-TUI modes
            if is_non_tui {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => {
            if is_silent {
                println!("{}", e);
                std::process::exit(1);
            } else {
                Err(e)
            }
        }
    }
}
