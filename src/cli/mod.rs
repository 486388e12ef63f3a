// CLI module
// Command-line interface, argument parsing and logging setup

mod args;

pub use args::{CliArgs, StrategyType};

use clap::Parser;
use tracing::Level;

pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// Log level for a `-v` count: warn, info, debug, then trace
pub fn log_level(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the fmt subscriber, writing to stderr so stdout stays pure CSV
pub fn init_logging(verbose: u8) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
