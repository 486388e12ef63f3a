//! Payment Streams CLI
//!
//! Replays a command ledger through the payment streams engine.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- ledger.csv > streams.csv
//! cargo run -- --strategy sync ledger.csv > streams.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 ledger.csv > streams.csv
//! cargo run -- --fee-bps 100 --balances balances.csv --events events.csv -v ledger.csv
//! ```
//!
//! Final stream snapshots go to stdout; logs go to stderr.
//!
//! # Exit Codes
//!
//! - 0: Success (rejected commands are logged, not fatal)
//! - 1: Error (missing arguments, unreadable ledger, unwritable output)

use rust_payment_streams::cli;
use rust_payment_streams::io::{write_balances_csv, write_events_csv};
use rust_payment_streams::strategy;
use std::fs::File;
use std::path::Path;
use std::process;

fn write_file(
    path: &Path,
    write: impl FnOnce(&mut dyn std::io::Write) -> Result<(), String>,
) -> Result<(), String> {
    let mut file = File::create(path)
        .map_err(|e| format!("Failed to create file '{}': {}", path.display(), e))?;
    write(&mut file)
}

fn main() {
    let args = cli::parse_args();
    cli::init_logging(args.verbose);

    let strategy = {
        let config = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy, args.to_engine_settings(), config)
    };

    let mut output = std::io::stdout();
    let report = match strategy.process(&args.input_file, &mut output) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if let Some(path) = &args.balances {
        if let Err(e) = write_file(path, |out| write_balances_csv(&report.balances, out)) {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }

    if let Some(path) = &args.events {
        if let Err(e) = write_file(path, |out| write_events_csv(&report.events, out)) {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
