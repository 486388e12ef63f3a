//! Command-line argument definitions
//!
//! Parsed with clap's derive API. Engine bounds default to the values of
//! [`EngineConfig::default`]; out-of-range values fall back to the defaults
//! with a warning instead of failing.

use crate::core::config::{
    EngineConfig, DEFAULT_MAX_DURATION, DEFAULT_MIN_AMOUNT, DEFAULT_MIN_DURATION,
    DEFAULT_PROTOCOL_FEE_BPS,
};
use crate::core::EngineSettings;
use crate::strategy::BatchConfig;
use crate::types::{Amount, Principal};
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "streams-engine")]
#[command(about = "Replay a payment stream command ledger", long_about = None)]
pub struct CliArgs {
    #[arg(value_name = "INPUT", help = "Path to the command ledger CSV file")]
    pub input_file: PathBuf,

    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Replay strategy: 'sync' for in-order or 'async' for partitioned concurrent replay"
    )]
    pub strategy: StrategyType,

    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of records per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Number of runtime worker threads (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    #[arg(
        long = "owner",
        value_name = "PRINCIPAL",
        default_value = "owner",
        help = "Principal allowed to run administrative commands"
    )]
    pub owner: String,

    #[arg(
        long = "fee-recipient",
        value_name = "PRINCIPAL",
        help = "Initial receiver of protocol fees (default: the owner)"
    )]
    pub fee_recipient: Option<String>,

    #[arg(
        long = "fee-bps",
        value_name = "BPS",
        default_value_t = DEFAULT_PROTOCOL_FEE_BPS,
        help = "Protocol fee in basis points"
    )]
    pub fee_bps: u16,

    #[arg(
        long = "min-amount",
        value_name = "UNITS",
        default_value_t = DEFAULT_MIN_AMOUNT,
        help = "Smallest committable stream amount"
    )]
    pub min_amount: Amount,

    #[arg(
        long = "min-duration",
        value_name = "SECONDS",
        default_value_t = DEFAULT_MIN_DURATION,
        help = "Shortest stream duration"
    )]
    pub min_duration: u64,

    #[arg(
        long = "max-duration",
        value_name = "SECONDS",
        default_value_t = DEFAULT_MAX_DURATION,
        help = "Longest stream duration"
    )]
    pub max_duration: u64,

    #[arg(
        long = "balances",
        value_name = "PATH",
        help = "Write final ledger balances as CSV to this file"
    )]
    pub balances: Option<PathBuf>,

    #[arg(
        long = "events",
        value_name = "PATH",
        help = "Write emitted stream events as CSV to this file"
    )]
    pub events: Option<PathBuf>,

    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help = "Increase log verbosity (-v info, -vv debug, -vvv trace)"
    )]
    pub verbose: u8,
}

/// Replay strategy selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Batch configuration for the async strategy
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Engine bounds, validated by [`EngineConfig::new`]
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::new(
            self.min_amount,
            self.min_duration,
            self.max_duration,
            self.fee_bps,
            EngineConfig::default().max_batch_size,
        )
    }

    /// Engine configuration plus roles
    pub fn to_engine_settings(&self) -> EngineSettings {
        let owner = Principal::new(self.owner.as_str());
        let fee_recipient = self
            .fee_recipient
            .as_deref()
            .map(Principal::new)
            .unwrap_or_else(|| owner.clone());

        EngineSettings {
            config: self.to_engine_config(),
            owner,
            fee_recipient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::default_strategy(&["program", "input.csv"], StrategyType::Async)]
    #[case::explicit_sync(&["program", "--strategy", "sync", "input.csv"], StrategyType::Sync)]
    #[case::explicit_async(&["program", "--strategy", "async", "input.csv"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.strategy, expected);
    }

    #[rstest]
    #[case::all_defaults(&["program", "input.csv"], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["program", "--batch-size", "2000", "input.csv"], 2000, num_cpus::get())]
    #[case::custom_max_concurrent(&["program", "--max-concurrent", "8", "input.csv"], 1000, 8)]
    #[case::zero_batch_size(&["program", "--batch-size", "0", "input.csv"], 1000, num_cpus::get())]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_batch_config();

        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[test]
    fn test_engine_settings_defaults() {
        let settings = CliArgs::try_parse_from(["program", "input.csv"])
            .unwrap()
            .to_engine_settings();

        assert_eq!(settings.config, EngineConfig::default());
        assert_eq!(settings.owner, Principal::new("owner"));
        assert_eq!(settings.fee_recipient, Principal::new("owner"));
    }

    #[test]
    fn test_engine_settings_overrides() {
        let args = [
            "program",
            "--owner",
            "root",
            "--fee-recipient",
            "treasury",
            "--fee-bps",
            "100",
            "--min-amount",
            "1",
            "--min-duration",
            "60",
            "--max-duration",
            "600",
            "input.csv",
        ];
        let settings = CliArgs::try_parse_from(args).unwrap().to_engine_settings();

        assert_eq!(settings.owner, Principal::new("root"));
        assert_eq!(settings.fee_recipient, Principal::new("treasury"));
        assert_eq!(settings.config.protocol_fee_bps, 100);
        assert_eq!(settings.config.min_amount, 1);
        assert_eq!(settings.config.min_duration, 60);
        assert_eq!(settings.config.max_duration, 600);
    }

    #[test]
    fn test_out_of_range_fee_falls_back() {
        let config = CliArgs::try_parse_from(["program", "--fee-bps", "20000", "input.csv"])
            .unwrap()
            .to_engine_config();
        assert_eq!(config.protocol_fee_bps, DEFAULT_PROTOCOL_FEE_BPS);
    }

    #[rstest]
    #[case::none(&["program", "input.csv"], 0)]
    #[case::one(&["program", "-v", "input.csv"], 1)]
    #[case::three(&["program", "-vvv", "input.csv"], 3)]
    fn test_verbosity_count(#[case] args: &[&str], #[case] expected: u8) {
        assert_eq!(CliArgs::try_parse_from(args).unwrap().verbose, expected);
    }

    #[test]
    fn test_output_paths() {
        let parsed = CliArgs::try_parse_from([
            "program",
            "--balances",
            "balances.csv",
            "--events",
            "events.csv",
            "input.csv",
        ])
        .unwrap();
        assert_eq!(parsed.balances, Some(PathBuf::from("balances.csv")));
        assert_eq!(parsed.events, Some(PathBuf::from("events.csv")));
    }

    #[rstest]
    #[case::missing_input(&["program"])]
    #[case::invalid_strategy(&["program", "--strategy", "invalid", "input.csv"])]
    #[case::negative_amount(&["program", "--min-amount", "-1", "input.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
