use crate::config::EngineConfig;
use crate::core::RetryPolicy;
use crate::strategy::ConcurrentConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Replay a points-ledger scenario and report the final state
#[derive(Parser, Debug)]
#[command(name = "points-ledger")]
#[command(about = "Replay a points-ledger scenario and report the final state", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing scenario rows
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Replay strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "concurrent",
        help = "Replay strategy: 'sequential' for file order or 'concurrent' for per-account parallelism"
    )]
    pub strategy: StrategyType,

    /// Worker threads (concurrent mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Number of worker threads (default: CPU cores)"
    )]
    pub max_concurrent: Option<usize>,

    /// Top-up cooldown per account
    #[arg(
        long = "cooldown-secs",
        value_name = "SECONDS",
        default_value_t = 10,
        help = "Minimum seconds between top-ups of one account"
    )]
    pub cooldown_secs: u64,

    /// Attempts per conflicting settlement
    #[arg(
        long = "max-attempts",
        value_name = "COUNT",
        default_value_t = 5,
        help = "Attempts per settlement before giving up on conflicts"
    )]
    pub max_attempts: u32,

    /// Print one account's data export instead of the state CSV
    #[arg(
        long = "export",
        value_name = "ACCOUNT",
        help = "Write the JSON data export of ACCOUNT instead of the state CSV"
    )]
    pub export: Option<String>,
}

/// Available replay strategies
#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sequential,
    Concurrent,
}

impl CliArgs {
    /// Engine limits with the CLI overrides applied
    pub fn to_engine_config(&self) -> EngineConfig {
        let defaults = RetryPolicy::default();
        EngineConfig::default()
            .with_cooldown(Duration::from_secs(self.cooldown_secs))
            .with_retry(RetryPolicy::new(
                self.max_attempts,
                defaults.base_delay,
                defaults.max_delay,
            ))
    }

    /// Worker configuration, `None` outside concurrent mode
    pub fn to_concurrent_config(&self) -> Option<ConcurrentConfig> {
        match self.strategy {
            StrategyType::Concurrent => Some(
                self.max_concurrent
                    .map(ConcurrentConfig::new)
                    .unwrap_or_default(),
            ),
            StrategyType::Sequential => None,
        }
    }
}
