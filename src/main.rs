//! Points Ledger CLI
//!
//! Replays a scenario of ledger operations from a CSV file and reports the
//! resulting state.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- scenario.csv > state.csv
//! cargo run -- --strategy sequential scenario.csv > state.csv
//! cargo run -- --strategy concurrent --max-concurrent 8 scenario.csv > state.csv
//! cargo run -- --cooldown-secs 0 --export alice scenario.csv > alice.json
//! RUST_LOG=points_ledger=debug cargo run -- scenario.csv
//! ```
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `warn`).
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, unknown export account, etc.)

use points_ledger::{cli, io, strategy};
use std::process;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn run(args: &cli::CliArgs) -> Result<(), String> {
    let strategy = strategy::create_strategy(
        args.strategy.clone(),
        args.to_engine_config(),
        args.to_concurrent_config(),
    );

    let mut output = std::io::stdout();
    match &args.export {
        None => strategy.process(&args.input_file, &mut output),
        Some(account) => {
            let engine = strategy.replay(&args.input_file)?;
            let export = engine
                .administration()
                .export_account_data(&account.as_str().into())
                .map_err(|e| e.to_string())?;
            io::write_export_json(&export, &mut output)
        }
    }
}

fn main() {
    init_tracing();
    let args = cli::parse_args();

    if let Err(e) = run(&args) {
        error!("{}", e);
        process::exit(1);
    }
}
