//! Processing strategy module for scenario replay
//!
//! A strategy reads a scenario file, drives every row through a fresh
//! in-memory [`SettlementEngine`], and hands back the engine so the caller
//! can report on the final state. Rows the engine rejects are logged and
//! skipped; only I/O and runtime failures abort a replay.

use std::io::Write;
use std::path::Path;

use tracing::{debug, warn};

use crate::cli::StrategyType;
use crate::config::EngineConfig;
use crate::core::SettlementEngine;
use crate::io::{write_state_csv, Operation, ScenarioRow};
use crate::types::LedgerError;

pub mod concurrent;
pub mod sequential;

pub use concurrent::{ConcurrentConfig, ConcurrentProcessingStrategy};
pub use sequential::SequentialProcessingStrategy;

/// Processing strategy trait for complete scenario replays
pub trait ProcessingStrategy: Send + Sync {
    /// Replay every row of `input_path` against a fresh engine
    ///
    /// # Errors
    ///
    /// Returns an error if the input file cannot be opened or the runtime
    /// cannot be started. Row failures are logged, not returned.
    fn replay(&self, input_path: &Path) -> Result<SettlementEngine, String>;

    /// Replay `input_path` and write the final state CSV to `output`
    fn process(&self, input_path: &Path, output: &mut dyn Write) -> Result<(), String> {
        let engine = self.replay(input_path)?;
        write_state(&engine, output)
    }
}

/// Create a processing strategy based on the specified strategy type
pub fn create_strategy(
    strategy_type: StrategyType,
    engine_config: EngineConfig,
    concurrent_config: Option<ConcurrentConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sequential => Box::new(SequentialProcessingStrategy::new(engine_config)),
        StrategyType::Concurrent => Box::new(ConcurrentProcessingStrategy::new(
            engine_config,
            concurrent_config.unwrap_or_default(),
        )),
    }
}

/// Write every account balance and product stock of `engine`
pub fn write_state(engine: &SettlementEngine, output: &mut dyn Write) -> Result<(), String> {
    let admin = engine.administration();
    let accounts = admin
        .accounts()
        .map_err(|e| format!("Failed to list accounts: {}", e))?;
    let products = admin
        .products()
        .map_err(|e| format!("Failed to list products: {}", e))?;
    write_state_csv(&accounts, &products, output)
}

/// Apply one row, logging rather than propagating a rejection
pub(crate) async fn apply_row(engine: &SettlementEngine, row: ScenarioRow) {
    let line = row.line;
    match apply_operation(engine, row.operation).await {
        Ok(()) => debug!(line, "row applied"),
        Err(error) => warn!(line, %error, "row rejected"),
    }
}

async fn apply_operation(engine: &SettlementEngine, operation: Operation) -> Result<(), LedgerError> {
    let admin = engine.administration();
    match operation {
        Operation::OpenAccount(new) => admin.open_account(new).await.map(drop),
        Operation::AddProduct(new) => admin.add_product(new).await.map(drop),
        Operation::RetireProduct(id) => admin.retire_product(&id).await.map(drop),
        Operation::TopUp(request) => engine.top_up(request).await.map(drop),
        Operation::Purchase(request) => engine.purchase(request).await.map(drop),
    }
}
