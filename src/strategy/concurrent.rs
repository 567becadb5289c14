//! Concurrent processing strategy
//!
//! Replays a scenario with account-level parallelism on a multi-threaded
//! tokio runtime.
//!
//! # Architecture
//!
//! ```text
//! ConcurrentProcessingStrategy
//!     ├── ConcurrentConfig (worker threads)
//!     ├── OperationReader  (row parsing)
//!     └── SettlementEngine (shared by every task)
//! ```
//!
//! # Ordering
//!
//! - Catalog rows (`product`, `retire`) are applied first, in file order
//! - The remaining rows are partitioned by account
//! - Partitions run concurrently; each partition runs in file order
//!
//! Different accounts contending for the same product stock are resolved by
//! the engine's optimistic commits, so the totals stay consistent even
//! though which purchase wins may vary between runs.

use std::collections::HashMap;
use std::path::Path;

use futures::future::join_all;
use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::core::SettlementEngine;
use crate::io::{OperationReader, ScenarioRow};
use crate::strategy::{apply_row, ProcessingStrategy};
use crate::types::AccountId;

/// Worker configuration for concurrent replay
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConcurrentConfig {
    /// Number of runtime worker threads
    pub max_concurrent: usize,
}

impl Default for ConcurrentConfig {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get(),
        }
    }
}

impl ConcurrentConfig {
    /// Create a config; zero workers fall back to the default
    pub fn new(max_concurrent: usize) -> Self {
        if max_concurrent == 0 {
            let default = Self::default();
            warn!(
                requested = max_concurrent,
                fallback = default.max_concurrent,
                "invalid max_concurrent, using default"
            );
            return default;
        }
        Self { max_concurrent }
    }
}

/// Split rows into catalog rows and per-account partitions
///
/// Every row lands in exactly one place and keeps its relative file order.
pub fn partition_by_account(
    rows: Vec<ScenarioRow>,
) -> (Vec<ScenarioRow>, HashMap<AccountId, Vec<ScenarioRow>>) {
    let mut catalog = Vec::new();
    let mut partitions: HashMap<AccountId, Vec<ScenarioRow>> = HashMap::new();

    for row in rows {
        match row.operation.account().cloned() {
            Some(account) => partitions.entry(account).or_default().push(row),
            None => catalog.push(row),
        }
    }

    (catalog, partitions)
}

/// Multi-threaded replay partitioned by account
#[derive(Debug, Clone, Default)]
pub struct ConcurrentProcessingStrategy {
    engine_config: EngineConfig,
    config: ConcurrentConfig,
}

impl ConcurrentProcessingStrategy {
    pub fn new(engine_config: EngineConfig, config: ConcurrentConfig) -> Self {
        Self {
            engine_config,
            config,
        }
    }
}

impl ProcessingStrategy for ConcurrentProcessingStrategy {
    fn replay(&self, input_path: &Path) -> Result<SettlementEngine, String> {
        let reader = OperationReader::new(input_path)?;
        let rows: Vec<ScenarioRow> = reader
            .filter_map(|result| {
                result
                    .map_err(|e| warn!(error = %e, "row skipped"))
                    .ok()
            })
            .collect();
        let total = rows.len();
        let (catalog, partitions) = partition_by_account(rows);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent)
            .enable_time()
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let engine = SettlementEngine::in_memory(self.engine_config);
        let partition_count = partitions.len();

        runtime.block_on(async {
            for row in catalog {
                apply_row(&engine, row).await;
            }

            let tasks = partitions.into_values().map(|rows| {
                let engine = engine.clone();
                tokio::spawn(async move {
                    for row in rows {
                        apply_row(&engine, row).await;
                    }
                })
            });

            for result in join_all(tasks).await {
                if let Err(e) = result {
                    error!(error = %e, "partition task failed");
                }
            }
        });

        info!(rows = total, partitions = partition_count, "concurrent replay finished");
        Ok(engine)
    }
}
