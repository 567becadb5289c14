//! Sequential processing strategy
//!
//! Replays rows strictly in file order on a single-threaded runtime. The
//! result is the reference outcome every other strategy must reproduce.

use std::path::Path;

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::core::SettlementEngine;
use crate::io::OperationReader;
use crate::strategy::{apply_row, ProcessingStrategy};

/// Single-threaded, file-order replay
#[derive(Debug, Clone, Default)]
pub struct SequentialProcessingStrategy {
    engine_config: EngineConfig,
}

impl SequentialProcessingStrategy {
    pub fn new(engine_config: EngineConfig) -> Self {
        Self { engine_config }
    }
}

impl ProcessingStrategy for SequentialProcessingStrategy {
    fn replay(&self, input_path: &Path) -> Result<SettlementEngine, String> {
        let reader = OperationReader::new(input_path)?;

        // Backoff sleeps need the time driver even on one thread
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let engine = SettlementEngine::in_memory(self.engine_config);
        let mut rows = 0usize;
        runtime.block_on(async {
            for result in reader {
                match result {
                    Ok(row) => {
                        rows += 1;
                        apply_row(&engine, row).await;
                    }
                    Err(e) => warn!(error = %e, "row skipped"),
                }
            }
        });

        info!(rows, "sequential replay finished");
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_replays_purchase_scenario() {
        let file = create_temp_csv(
            "op,account,target,quantity,amount\n\
             open,alice,,,1000\n\
             product,,P1,5,200\n\
             purchase,alice,P1:2,,\n",
        );

        let mut output = Vec::new();
        SequentialProcessingStrategy::default()
            .process(file.path(), &mut output)
            .unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "kind,id,balance,stock\naccount,alice,600,\nproduct,P1,,3\n"
        );
    }

    #[test]
    fn test_rejected_rows_are_skipped() {
        let file = create_temp_csv(
            "op,account,target,quantity,amount\n\
             open,alice,,,300\n\
             product,,P1,5,200\n\
             purchase,alice,P1:2,,\n\
             topup,alice,,,50\n\
             bogus,alice,,,\n\
             purchase,alice,P1:1,,\n",
        );

        let engine = SequentialProcessingStrategy::default()
            .replay(file.path())
            .unwrap();
        let admin = engine.administration();

        assert_eq!(admin.account(&"alice".into()).unwrap().balance, 100);
        assert_eq!(admin.product(&"P1".into()).unwrap().stock, 4);
    }

    #[test]
    fn test_missing_file() {
        let result = SequentialProcessingStrategy::default().replay(Path::new("nonexistent.csv"));
        assert!(result.unwrap_err().contains("Failed to open file"));
    }
}
