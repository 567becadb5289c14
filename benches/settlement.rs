//! Benchmark suite for scenario replay and single settlements
//!
//! # Running Benchmarks
//!
//! ```bash
//! cargo bench
//! ```
//!
//! Scenarios are generated into temporary files: `accounts` accounts, each
//! topping up once and buying from a shared catalog several times. The
//! cooldown is disabled so every row settles.

use points_ledger::cli::StrategyType;
use points_ledger::strategy::{create_strategy, ConcurrentConfig};
use points_ledger::types::{NewAccount, NewProduct};
use points_ledger::{EngineConfig, LineItemRequest, PurchaseRequest, SettlementEngine};
use std::fmt::Write as _;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const PURCHASES_PER_ACCOUNT: usize = 8;

fn main() {
    divan::main();
}

fn config() -> EngineConfig {
    EngineConfig::default().with_cooldown(Duration::ZERO)
}

fn scenario(accounts: usize) -> NamedTempFile {
    let mut csv = String::from("op,account,target,quantity,amount\n");
    for product in 0..10 {
        let _ = writeln!(csv, "product,,P{},1000000,{}", product, 50 + product * 10);
    }
    for account in 0..accounts {
        let _ = writeln!(csv, "open,user{},,,5000", account);
        let _ = writeln!(csv, "topup,user{},,,1000", account);
        for n in 0..PURCHASES_PER_ACCOUNT {
            let _ = writeln!(
                csv,
                "purchase,user{},P{}:1;P{}:2,,",
                account,
                n % 10,
                (n + account) % 10
            );
        }
    }

    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(csv.as_bytes())
        .expect("Failed to write scenario");
    file.flush().expect("Failed to flush scenario");
    file
}

/// Replay a generated scenario file in file order
#[divan::bench(args = [10, 100, 1000])]
fn sequential_replay(bencher: divan::Bencher, accounts: usize) {
    let file = scenario(accounts);
    let strategy = create_strategy(StrategyType::Sequential, config(), None);

    bencher.bench_local(|| {
        let mut output = Vec::new();
        strategy
            .process(file.path(), &mut output)
            .expect("Processing failed");
    });
}

/// Replay a generated scenario file with per-account parallelism
#[divan::bench(args = [10, 100, 1000])]
fn concurrent_replay(bencher: divan::Bencher, accounts: usize) {
    let file = scenario(accounts);
    let strategy = create_strategy(
        StrategyType::Concurrent,
        config(),
        Some(ConcurrentConfig::default()),
    );

    bencher.bench_local(|| {
        let mut output = Vec::new();
        strategy
            .process(file.path(), &mut output)
            .expect("Processing failed");
    });
}

/// One three-line purchase against a warm store
#[divan::bench]
fn single_purchase(bencher: divan::Bencher) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("Failed to create runtime");
    let engine = SettlementEngine::in_memory(config());

    runtime.block_on(async {
        let admin = engine.administration();
        admin
            .open_account(NewAccount::new("alice", "alice@example.com", "Alice").with_opening_balance(u64::MAX / 2))
            .await
            .expect("Failed to open account");
        for id in ["P1", "P2", "P3"] {
            admin
                .add_product(NewProduct::new(id, id, 100, u32::MAX))
                .await
                .expect("Failed to add product");
        }
    });

    let request = PurchaseRequest::new(
        "alice",
        vec![
            LineItemRequest::new("P1", 1),
            LineItemRequest::new("P2", 2),
            LineItemRequest::new("P3", 1),
        ],
        "Standard Delivery",
    );

    bencher.bench_local(|| {
        runtime
            .block_on(engine.purchase(request.clone()))
            .expect("Purchase failed");
    });
}
