//! Concurrency test
//!
//! The worker pool width must never show up in results: the same seeded
//! flow run at different pool sizes, or on several threads at once, ends in
//! identical balances, fee pools, books and counters.

use std::collections::BTreeMap;
use std::thread;

use order_keeper::Balance;
use persistence::DexState;
use simulation::chain::{ChainConfig, MiniChain};
use simulation::flow::{FlowConfig, OrderFlow};
use simulation::metrics::SimMetrics;
use types::fee::Fee;
use types::ids::{AccountId, Symbol};
use types::numeric::{Price, Quantity};
use types::pair::TradingPair;

const UNIT: i64 = 100_000_000;

fn pairs() -> Vec<TradingPair> {
    ["AAA-001_BNB", "BBB-002_BNB", "CCC-003_BNB", "DDD-004_BNB"]
        .into_iter()
        .map(|s| TradingPair::new(Symbol::new(s), Price::from_raw(1_000), Quantity::from_raw(100_000), Price::from_raw(UNIT)))
        .collect()
}

struct RunResult {
    balances: BTreeMap<AccountId, BTreeMap<String, Balance>>,
    fee_pool: Fee,
    state: DexState,
    metrics: SimMetrics,
}

fn run(pool_size: u32, seed: u64, blocks: usize) -> RunResult {
    let mut config = ChainConfig {
        pairs: pairs(),
        ..ChainConfig::default()
    };
    config.keeper.pool_size = pool_size;
    config.keeper.breathe_block_interval = 10;
    config.keeper.order_retention_blocks = 5;
    let mut chain = MiniChain::new(config).unwrap();

    let mut flow = OrderFlow::new(
        FlowConfig {
            seed,
            ..FlowConfig::default()
        },
        pairs(),
    );
    chain.fund_all(&flow.accounts(), 100_000 * UNIT).unwrap();

    for _ in 0..blocks {
        let txs = flow.next_block(&chain.references());
        let outcome = chain.produce_block(txs).unwrap();
        flow.observe(&outcome);
    }

    RunResult {
        balances: chain.keeper().ledger().balances(),
        fee_pool: chain.keeper().fee_pool().total().clone(),
        state: chain.keeper().export_dex_state(),
        metrics: chain.metrics().without_timing(),
    }
}

#[test]
fn test_pool_size_does_not_change_results() {
    let baseline = run(0, 42, 25);
    assert!(baseline.metrics.total_trades > 0);
    assert!(baseline.metrics.total_expired > 0);

    for pool_size in [1, 2, 4] {
        let other = run(pool_size, 42, 25);
        assert_eq!(other.balances, baseline.balances, "balances differ at pool size {pool_size}");
        assert_eq!(other.fee_pool, baseline.fee_pool, "fee pool differs at pool size {pool_size}");
        assert_eq!(other.state, baseline.state, "state differs at pool size {pool_size}");
        assert_eq!(other.metrics, baseline.metrics, "metrics differ at pool size {pool_size}");
    }
}

#[test]
fn test_concurrent_chains() {
    let handles: Vec<_> = (0..4)
        .map(|i| thread::spawn(move || run(2 + i % 2, 7, 15)))
        .collect();
    let results: Vec<RunResult> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for other in &results[1..] {
        assert_eq!(other.balances, results[0].balances);
        assert_eq!(other.state, results[0].state);
        assert_eq!(other.metrics, results[0].metrics);
    }
}

#[test]
fn test_different_seeds_diverge() {
    let a = run(2, 1, 10);
    let b = run(2, 2, 10);
    assert_ne!(a.state, b.state);
}

#[test]
fn test_assets_conserved() {
    let result = run(3, 11, 20);
    let funded = i128::from(100_000 * UNIT) * 14;
    let pairs = pairs();
    let mut assets: Vec<&str> = pairs.iter().map(|p| p.base_asset()).collect();
    assets.push("BNB");
    for asset in assets {
        let held: i128 = result
            .balances
            .values()
            .filter_map(|b| b.get(asset))
            .map(|b| i128::from(b.free) + i128::from(b.locked))
            .sum();
        let pooled = i128::from(result.fee_pool.amount_of(asset));
        assert_eq!(held + pooled, funded, "{asset} not conserved");
    }
}
