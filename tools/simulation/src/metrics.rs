//! Run metrics for simulation
//!
//! Tracks transactions, trades, order-change kinds, fees, block latency
//! histograms and throughput.

use std::collections::BTreeMap;

use order_keeper::BlockOutcome;
use serde::{Deserialize, Serialize};
use types::numeric::notional;
use types::order::ChangeKind;

/// Latency histogram bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyBucket {
    pub label: String,
    pub lower_ns: u64,
    pub upper_ns: u64,
    pub count: u64,
}

/// Aggregated simulation metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimMetrics {
    pub blocks: u64,
    pub txs_accepted: u64,
    pub txs_rejected: u64,
    pub total_trades: u64,
    pub total_fills: u64,
    pub total_partial_fills: u64,
    pub total_cancels: u64,
    pub total_expired: u64,
    pub total_ioc_removed: u64,
    pub failed_matches: u64,
    /// Quote volume in raw units
    pub total_volume: i128,
    pub fees: BTreeMap<String, i64>,
    pub settlement_failures: u64,
    pub latency_buckets: Vec<LatencyBucket>,
    pub elapsed_ns: u64,
}

impl SimMetrics {
    pub fn new() -> Self {
        Self {
            blocks: 0,
            txs_accepted: 0,
            txs_rejected: 0,
            total_trades: 0,
            total_fills: 0,
            total_partial_fills: 0,
            total_cancels: 0,
            total_expired: 0,
            total_ioc_removed: 0,
            failed_matches: 0,
            total_volume: 0,
            fees: BTreeMap::new(),
            settlement_failures: 0,
            latency_buckets: default_buckets(),
            elapsed_ns: 0,
        }
    }

    /// Record one executed block and how long it took.
    pub fn record_block(&mut self, outcome: &BlockOutcome, latency_ns: u64) {
        self.blocks += 1;
        self.txs_accepted += outcome.accepted.txs.len() as u64;
        self.txs_rejected += outcome.rejected.len() as u64;

        let round = &outcome.round;
        for symbol in &round.outcomes {
            if symbol.failed {
                self.failed_matches += 1;
            }
            for trade in &symbol.trades {
                self.total_trades += 1;
                self.total_volume += i128::from(notional(trade.price, trade.qty).unwrap_or_default());
            }
            for change in &symbol.changes {
                self.record_change(change.kind);
            }
        }
        for changes in round.expired.values() {
            for change in changes {
                self.record_change(change.kind);
            }
        }

        let settlements = std::iter::once(&round.settlement).chain(round.expiry_settlement.as_ref());
        for settlement in settlements {
            self.settlement_failures += settlement.failures.len() as u64;
            for (asset, amount) in &settlement.total_fee.tokens {
                *self.fees.entry(asset.clone()).or_default() += amount;
            }
        }

        self.record_latency(latency_ns);
        self.elapsed_ns += latency_ns;
    }

    fn record_change(&mut self, kind: ChangeKind) {
        match kind {
            ChangeKind::FullyFilled => self.total_fills += 1,
            ChangeKind::PartiallyFilled => self.total_partial_fills += 1,
            ChangeKind::Canceled => self.total_cancels += 1,
            ChangeKind::Expired => self.total_expired += 1,
            ChangeKind::IocNoFill | ChangeKind::IocExpire => self.total_ioc_removed += 1,
            ChangeKind::Ack | ChangeKind::FailedBlocking | ChangeKind::FailedMatching => {}
        }
    }

    /// Record latency in nanoseconds.
    pub fn record_latency(&mut self, latency_ns: u64) {
        for bucket in &mut self.latency_buckets {
            if latency_ns >= bucket.lower_ns && latency_ns < bucket.upper_ns {
                bucket.count += 1;
                return;
            }
        }
        // Overflow bucket (last)
        if let Some(last) = self.latency_buckets.last_mut() {
            last.count += 1;
        }
    }

    /// Throughput: accepted transactions per second.
    pub fn txs_per_second(&self) -> f64 {
        if self.elapsed_ns == 0 {
            return 0.0;
        }
        self.txs_accepted as f64 / (self.elapsed_ns as f64 / 1_000_000_000.0)
    }

    pub fn blocks_per_second(&self) -> f64 {
        if self.elapsed_ns == 0 {
            return 0.0;
        }
        self.blocks as f64 / (self.elapsed_ns as f64 / 1_000_000_000.0)
    }

    /// Everything except wall-clock measurements, for cross-run comparison.
    pub fn without_timing(&self) -> Self {
        Self {
            latency_buckets: default_buckets(),
            elapsed_ns: 0,
            ..self.clone()
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Blocks: {} | Txs: {} accepted, {} rejected | Trades: {} | Fills: {} | Cancels: {} | Expired: {} | Throughput: {:.0} txs/s",
            self.blocks,
            self.txs_accepted,
            self.txs_rejected,
            self.total_trades,
            self.total_fills,
            self.total_cancels,
            self.total_expired,
            self.txs_per_second(),
        )
    }
}

impl Default for SimMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Block execution latency buckets.
fn default_buckets() -> Vec<LatencyBucket> {
    vec![
        LatencyBucket { label: "<100μs".into(), lower_ns: 0, upper_ns: 100_000, count: 0 },
        LatencyBucket { label: "100μs-1ms".into(), lower_ns: 100_000, upper_ns: 1_000_000, count: 0 },
        LatencyBucket { label: "1-10ms".into(), lower_ns: 1_000_000, upper_ns: 10_000_000, count: 0 },
        LatencyBucket { label: "10-100ms".into(), lower_ns: 10_000_000, upper_ns: 100_000_000, count: 0 },
        LatencyBucket { label: ">100ms".into(), lower_ns: 100_000_000, upper_ns: u64::MAX, count: 0 },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use order_keeper::{RejectedTx, RoundReport, SymbolOutcome};
    use types::ids::{OrderId, Symbol};
    use types::msg::Block;
    use types::numeric::{Price, Quantity};
    use types::order::OrderChange;
    use types::trade::{TickType, Trade};

    fn outcome() -> BlockOutcome {
        let trade = Trade {
            bid: OrderId::new("b-1"),
            sid: OrderId::new("s-1"),
            price: Price::from_raw(200_000_000),
            qty: Quantity::from_raw(300_000_000),
            buy_cum_qty: Quantity::from_raw(300_000_000),
            sell_cum_qty: Quantity::from_raw(300_000_000),
            tick_type: TickType::Unknown,
        };
        BlockOutcome {
            accepted: Block::new(1, 1_000, vec![]),
            rejected: Vec::<RejectedTx>::new(),
            round: RoundReport {
                height: 1,
                outcomes: vec![SymbolOutcome {
                    symbol: Symbol::new("XYZ-000_BNB"),
                    trades: vec![trade],
                    changes: vec![
                        OrderChange::new(OrderId::new("b-1"), ChangeKind::PartiallyFilled),
                        OrderChange::new(OrderId::new("s-1"), ChangeKind::FullyFilled),
                        OrderChange::new(OrderId::new("b-1"), ChangeKind::IocExpire),
                    ],
                    last_trade_price: Price::from_raw(200_000_000),
                    failed: false,
                }],
                ..RoundReport::default()
            },
        }
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = SimMetrics::new();
        assert_eq!(metrics.blocks, 0);
        assert_eq!(metrics.latency_buckets.len(), 5);
    }

    #[test]
    fn test_record_block() {
        let mut metrics = SimMetrics::new();
        metrics.record_block(&outcome(), 50_000);
        assert_eq!(metrics.blocks, 1);
        assert_eq!(metrics.total_trades, 1);
        assert_eq!(metrics.total_volume, 600_000_000);
        assert_eq!(metrics.total_fills, 1);
        assert_eq!(metrics.total_partial_fills, 1);
        assert_eq!(metrics.total_ioc_removed, 1);
        assert_eq!(metrics.latency_buckets[0].count, 1);
    }

    #[test]
    fn test_latency_buckets() {
        let mut metrics = SimMetrics::new();
        metrics.record_latency(500);
        metrics.record_latency(500_000);
        metrics.record_latency(u64::MAX);
        assert_eq!(metrics.latency_buckets[0].count, 1);
        assert_eq!(metrics.latency_buckets[1].count, 1);
        assert_eq!(metrics.latency_buckets[4].count, 1);
    }

    #[test]
    fn test_throughput_and_timing_strip() {
        let mut metrics = SimMetrics::new();
        metrics.txs_accepted = 100_000;
        metrics.elapsed_ns = 1_000_000_000;
        assert_eq!(metrics.txs_per_second(), 100_000.0);
        assert_eq!(metrics.without_timing().elapsed_ns, 0);
        assert_eq!(metrics.without_timing().txs_accepted, 100_000);
    }

    #[test]
    fn test_summary() {
        assert!(SimMetrics::new().summary().contains("Blocks: 0"));
    }
}
