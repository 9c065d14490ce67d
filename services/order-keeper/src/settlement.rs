//! Sharded settlement fan-out
//!
//! Every transfer goes to shard `crc32c(account) % shard_count`, so all of an
//! account's balance updates run on one worker in the order they were sent.
//! Workers for different shards never touch the same account and need no
//! locks between them. The shard count comes from chain configuration; it
//! changes parallelism only, never the resulting balances or fees.

use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tracing::{debug, warn};
use types::errors::LedgerError;
use types::fee::Fee;
use types::ids::{AccountId, OrderId};
use types::transfer::Transfer;

use crate::fees::FeeCalculator;
use crate::ledger::Ledger;

/// Shard owning `account`
pub fn shard_of(account: &AccountId, shard_count: usize) -> usize {
    if shard_count <= 1 {
        return 0;
    }
    crc32c::crc32c(account.as_bytes()) as usize % shard_count
}

/// Sending half of the settlement channels, cloned into each producer
#[derive(Debug, Clone)]
pub struct ShardRouter {
    senders: Vec<Sender<Transfer>>,
}

impl ShardRouter {
    pub fn shard_count(&self) -> usize {
        self.senders.len()
    }

    pub fn route(&self, transfer: Transfer) {
        let shard = shard_of(&transfer.account, self.senders.len());
        if self.senders[shard].send(transfer).is_err() {
            // only possible once the shard worker has exited
            warn!(shard, "Settlement shard closed, transfer dropped");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementFailure {
    pub account: AccountId,
    /// `None` when the account's fee charge failed
    pub order_id: Option<OrderId>,
    pub error: LedgerError,
}

/// Outcome of one settlement pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementReport {
    pub applied: usize,
    /// Applied transfers with their fees, sorted by account, symbol, order id
    pub transfers: Vec<Transfer>,
    pub fees: BTreeMap<AccountId, Fee>,
    pub total_fee: Fee,
    pub failures: Vec<SettlementFailure>,
}

impl SettlementReport {
    fn merge(&mut self, shard: SettlementReport) {
        self.applied += shard.applied;
        self.transfers.extend(shard.transfers);
        for (account, fee) in shard.fees {
            self.total_fee.add_fee(&fee);
            self.fees.entry(account).or_default().add_fee(&fee);
        }
        self.failures.extend(shard.failures);
    }

    fn finish(&mut self) {
        self.transfers.sort_by(|a, b| (&a.account, a.sort_key()).cmp(&(&b.account, b.sort_key())));
        self.failures.sort_by(|a, b| (&a.account, &a.order_id).cmp(&(&b.account, &b.order_id)));
    }
}

/// Run `produce` while `shard_count` workers settle what it routes
///
/// Returns after every channel has closed and every worker has charged its
/// accounts' fees. Shard reports are merged with commutative sums only.
pub fn settle<L, F>(ledger: &L, calc: &FeeCalculator, shard_count: usize, produce: F) -> SettlementReport
where
    L: Ledger + ?Sized,
    F: FnOnce(&ShardRouter),
{
    let shard_count = shard_count.max(1);
    let (senders, receivers): (Vec<_>, Vec<_>) = (0..shard_count).map(|_| mpsc::channel()).unzip();
    let router = ShardRouter { senders };

    let mut report = thread::scope(|s| {
        let workers: Vec<_> = receivers
            .into_iter()
            .enumerate()
            .map(|(shard, rx)| s.spawn(move || drain_shard(ledger, calc, shard, rx)))
            .collect();

        produce(&router);
        drop(router);

        let mut report = SettlementReport::default();
        for worker in workers {
            match worker.join() {
                Ok(shard) => report.merge(shard),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        report
    });
    report.finish();
    report
}

fn drain_shard<L>(ledger: &L, calc: &FeeCalculator, shard: usize, rx: Receiver<Transfer>) -> SettlementReport
where
    L: Ledger + ?Sized,
{
    let mut report = SettlementReport::default();
    let mut pending: BTreeMap<AccountId, Vec<Transfer>> = BTreeMap::new();

    for transfer in rx {
        match ledger.apply_transfer(&transfer) {
            Ok(()) => {
                report.applied += 1;
                pending.entry(transfer.account.clone()).or_default().push(transfer);
            }
            Err(error) => {
                warn!(shard, account = %transfer.account, order_id = %transfer.order_id, %error, "Transfer rejected by ledger");
                report.failures.push(SettlementFailure {
                    account: transfer.account.clone(),
                    order_id: Some(transfer.order_id.clone()),
                    error,
                });
            }
        }
    }

    for (account, mut transfers) in pending {
        let fee = calc.calculate(ledger, &account, &mut transfers);
        match ledger.charge_fee(&account, &fee) {
            Ok(()) => {
                if !fee.is_empty() {
                    report.fees.insert(account, fee);
                }
            }
            Err(error) => {
                warn!(shard, account = %account, %error, "Fee charge failed");
                report.failures.push(SettlementFailure {
                    account,
                    order_id: None,
                    error,
                });
            }
        }
        report.transfers.extend(transfers);
    }

    debug!(shard, applied = report.applied, failed = report.failures.len(), "Shard drained");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use types::fee::FeeSchedule;
    use types::ids::Symbol;
    use types::transfer::TransferEvent;

    fn unlock(account: &str, id: &str, asset: &str, qty: i64) -> Transfer {
        Transfer {
            order_id: OrderId::new(id),
            event: TransferEvent::PartiallyCancel,
            account: AccountId::new(account),
            symbol: Symbol::new("XYZ-000_BNB"),
            in_asset: asset.to_string(),
            in_qty: qty,
            out_asset: asset.to_string(),
            out_qty: qty,
            unlock_qty: qty,
            fee: Fee::new(),
        }
    }

    #[test]
    fn test_shard_of_is_stable() {
        let account = AccountId::new("bnb1shard");
        let first = shard_of(&account, 8);
        assert!(first < 8);
        assert_eq!(shard_of(&account, 8), first);
        assert_eq!(shard_of(&account, 1), 0);
        assert_eq!(shard_of(&account, 0), 0);
    }

    #[test]
    fn test_settle_applies_and_reports() {
        let ledger = InMemoryLedger::new();
        for name in ["a", "b", "c"] {
            let account = AccountId::new(name);
            ledger.deposit(&account, "BNB", 100).unwrap();
            ledger.lock_funds(&account, "BNB", 100).unwrap();
        }
        let calc = FeeCalculator::new(FeeSchedule::default());

        let report = settle(&ledger, &calc, 4, |router| {
            router.route(unlock("c", "c-1", "BNB", 40));
            router.route(unlock("a", "a-1", "BNB", 100));
            router.route(unlock("b", "b-1", "BNB", 101));
        });

        assert_eq!(report.applied, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].account, AccountId::new("b"));
        let accounts: Vec<&str> = report.transfers.iter().map(|t| t.account.as_str()).collect();
        assert_eq!(accounts, vec!["a", "c"]);
        assert!(report.total_fee.is_empty());
        assert_eq!(ledger.balance(&AccountId::new("c"), "BNB").free, 40);
    }

    #[test]
    fn test_shard_count_does_not_change_outcome() {
        let run = |shards: usize| {
            let ledger = InMemoryLedger::new();
            let calc = FeeCalculator::new(FeeSchedule::default());
            for i in 0..20 {
                let account = AccountId::new(format!("acc-{i}"));
                ledger.deposit(&account, "BNB", 1_000_000).unwrap();
                ledger.lock_funds(&account, "BNB", 1_000_000).unwrap();
            }
            let report = settle(&ledger, &calc, shards, |router| {
                for i in 0..20 {
                    let mut t = unlock(&format!("acc-{i}"), &format!("o-{i}"), "BNB", 500_000);
                    t.event = TransferEvent::FullyCancel;
                    router.route(t);
                }
            });
            (report, ledger.balances())
        };
        let (one, balances_one) = run(1);
        let (many, balances_many) = run(16);
        assert_eq!(one, many);
        assert_eq!(balances_one, balances_many);
        assert_eq!(one.total_fee.amount_of("BNB"), 20 * 20_000);
    }
}
