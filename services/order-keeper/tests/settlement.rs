use std::time::Duration;

use order_keeper::{settle, shard_of, Balance, FeeCalculator, InMemoryLedger, Ledger};
use parking_lot::Mutex;
use types::errors::LedgerError;
use types::fee::{Fee, FeeSchedule};
use types::ids::{AccountId, OrderId, Symbol};
use types::transfer::{Transfer, TransferEvent};

const SHARDS: usize = 4;

/// Ledger that stalls on one account and records the order transfers land in
struct SlowLedger {
    inner: InMemoryLedger,
    slow: AccountId,
    delay: Duration,
    applied: Mutex<Vec<(AccountId, OrderId)>>,
}

impl Ledger for SlowLedger {
    fn balance(&self, account: &AccountId, asset: &str) -> Balance {
        self.inner.balance(account, asset)
    }

    fn lock_funds(&self, account: &AccountId, asset: &str, amount: i64) -> Result<(), LedgerError> {
        self.inner.lock_funds(account, asset, amount)
    }

    fn unlock_funds(&self, account: &AccountId, asset: &str, amount: i64) -> Result<(), LedgerError> {
        self.inner.unlock_funds(account, asset, amount)
    }

    fn apply_transfer(&self, transfer: &Transfer) -> Result<(), LedgerError> {
        if transfer.account == self.slow {
            std::thread::sleep(self.delay);
        }
        self.inner.apply_transfer(transfer)?;
        self.applied
            .lock()
            .push((transfer.account.clone(), transfer.order_id.clone()));
        Ok(())
    }

    fn charge_fee(&self, account: &AccountId, fee: &Fee) -> Result<(), LedgerError> {
        self.inner.charge_fee(account, fee)
    }
}

fn accounts_on_different_shards() -> (AccountId, AccountId) {
    let first = AccountId::new("acct-0");
    let other = (1..)
        .map(|i| AccountId::new(format!("acct-{i}")))
        .find(|a| shard_of(a, SHARDS) != shard_of(&first, SHARDS))
        .unwrap();
    (first, other)
}

fn fill(account: &AccountId, seq: u64) -> Transfer {
    Transfer {
        order_id: OrderId::generate(account, seq),
        event: TransferEvent::Filled,
        account: account.clone(),
        symbol: Symbol::new("XYZ-000_BNB"),
        in_asset: "XYZ-000".into(),
        in_qty: 1_000,
        out_asset: "BNB".into(),
        out_qty: 1_000,
        unlock_qty: 1_000,
        fee: Fee::new(),
    }
}

fn funded(slow: &AccountId, fast: &AccountId, delay: Duration) -> SlowLedger {
    let inner = InMemoryLedger::new();
    for account in [slow, fast] {
        inner.deposit(account, "BNB", 100_000).unwrap();
        inner.lock_funds(account, "BNB", 10_000).unwrap();
    }
    SlowLedger {
        inner,
        slow: slow.clone(),
        delay,
        applied: Mutex::new(Vec::new()),
    }
}

#[test]
fn test_account_order_preserved_under_delay() {
    let (slow, fast) = accounts_on_different_shards();
    let ledger = funded(&slow, &fast, Duration::from_millis(5));
    let calc = FeeCalculator::new(FeeSchedule::default());

    let report = settle(&ledger, &calc, SHARDS, |router| {
        for seq in 1..=5 {
            router.route(fill(&slow, seq));
            router.route(fill(&fast, seq));
        }
    });
    assert_eq!(report.applied, 10);
    assert!(report.failures.is_empty());

    let applied = ledger.applied.lock().clone();
    for account in [&slow, &fast] {
        let seqs: Vec<OrderId> = applied
            .iter()
            .filter(|(a, _)| a == account)
            .map(|(_, id)| id.clone())
            .collect();
        let expected: Vec<OrderId> = (1..=5).map(|seq| OrderId::generate(account, seq)).collect();
        assert_eq!(seqs, expected);
    }
}

#[test]
fn test_slow_account_does_not_block_other_shards() {
    let (slow, fast) = accounts_on_different_shards();
    let ledger = funded(&slow, &fast, Duration::from_millis(40));
    let calc = FeeCalculator::new(FeeSchedule::default());

    settle(&ledger, &calc, SHARDS, |router| {
        for seq in 1..=5 {
            router.route(fill(&slow, seq));
        }
        for seq in 1..=5 {
            router.route(fill(&fast, seq));
        }
    });

    let applied = ledger.applied.lock().clone();
    let last_fast = applied.iter().rposition(|(a, _)| a == &fast).unwrap();
    let last_slow = applied.iter().rposition(|(a, _)| a == &slow).unwrap();
    assert!(
        last_fast < last_slow,
        "fast shard waited on the slow one: {applied:?}"
    );
}

#[test]
fn test_fees_charged_after_account_drains() {
    let (slow, fast) = accounts_on_different_shards();
    let ledger = funded(&slow, &fast, Duration::from_millis(1));
    let schedule = FeeSchedule {
        fee_rate: 100_000,
        ..FeeSchedule::default()
    };
    let calc = FeeCalculator::new(schedule);

    let report = settle(&ledger, &calc, SHARDS, |router| {
        for seq in 1..=3 {
            router.route(fill(&slow, seq));
        }
    });

    // 10% of each 1_000 received, paid in the received asset
    assert_eq!(report.fees[&slow].amount_of("XYZ-000"), 300);
    assert_eq!(report.total_fee.amount_of("XYZ-000"), 300);
    assert_eq!(ledger.balance(&slow, "XYZ-000"), Balance { free: 2_700, locked: 0 });
    assert_eq!(ledger.balance(&slow, "BNB"), Balance { free: 90_000, locked: 7_000 });
}
