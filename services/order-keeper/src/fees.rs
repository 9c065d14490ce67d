//! Fee calculation and the per-round fee pool
//!
//! Fees for an account are computed only after all of its transfers for the
//! round have been applied, over the transfers sorted by (symbol, order id).
//! Arrival order from the settlement channels therefore never changes what an
//! account pays.

use serde::{Deserialize, Serialize};
use types::fee::{Fee, FeeSchedule};
use types::ids::AccountId;
use types::transfer::{Transfer, TransferEvent};

use crate::ledger::Ledger;

#[derive(Debug, Clone)]
pub struct FeeCalculator {
    schedule: FeeSchedule,
}

impl FeeCalculator {
    pub fn new(schedule: FeeSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> &FeeSchedule {
        &self.schedule
    }

    /// Assign a fee to every transfer of `account` and return their sum
    ///
    /// Trade fees are taken from the received asset. Fixed fees are paid in
    /// the native asset while the account's free native balance covers them,
    /// otherwise from the released asset, capped at the released amount.
    pub fn calculate<L: Ledger + ?Sized>(&self, ledger: &L, account: &AccountId, transfers: &mut [Transfer]) -> Fee {
        transfers.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let native = self.schedule.native_asset.as_str();
        let mut native_left = ledger.balance(account, native).free;
        let mut total = Fee::new();

        for t in transfers.iter_mut() {
            let fee = match self.fixed_fee(t.event) {
                _ if t.fee_free() => Fee::new(),
                None => Fee::single(t.in_asset.clone(), self.schedule.trade_fee(t.in_qty)),
                Some(fixed) if native_left >= fixed => Fee::single(native, fixed),
                Some(fixed) => Fee::single(t.in_asset.clone(), fixed.min(t.in_qty)),
            };
            native_left -= fee.amount_of(native);
            total.add_fee(&fee);
            t.fee = fee;
        }
        total
    }

    fn fixed_fee(&self, event: TransferEvent) -> Option<i64> {
        match event {
            TransferEvent::FullyExpire => Some(self.schedule.expire_fee),
            TransferEvent::IocFullyExpire => Some(self.schedule.ioc_expire_fee),
            TransferEvent::FullyCancel => Some(self.schedule.cancel_fee),
            _ => None,
        }
    }
}

/// Fees collected but not yet distributed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePool {
    collected: Fee,
    last_height: i64,
}

impl FeePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, height: i64, fee: &Fee) {
        if fee.is_empty() {
            return;
        }
        self.collected.add_fee(fee);
        self.last_height = self.last_height.max(height);
    }

    pub fn total(&self) -> &Fee {
        &self.collected
    }

    pub fn last_height(&self) -> i64 {
        self.last_height
    }

    /// Hand the collected fees to the distributor and start over
    pub fn take(&mut self) -> Fee {
        std::mem::take(&mut self.collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use types::ids::{OrderId, Symbol};

    fn acct() -> AccountId {
        AccountId::new("bnb1fee")
    }

    fn transfer(symbol: &str, id: &str, event: TransferEvent, in_asset: &str, in_qty: i64) -> Transfer {
        Transfer {
            order_id: OrderId::new(id),
            event,
            account: acct(),
            symbol: Symbol::new(symbol),
            in_asset: in_asset.to_string(),
            in_qty,
            out_asset: in_asset.to_string(),
            out_qty: in_qty,
            unlock_qty: in_qty,
            fee: Fee::new(),
        }
    }

    fn calc() -> FeeCalculator {
        FeeCalculator::new(FeeSchedule::default())
    }

    #[test]
    fn test_trade_fee_in_received_asset() {
        let ledger = InMemoryLedger::new();
        let mut ts = vec![transfer("XYZ-000_BNB", "o-1", TransferEvent::Filled, "XYZ-000", 10_000_000)];
        let total = calc().calculate(&ledger, &acct(), &mut ts);
        assert_eq!(ts[0].fee, Fee::single("XYZ-000", 10_000));
        assert_eq!(total, Fee::single("XYZ-000", 10_000));
    }

    #[test]
    fn test_fee_free_kinds() {
        let ledger = InMemoryLedger::new();
        ledger.deposit(&acct(), "BNB", 1_000_000).unwrap();
        let mut ts = vec![
            transfer("XYZ-000_BNB", "o-1", TransferEvent::PartiallyCancel, "BNB", 500),
            transfer("XYZ-000_BNB", "o-2", TransferEvent::CancelForMatchFailure, "BNB", 500),
            transfer("XYZ-000_BNB", "o-3", TransferEvent::IocPartiallyExpire, "BNB", 500),
        ];
        assert!(calc().calculate(&ledger, &acct(), &mut ts).is_empty());
    }

    #[test]
    fn test_fixed_fee_falls_back_to_released_asset() {
        let ledger = InMemoryLedger::new();
        ledger.deposit(&acct(), "BNB", 25_000).unwrap();
        let mut ts = vec![
            transfer("BBB_BNB", "o-2", TransferEvent::FullyCancel, "BBB", 5_000),
            transfer("AAA_BNB", "o-1", TransferEvent::FullyExpire, "AAA", 100_000),
        ];
        let total = calc().calculate(&ledger, &acct(), &mut ts);

        // AAA sorts first and takes the native balance
        assert_eq!(ts[0].symbol, Symbol::new("AAA_BNB"));
        assert_eq!(ts[0].fee, Fee::single("BNB", 20_000));
        assert_eq!(ts[1].fee, Fee::single("BBB", 5_000));
        assert_eq!(total.amount_of("BNB"), 20_000);
        assert_eq!(total.amount_of("BBB"), 5_000);
    }

    #[test]
    fn test_arrival_order_does_not_matter() {
        let ledger = InMemoryLedger::new();
        ledger.deposit(&acct(), "BNB", 30_000).unwrap();
        let a = transfer("AAA_BNB", "o-1", TransferEvent::IocFullyExpire, "AAA", 100_000);
        let b = transfer("AAA_BNB", "o-2", TransferEvent::FullyExpire, "AAA", 100_000);
        let c = transfer("CCC_BNB", "o-3", TransferEvent::Filled, "BNB", 2_000_000);

        let mut first = vec![a.clone(), b.clone(), c.clone()];
        let mut second = vec![c, b, a];
        let total_first = calc().calculate(&ledger, &acct(), &mut first);
        let total_second = calc().calculate(&ledger, &acct(), &mut second);
        assert_eq!(total_first, total_second);
        assert_eq!(first, second);
    }

    #[test]
    fn test_fee_pool() {
        let mut pool = FeePool::new();
        pool.add(5, &Fee::single("BNB", 10));
        pool.add(6, &Fee::new());
        pool.add(7, &Fee::single("XYZ", 3));
        assert_eq!(pool.last_height(), 7);
        assert_eq!(pool.total().amount_of("BNB"), 10);

        let taken = pool.take();
        assert_eq!(taken.amount_of("XYZ"), 3);
        assert!(pool.total().is_empty());
    }
}
