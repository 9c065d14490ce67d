//! Account ledger collaborator
//!
//! The keeper only needs balances, locks and transfer application. Calls
//! for one account always come from a single settlement shard, so an
//! implementation only has to be safe across accounts.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::errors::LedgerError;
use types::fee::Fee;
use types::ids::AccountId;
use types::transfer::Transfer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub free: i64,
    pub locked: i64,
}

pub trait Ledger: Send + Sync {
    fn balance(&self, account: &AccountId, asset: &str) -> Balance;

    /// Move `amount` from free to locked
    fn lock_funds(&self, account: &AccountId, asset: &str, amount: i64) -> Result<(), LedgerError>;

    /// Move `amount` from locked back to free
    fn unlock_funds(&self, account: &AccountId, asset: &str, amount: i64) -> Result<(), LedgerError>;

    /// Settle one transfer
    ///
    /// Releases `unlock_qty` of `out_asset` from locked, pays `out_qty` of it
    /// away and returns the rest to free, then credits `in_qty` of
    /// `in_asset`. Nothing changes when any step would fail.
    fn apply_transfer(&self, transfer: &Transfer) -> Result<(), LedgerError>;

    /// Deduct `fee` from free balances, all assets or none
    fn charge_fee(&self, account: &AccountId, fee: &Fee) -> Result<(), LedgerError>;
}

type Assets = BTreeMap<String, Balance>;

/// Ledger held in memory, one map entry per account
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    accounts: DashMap<AccountId, Assets>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit free balance (genesis allocations, tests)
    pub fn deposit(&self, account: &AccountId, asset: &str, amount: i64) -> Result<(), LedgerError> {
        let mut assets = self.accounts.entry(account.clone()).or_default();
        let balance = assets.entry(asset.to_string()).or_default();
        balance.free = balance.free.checked_add(amount).ok_or_else(|| overflow(account, asset))?;
        Ok(())
    }

    /// Every balance, sorted by account then asset
    pub fn balances(&self) -> BTreeMap<AccountId, BTreeMap<String, Balance>> {
        self.accounts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Sum of free and locked over all accounts for `asset`
    pub fn total_supply(&self, asset: &str) -> i128 {
        self.accounts
            .iter()
            .filter_map(|entry| entry.value().get(asset).copied())
            .map(|b| i128::from(b.free) + i128::from(b.locked))
            .sum()
    }
}

fn overflow(account: &AccountId, asset: &str) -> LedgerError {
    LedgerError::Overflow {
        account: account.to_string(),
        asset: asset.to_string(),
    }
}

fn insufficient(account: &AccountId, asset: &str, required: i64, available: i64) -> LedgerError {
    LedgerError::InsufficientBalance {
        account: account.to_string(),
        asset: asset.to_string(),
        required,
        available,
    }
}

impl Ledger for InMemoryLedger {
    fn balance(&self, account: &AccountId, asset: &str) -> Balance {
        self.accounts
            .get(account)
            .and_then(|assets| assets.get(asset).copied())
            .unwrap_or_default()
    }

    fn lock_funds(&self, account: &AccountId, asset: &str, amount: i64) -> Result<(), LedgerError> {
        let mut assets = self.accounts.entry(account.clone()).or_default();
        let balance = assets.entry(asset.to_string()).or_default();
        if amount < 0 || balance.free < amount {
            return Err(insufficient(account, asset, amount, balance.free));
        }
        let locked = balance.locked.checked_add(amount).ok_or_else(|| overflow(account, asset))?;
        balance.free -= amount;
        balance.locked = locked;
        Ok(())
    }

    fn unlock_funds(&self, account: &AccountId, asset: &str, amount: i64) -> Result<(), LedgerError> {
        let mut assets = self.accounts.entry(account.clone()).or_default();
        let balance = assets.entry(asset.to_string()).or_default();
        if amount < 0 || balance.locked < amount {
            return Err(LedgerError::LockedUnderflow {
                account: account.to_string(),
                asset: asset.to_string(),
                amount,
                locked: balance.locked,
            });
        }
        let free = balance.free.checked_add(amount).ok_or_else(|| overflow(account, asset))?;
        balance.locked -= amount;
        balance.free = free;
        Ok(())
    }

    fn apply_transfer(&self, t: &Transfer) -> Result<(), LedgerError> {
        let mut assets = self.accounts.entry(t.account.clone()).or_default();

        let out = assets.get(&t.out_asset).copied().unwrap_or_default();
        if out.locked < t.unlock_qty {
            return Err(LedgerError::LockedUnderflow {
                account: t.account.to_string(),
                asset: t.out_asset.clone(),
                amount: t.unlock_qty,
                locked: out.locked,
            });
        }
        if t.unlock_qty < t.out_qty {
            return Err(insufficient(&t.account, &t.out_asset, t.out_qty, t.unlock_qty));
        }
        let refund = t.unlock_qty - t.out_qty;
        let out_after = Balance {
            free: out.free.checked_add(refund).ok_or_else(|| overflow(&t.account, &t.out_asset))?,
            locked: out.locked - t.unlock_qty,
        };
        let in_before = if t.in_asset == t.out_asset {
            out_after
        } else {
            assets.get(&t.in_asset).copied().unwrap_or_default()
        };
        let in_after = Balance {
            free: in_before
                .free
                .checked_add(t.in_qty)
                .ok_or_else(|| overflow(&t.account, &t.in_asset))?,
            locked: in_before.locked,
        };

        assets.insert(t.out_asset.clone(), out_after);
        assets.insert(t.in_asset.clone(), in_after);
        Ok(())
    }

    fn charge_fee(&self, account: &AccountId, fee: &Fee) -> Result<(), LedgerError> {
        if fee.is_empty() {
            return Ok(());
        }
        let mut assets = self.accounts.entry(account.clone()).or_default();
        for (asset, amount) in &fee.tokens {
            let free = assets.get(asset).map(|b| b.free).unwrap_or(0);
            if free < *amount {
                return Err(insufficient(account, asset, *amount, free));
            }
        }
        for (asset, amount) in &fee.tokens {
            if let Some(balance) = assets.get_mut(asset) {
                balance.free -= amount;
            }
        }
        Ok(())
    }
}
