//! Per-block matching round
//!
//! Symbols with new orders are pushed onto a shared queue and drained by a
//! bounded pool of workers. A worker owns a symbol's state for the whole of
//! its match, then routes the resulting transfers to the settlement shards.
//! The round returns once every worker has finished.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::thread;

use matching_engine::AllocationRegime;
use parking_lot::Mutex;
use tracing::{debug, error, warn};
use types::ids::{OrderId, Symbol};
use types::numeric::{NumericError, Price, Quantity};
use types::order::{ChangeKind, OrderChange, Side};
use types::trade::Trade;
use types::transfer::Transfer;

use crate::registry::SymbolState;
use crate::settlement::ShardRouter;
use crate::transfer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundContext {
    pub height: i64,
    pub timestamp: i64,
    pub regime: AllocationRegime,
}

/// What one symbol's match produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolOutcome {
    pub symbol: Symbol,
    pub trades: Vec<Trade>,
    pub changes: Vec<OrderChange>,
    pub last_trade_price: Price,
    /// The pass failed and this round's orders were canceled
    pub failed: bool,
}

/// Match every given symbol on up to `workers` threads
///
/// Outcomes come back sorted by symbol. Without a router nothing is settled,
/// which is how replay runs the same code path.
pub fn run_matching(
    states: Vec<&mut SymbolState>,
    ctx: RoundContext,
    workers: usize,
    router: Option<&ShardRouter>,
) -> Vec<SymbolOutcome> {
    let pool = workers.max(1).min(states.len());
    let queue = Mutex::new(states.into_iter().collect::<VecDeque<_>>());
    let outcomes = Mutex::new(Vec::new());

    thread::scope(|s| {
        for worker in 0..pool {
            let router = router.cloned();
            let queue = &queue;
            let outcomes = &outcomes;
            s.spawn(move || loop {
                let Some(state) = queue.lock().pop_front() else {
                    break;
                };
                debug!(worker, symbol = %state.symbol(), height = ctx.height, "Matching symbol");
                let outcome = match_symbol(state, ctx, router.as_ref());
                outcomes.lock().push(outcome);
            });
        }
    });

    let mut outcomes = outcomes.into_inner();
    outcomes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    outcomes
}

/// Run one symbol's auction and apply the result to its order records
///
/// Every transfer the pass produces is built before any record changes. If
/// one cannot be built the pass is reverted and handled like a failed match.
pub fn match_symbol(state: &mut SymbolState, ctx: RoundContext, router: Option<&ShardRouter>) -> SymbolOutcome {
    let symbol = state.symbol().clone();
    let result = state
        .engine
        .match_orders(ctx.height, ctx.regime)
        .map(|trades| trades.to_vec());

    let outcome = match result {
        Ok(trades) => match plan_transfers(state, &trades) {
            Ok(planned) => {
                let mut changes = record_fills(state, &trades, ctx);
                for transfer in planned.trades {
                    emit(router, transfer);
                }
                changes.extend(sweep_ioc(state, planned.ioc, router));
                SymbolOutcome {
                    symbol,
                    trades,
                    changes,
                    last_trade_price: state.engine.last_trade_price(),
                    failed: false,
                }
            }
            Err(err) => {
                error!(symbol = %symbol, height = ctx.height, error = %err, "Transfer overflow, canceling round orders");
                if let Err(err) = state.engine.revert_last_match() {
                    error!(symbol = %symbol, error = %err, "Match revert failed");
                }
                fail_round(state, symbol, router)
            }
        },
        Err(err) => {
            error!(symbol = %symbol, height = ctx.height, error = %err, "Match failed, canceling round orders");
            fail_round(state, symbol, router)
        }
    };
    state.clear_round();
    outcome
}

fn fail_round(state: &mut SymbolState, symbol: Symbol, router: Option<&ShardRouter>) -> SymbolOutcome {
    let changes = cancel_round(state, router);
    SymbolOutcome {
        symbol,
        trades: Vec::new(),
        changes,
        last_trade_price: state.engine.last_trade_price(),
        failed: true,
    }
}

/// Transfers a successful pass routes
struct PlannedTransfers {
    trades: Vec<Transfer>,
    /// Releases for this round's IOC orders that keep unfilled quantity
    ioc: BTreeMap<OrderId, Transfer>,
}

/// Build the pass's transfers from the records as they stood before it
///
/// Runs in replay too, so replay fails the same passes live execution did.
fn plan_transfers(state: &SymbolState, trades: &[Trade]) -> Result<PlannedTransfers, NumericError> {
    let mut planned = Vec::with_capacity(trades.len() * 2);
    let mut cum: BTreeMap<&OrderId, Quantity> = BTreeMap::new();
    for trade in trades {
        let (Some(buy), Some(sell)) = (state.orders.get(&trade.bid), state.orders.get(&trade.sid)) else {
            continue;
        };
        let (seller, buyer) = transfer::from_trade(trade, buy, sell)?;
        planned.push(seller);
        planned.push(buyer);
        for (id, qty) in [(&trade.bid, trade.buy_cum_qty), (&trade.sid, trade.sell_cum_qty)] {
            let entry = cum.entry(id).or_insert(qty);
            if qty > *entry {
                *entry = qty;
            }
        }
    }

    let mut ioc = BTreeMap::new();
    for id in &state.round_ioc {
        let Some(order) = state.orders.get(id) else {
            continue;
        };
        let mut swept = order.clone();
        if let Some(qty) = cum.get(id) {
            swept.cum_qty = *qty;
        }
        if swept.leaves_qty().is_zero() {
            continue;
        }
        ioc.insert(id.clone(), transfer::from_expired(&swept)?);
    }
    Ok(PlannedTransfers { trades: planned, ioc })
}

fn emit(router: Option<&ShardRouter>, transfer: Transfer) {
    if let Some(router) = router {
        router.route(transfer);
    }
}

fn touch(state: &mut SymbolState, id: &OrderId, cum: Quantity, ctx: RoundContext) -> bool {
    match state.orders.get_mut(id) {
        Some(order) => {
            order.cum_qty = cum;
            order.last_updated_height = ctx.height;
            order.last_updated_timestamp = ctx.timestamp;
            true
        }
        None => false,
    }
}

fn record_fills(state: &mut SymbolState, trades: &[Trade], ctx: RoundContext) -> Vec<OrderChange> {
    let mut traded = BTreeSet::new();
    for trade in trades {
        if !touch(state, &trade.bid, trade.buy_cum_qty, ctx) || !touch(state, &trade.sid, trade.sell_cum_qty, ctx) {
            error!(symbol = %state.symbol(), bid = %trade.bid, sid = %trade.sid, "Trade references an unknown order");
            continue;
        }
        traded.insert(trade.bid.clone());
        traded.insert(trade.sid.clone());
    }

    let mut changes = Vec::new();
    let filled: BTreeSet<OrderId> = state.engine.drop_filled_orders().into_iter().collect();
    for id in &filled {
        state.orders.remove(id);
    }
    for id in traded {
        let kind = if filled.contains(&id) {
            ChangeKind::FullyFilled
        } else {
            ChangeKind::PartiallyFilled
        };
        changes.push(OrderChange::new(id, kind));
    }
    changes
}

/// Remove whatever is left of this round's IOC orders
fn sweep_ioc(
    state: &mut SymbolState,
    mut releases: BTreeMap<OrderId, Transfer>,
    router: Option<&ShardRouter>,
) -> Vec<OrderChange> {
    let mut changes = Vec::new();
    for id in std::mem::take(&mut state.round_ioc) {
        let Some(release) = releases.remove(&id) else {
            continue;
        };
        let order = match state.remove_order(&id) {
            Ok(order) => order,
            Err(err) => {
                warn!(symbol = %state.symbol(), order_id = %id, error = %err, "IOC order missing from book");
                continue;
            }
        };
        let kind = if order.has_fills() {
            ChangeKind::IocExpire
        } else {
            ChangeKind::IocNoFill
        };
        emit(router, release);
        changes.push(OrderChange::new(id, kind));
    }
    changes
}

/// Fail-safe for a pass that errored: cancel every order added this round
///
/// An order whose release cannot be built stays in the book.
fn cancel_round(state: &mut SymbolState, router: Option<&ShardRouter>) -> Vec<OrderChange> {
    let mut changes = Vec::new();
    for id in std::mem::take(&mut state.round_orders) {
        let release = match state.orders.get(&id).map(|o| transfer::from_canceled(o, true)) {
            Some(Ok(release)) => release,
            Some(Err(err)) => {
                error!(symbol = %state.symbol(), order_id = %id, error = %err, "Release overflow, order kept");
                continue;
            }
            None => continue,
        };
        if let Err(err) = state.remove_order(&id) {
            warn!(symbol = %state.symbol(), order_id = %id, error = %err, "Round order missing from book");
            continue;
        }
        emit(router, release);
        changes.push(OrderChange::new(id, ChangeKind::FailedMatching));
    }
    changes
}

/// Remove every order on both sides that entered below `before_height`
///
/// Used by the breathe-block sweep. Returns the expired records, buys first.
/// Releases are built up front; if any overflows nothing is removed.
pub fn expire_orders(
    state: &mut SymbolState,
    before_height: i64,
    router: Option<&ShardRouter>,
) -> Result<Vec<OrderChange>, NumericError> {
    let mut releases = BTreeMap::new();
    for order in state.orders.values() {
        if order.created_height < before_height {
            releases.insert(order.id.clone(), transfer::from_expired(order)?);
        }
    }

    let mut expired: Vec<OrderId> = Vec::new();
    for side in [Side::BUY, Side::SELL] {
        state
            .engine
            .book_mut()
            .remove_orders_before(before_height, side, |_, part| expired.push(part.id));
    }

    let mut changes = Vec::with_capacity(expired.len());
    for id in expired {
        if state.orders.remove(&id).is_none() {
            error!(symbol = %state.symbol(), order_id = %id, "Expired order has no record");
            continue;
        }
        match releases.remove(&id) {
            Some(release) => emit(router, release),
            None => error!(symbol = %state.symbol(), order_id = %id, "Expired order has no release"),
        }
        changes.push(OrderChange::new(id, ChangeKind::Expired));
    }
    Ok(changes)
}
