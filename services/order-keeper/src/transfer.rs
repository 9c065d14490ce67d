//! Transfer construction
//!
//! Trades produce one transfer per side. Removals (cancel, expiry, IOC sweep,
//! fail-safe cancel) produce a single transfer that moves the order's
//! remaining lock back to free balance by using the same asset on both legs.

use types::numeric::{notional, NumericError};
use types::order::{OrderInfo, Side};
use types::trade::Trade;
use types::transfer::{Transfer, TransferEvent};

/// Seller and buyer transfers for one trade
///
/// `buy` must reflect the buy order as of this trade; only its sender and
/// limit price are read, the cumulative quantity comes from the trade. The
/// buyer's unlock is the slice of its original lock covering this fill, so
/// any price improvement returns to free balance.
pub fn from_trade(trade: &Trade, buy: &OrderInfo, sell: &OrderInfo) -> Result<(Transfer, Transfer), NumericError> {
    let base = buy.symbol.base_asset().to_string();
    let quote = buy.symbol.quote_asset().to_string();

    let quote_qty = notional(trade.price, trade.qty)?;
    let prior_cum = trade.buy_cum_qty - trade.qty;
    let unlock = notional(buy.price, trade.buy_cum_qty)? - notional(buy.price, prior_cum)?;

    let seller = Transfer {
        order_id: trade.sid.clone(),
        event: TransferEvent::Filled,
        account: sell.sender.clone(),
        symbol: sell.symbol.clone(),
        in_asset: quote.clone(),
        in_qty: quote_qty,
        out_asset: base.clone(),
        out_qty: trade.qty.raw(),
        unlock_qty: trade.qty.raw(),
        fee: Default::default(),
    };
    let buyer = Transfer {
        order_id: trade.bid.clone(),
        event: TransferEvent::Filled,
        account: buy.sender.clone(),
        symbol: buy.symbol.clone(),
        in_asset: base,
        in_qty: trade.qty.raw(),
        out_asset: quote,
        out_qty: quote_qty,
        unlock_qty: unlock,
        fee: Default::default(),
    };
    Ok((seller, buyer))
}

pub fn from_expired(order: &OrderInfo) -> Result<Transfer, NumericError> {
    let event = match (order.has_fills(), order.is_ioc()) {
        (true, true) => TransferEvent::IocPartiallyExpire,
        (true, false) => TransferEvent::PartiallyExpire,
        (false, true) => TransferEvent::IocFullyExpire,
        (false, false) => TransferEvent::FullyExpire,
    };
    from_removed(order, event)
}

pub fn from_canceled(order: &OrderInfo, match_failure: bool) -> Result<Transfer, NumericError> {
    let event = if match_failure {
        TransferEvent::CancelForMatchFailure
    } else if order.has_fills() {
        TransferEvent::PartiallyCancel
    } else {
        TransferEvent::FullyCancel
    };
    from_removed(order, event)
}

fn from_removed(order: &OrderInfo, event: TransferEvent) -> Result<Transfer, NumericError> {
    let leaves = order.leaves_qty();
    let (asset, unlock) = match order.side {
        Side::BUY => {
            let filled = order.quantity - leaves;
            let amount = notional(order.price, order.quantity)? - notional(order.price, filled)?;
            (order.symbol.quote_asset().to_string(), amount)
        }
        Side::SELL => (order.symbol.base_asset().to_string(), leaves.raw()),
    };
    Ok(Transfer {
        order_id: order.id.clone(),
        event,
        account: order.sender.clone(),
        symbol: order.symbol.clone(),
        in_asset: asset.clone(),
        in_qty: unlock,
        out_asset: asset,
        out_qty: unlock,
        unlock_qty: unlock,
        fee: Default::default(),
    })
}
