//! Liqui payload → domain conversions.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use bourse_domain::{
    AccountBalance, AccountInfo, ApiRights, CurrencyPair, ExchangeInfo, Order, OrderId,
    OrderSide, OrderStatus, OrderbookSnapshot, PairInfo, PairTranslator, PriceLevel,
    TickerSnapshot, Trade, TradeHistoryEntry,
};
use bourse_exec::{ExchangeError, ExchangeResult};

use super::types::{
    LiquiAccountInfo, LiquiDepth, LiquiHistoryEntry, LiquiInfo, LiquiOrder, LiquiTicker,
    LiquiTrade,
};

/// Unix seconds → UTC.
pub fn timestamp(secs: i64) -> ExchangeResult<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| ExchangeError::Decode(format!("timestamp {} out of range", secs)))
}

/// `captured_at` is local receipt time; the venue's `updated` field is ignored.
pub fn ticker(
    pair: CurrencyPair,
    raw: LiquiTicker,
    captured_at: DateTime<Utc>,
) -> ExchangeResult<TickerSnapshot> {
    Ok(TickerSnapshot::new(
        pair,
        raw.sell,
        raw.buy,
        raw.last,
        raw.high,
        raw.low,
        raw.vol_cur,
        captured_at,
    )?)
}

pub fn orderbook(
    pair: CurrencyPair,
    raw: LiquiDepth,
    captured_at: DateTime<Utc>,
) -> ExchangeResult<OrderbookSnapshot> {
    let levels = |side: Vec<(Decimal, Decimal)>| {
        side.into_iter()
            .map(|(price, amount)| PriceLevel::new(price, amount))
            .collect::<Vec<_>>()
    };
    Ok(OrderbookSnapshot::new(
        pair,
        levels(raw.bids),
        levels(raw.asks),
        captured_at,
    )?)
}

pub fn trade(pair: &CurrencyPair, raw: LiquiTrade) -> ExchangeResult<Trade> {
    Ok(Trade {
        id: raw.tid.to_string(),
        pair: pair.clone(),
        side: raw.kind.parse::<OrderSide>()?,
        price: raw.price,
        amount: raw.amount,
        timestamp: timestamp(raw.timestamp)?,
    })
}

/// Pairs the translator cannot resolve are skipped, so metadata for
/// currencies outside the configured set does not fail the whole call.
pub fn exchange_info(raw: LiquiInfo, translator: &PairTranslator) -> ExchangeResult<ExchangeInfo> {
    let pairs: BTreeMap<CurrencyPair, PairInfo> = raw
        .pairs
        .into_iter()
        .filter_map(|(wire, info)| {
            let pair = parse_listed_pair(&wire, translator)?;
            Some((
                pair,
                PairInfo {
                    decimal_places: info.decimal_places,
                    min_price: info.min_price,
                    max_price: info.max_price,
                    min_amount: info.min_amount,
                    hidden: info.hidden == 1,
                    fee_percent: info.fee,
                },
            ))
        })
        .collect();

    Ok(ExchangeInfo {
        server_time: Some(timestamp(raw.server_time)?),
        pairs,
    })
}

/// Listed pairs use the request format; currencies the translator does not
/// know yet fall back to a plain delimiter split.
fn parse_listed_pair(wire: &str, translator: &PairTranslator) -> Option<CurrencyPair> {
    translator
        .from_wire(wire)
        .or_else(|_| translator.formats().request.parse(wire))
        .ok()
}

pub fn balances(funds: HashMap<String, Decimal>) -> AccountBalance {
    funds.into_iter().collect()
}

pub fn account_info(raw: LiquiAccountInfo) -> ExchangeResult<AccountInfo> {
    Ok(AccountInfo {
        balances: balances(raw.funds),
        rights: raw.rights.map(|r| ApiRights {
            info: r.info == 1,
            trade: r.trade == 1,
            withdraw: r.withdraw == 1,
        }),
        open_orders: raw.open_orders,
        transaction_count: raw.transaction_count,
        server_time: raw.server_time.map(timestamp).transpose()?,
    })
}

/// Liqui order status codes: 0 active, 1 executed, 2 cancelled,
/// 3 cancelled after a partial fill.
pub fn order_status(code: i32, remaining: Decimal, start: Option<Decimal>) -> ExchangeResult<OrderStatus> {
    match code {
        0 => match start {
            Some(start) if remaining < start => Ok(OrderStatus::PartiallyFilled),
            _ => Ok(OrderStatus::Open),
        },
        1 => Ok(OrderStatus::Filled),
        2 | 3 => Ok(OrderStatus::Cancelled),
        other => Err(ExchangeError::Decode(format!("unknown order status {}", other))),
    }
}

pub fn order(id: &str, raw: LiquiOrder, translator: &PairTranslator) -> ExchangeResult<Order> {
    let pair = parse_listed_pair(&raw.pair, translator)
        .ok_or_else(|| ExchangeError::InvalidPairFormat(raw.pair.clone()))?;
    Ok(Order {
        id: OrderId::new(id),
        pair,
        side: raw.side.parse()?,
        amount: raw.start_amount.unwrap_or(raw.amount),
        price: raw.rate,
        status: order_status(raw.status, raw.amount, raw.start_amount)?,
        created_at: Some(timestamp(raw.timestamp_created)?),
    })
}

pub fn history_entry(
    trade_id: &str,
    raw: LiquiHistoryEntry,
    translator: &PairTranslator,
) -> ExchangeResult<TradeHistoryEntry> {
    let pair = parse_listed_pair(&raw.pair, translator)
        .ok_or_else(|| ExchangeError::InvalidPairFormat(raw.pair.clone()))?;
    Ok(TradeHistoryEntry {
        trade_id: trade_id.to_string(),
        order_id: OrderId::new(raw.order_id.to_string()),
        pair,
        side: raw.side.parse()?,
        amount: raw.amount,
        price: raw.rate,
        is_maker: raw.is_your_order == 1,
        timestamp: timestamp(raw.timestamp)?,
    })
}

// =============================================================================
// Tests
// =============================================================================
