use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::instrument::{Instrument, OptionContract, OptionRight};

/// Contract id conventionally used for the watched underlying itself in
/// multi-leg orders and quote batches.
pub const UNDERLYING_CONTRACT_ID: i64 = 0;

/// A point-in-time quote for an underlying.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub price: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

/// Fresh quote fields for one cached option contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractQuote {
    pub contract_id: i64,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub last: Option<Decimal>,
    pub volume: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit { price: Decimal },
}

/// One leg of an order group submitted to the venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegOrder {
    pub contract_id: i64,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub order_type: OrderType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegStatus {
    Filled,
    Submitted,
    Rejected,
}

/// Per-leg acknowledgement from the venue. Each leg is acked independently;
/// one rejected leg never fails the order group's other legs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegAck {
    pub contract_id: i64,
    pub order_id: Option<String>,
    pub status: LegStatus,
    pub filled_quantity: Decimal,
    pub avg_fill_price: Option<Decimal>,
    pub reason: Option<String>,
}

/// Venue account snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    pub net_liquidation: Decimal,
    pub available_funds: Decimal,
    pub buying_power: Decimal,
    pub unrealized_pnl: Decimal,
}

/// A position as reported by the venue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenuePosition {
    pub contract_id: i64,
    pub symbol: String,
    pub description: String,
    pub quantity: Decimal,
    pub avg_cost: Decimal,
    pub market_price: Option<Decimal>,
    pub unrealized_pnl: Option<Decimal>,
}

/// Capability interface toward the brokerage/market-data venue.
///
/// The engine consumes this adapter's data and order operations; it does not
/// implement venue connectivity itself. Every call may block or fail and is
/// issued under a timeout by the caller.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Current quote for an underlying.
    async fn quote_snapshot(&self, instrument: &Instrument) -> Result<QuoteSnapshot>;

    /// Ordered close series, oldest to newest, at most `bars` entries.
    async fn historical_bars(&self, instrument: &Instrument, bars: usize) -> Result<Vec<Decimal>>;

    /// Out-of-the-money option contracts nearest to `reference`, spanning the
    /// nearest `expiries` expiration dates with `strikes` strikes each.
    async fn option_chain(
        &self,
        instrument: &Instrument,
        reference: Decimal,
        right: OptionRight,
        strikes: usize,
        expiries: usize,
    ) -> Result<Vec<OptionContract>>;

    /// Batch quote snapshot for previously discovered contracts.
    async fn option_quotes(&self, contract_ids: &[i64]) -> Result<Vec<ContractQuote>>;

    /// Submit an order group. Each leg is acked independently.
    async fn submit_order(&self, legs: &[LegOrder]) -> Result<Vec<LegAck>>;

    /// Cancel a resting order.
    async fn cancel_order(&self, order_id: &str) -> Result<()>;

    /// Close `quantity` of a held contract.
    async fn close_position(
        &self,
        contract_id: i64,
        quantity: Decimal,
        order_type: OrderType,
    ) -> Result<LegAck>;

    /// Account balance and margin figures.
    async fn account_summary(&self) -> Result<AccountSummary>;

    /// Positions currently held at the venue.
    async fn positions(&self) -> Result<Vec<VenuePosition>>;
}
