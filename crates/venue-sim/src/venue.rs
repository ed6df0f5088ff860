use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sentinel_core::{
    AccountSummary, ContractQuote, Instrument, LegAck, LegOrder, LegStatus, OptionContract,
    OptionRight, OrderSide, OrderType, QuoteSnapshot, VenueAdapter, VenuePosition,
    UNDERLYING_CONTRACT_ID,
};
use tracing::info;

const TIME_VALUE: Decimal = dec!(7.50);
const MIN_PREMIUM: Decimal = dec!(0.05);

#[derive(Debug)]
struct Inner {
    /// Index of the next scripted price to serve.
    cursor: usize,
    /// Price most recently served by `quote_snapshot`; options are priced
    /// off this.
    last_price: Decimal,
    /// Contracts discovered through `option_chain`, by id.
    contracts: HashMap<i64, OptionContract>,
    /// Net quantity and average cost per held contract id.
    positions: HashMap<i64, (Decimal, Decimal)>,
    order_seq: u64,
}

/// Deterministic in-process venue.
///
/// Each `quote_snapshot` call advances through the scripted price path and
/// holds the final price once exhausted. Option premiums follow a flat
/// intrinsic-plus-time-value model so they move with the underlying.
pub struct SimVenue {
    history: Vec<Decimal>,
    script: Vec<Decimal>,
    strike_step: Decimal,
    spread: Decimal,
    first_expiry: NaiveDate,
    reject_contracts: Vec<i64>,
    inner: Mutex<Inner>,
}

impl SimVenue {
    #[must_use]
    pub fn new(history: Vec<Decimal>, script: Vec<Decimal>) -> Self {
        let last_price = script
            .first()
            .or_else(|| history.last())
            .copied()
            .unwrap_or(Decimal::ZERO);
        Self {
            history,
            script,
            strike_step: dec!(5),
            spread: dec!(0.10),
            first_expiry: Utc::now().date_naive() + ChronoDuration::days(7),
            reject_contracts: Vec::new(),
            inner: Mutex::new(Inner {
                cursor: 0,
                last_price,
                contracts: HashMap::new(),
                positions: HashMap::new(),
                order_seq: 0,
            }),
        }
    }

    #[must_use]
    pub fn with_strike_step(mut self, step: Decimal) -> Self {
        self.strike_step = step;
        self
    }

    #[must_use]
    pub fn with_first_expiry(mut self, expiry: NaiveDate) -> Self {
        self.first_expiry = expiry;
        self
    }

    /// Marks contract ids whose entry legs the venue will reject.
    #[must_use]
    pub fn with_rejected_contracts(mut self, contract_ids: Vec<i64>) -> Self {
        self.reject_contracts = contract_ids;
        self
    }

    fn last_price(&self) -> Decimal {
        self.inner.lock().expect("sim venue lock").last_price
    }

    /// Flat pricing model: intrinsic value plus a fixed time value, floored
    /// at the minimum premium.
    fn premium(&self, contract: &OptionContract) -> Decimal {
        let spot = self.last_price();
        let intrinsic = match contract.right {
            OptionRight::Call => spot - contract.strike,
            OptionRight::Put => contract.strike - spot,
        };
        (intrinsic + TIME_VALUE).max(MIN_PREMIUM).round_dp(2)
    }

    fn fill_price(&self, contract_id: i64, side: OrderSide) -> Decimal {
        let half = self.spread / dec!(2);
        let mid = if contract_id == UNDERLYING_CONTRACT_ID {
            self.last_price()
        } else {
            let contract = self
                .inner
                .lock()
                .expect("sim venue lock")
                .contracts
                .get(&contract_id)
                .cloned();
            contract.map_or(Decimal::ZERO, |c| self.premium(&c))
        };
        match side {
            OrderSide::Buy => mid + half,
            OrderSide::Sell => mid - half,
        }
    }
}

#[async_trait]
impl VenueAdapter for SimVenue {
    async fn quote_snapshot(&self, _instrument: &Instrument) -> Result<QuoteSnapshot> {
        let mut inner = self.inner.lock().expect("sim venue lock");
        if let Some(price) = self.script.get(inner.cursor) {
            inner.cursor += 1;
            inner.last_price = *price;
        }
        let half = self.spread / dec!(2);
        Ok(QuoteSnapshot {
            price: inner.last_price,
            bid: Some(inner.last_price - half),
            ask: Some(inner.last_price + half),
            timestamp: Utc::now(),
        })
    }

    async fn historical_bars(&self, _instrument: &Instrument, bars: usize) -> Result<Vec<Decimal>> {
        let start = self.history.len().saturating_sub(bars);
        Ok(self.history[start..].to_vec())
    }

    async fn option_chain(
        &self,
        instrument: &Instrument,
        reference: Decimal,
        right: OptionRight,
        strikes: usize,
        expiries: usize,
    ) -> Result<Vec<OptionContract>> {
        // First OTM strike on the requested side of the reference, then step
        // outward.
        let step = self.strike_step;
        let base = match right {
            OptionRight::Call => (reference / step).floor() * step + step,
            OptionRight::Put => (reference / step).ceil() * step - step,
        };

        let mut contracts = Vec::new();
        let mut inner = self.inner.lock().expect("sim venue lock");
        for e in 0..expiries {
            let expiry = self.first_expiry + ChronoDuration::weeks(e as i64);
            for i in 0..strikes {
                let offset = step * Decimal::from(i as u64);
                let strike = match right {
                    OptionRight::Call => base + offset,
                    OptionRight::Put => base - offset,
                };
                let contract_id = 1_000 * (e as i64 + 1) + i as i64;
                let contract = OptionContract {
                    contract_id,
                    symbol: instrument.symbol.clone(),
                    expiry,
                    strike,
                    right,
                    multiplier: dec!(100),
                };
                inner.contracts.insert(contract_id, contract.clone());
                contracts.push(contract);
            }
        }
        Ok(contracts)
    }

    async fn option_quotes(&self, contract_ids: &[i64]) -> Result<Vec<ContractQuote>> {
        let half = self.spread / dec!(2);
        let contracts = {
            let inner = self.inner.lock().expect("sim venue lock");
            contract_ids
                .iter()
                .filter_map(|id| inner.contracts.get(id).cloned())
                .collect::<Vec<_>>()
        };
        Ok(contracts
            .into_iter()
            .map(|contract| {
                let mid = self.premium(&contract);
                ContractQuote {
                    contract_id: contract.contract_id,
                    bid: Some((mid - half).max(Decimal::ZERO)),
                    ask: Some(mid + half),
                    last: Some(mid),
                    volume: 100,
                }
            })
            .collect())
    }

    async fn submit_order(&self, legs: &[LegOrder]) -> Result<Vec<LegAck>> {
        let mut acks = Vec::with_capacity(legs.len());
        for leg in legs {
            if self.reject_contracts.contains(&leg.contract_id) {
                acks.push(LegAck {
                    contract_id: leg.contract_id,
                    order_id: None,
                    status: LegStatus::Rejected,
                    filled_quantity: Decimal::ZERO,
                    avg_fill_price: None,
                    reason: Some("rejected by simulated venue".to_string()),
                });
                continue;
            }

            let price = match leg.order_type {
                OrderType::Limit { price } => price,
                OrderType::Market => self.fill_price(leg.contract_id, leg.side),
            };

            let mut inner = self.inner.lock().expect("sim venue lock");
            inner.order_seq += 1;
            let order_id = format!("SIM-{}", inner.order_seq);
            let signed = match leg.side {
                OrderSide::Buy => leg.quantity,
                OrderSide::Sell => -leg.quantity,
            };
            let entry = inner
                .positions
                .entry(leg.contract_id)
                .or_insert((Decimal::ZERO, price));
            entry.0 += signed;
            entry.1 = price;

            info!(%order_id, contract_id = leg.contract_id, price = %price, "simulated fill");
            acks.push(LegAck {
                contract_id: leg.contract_id,
                order_id: Some(order_id),
                status: LegStatus::Filled,
                filled_quantity: leg.quantity,
                avg_fill_price: Some(price),
                reason: None,
            });
        }
        Ok(acks)
    }

    async fn cancel_order(&self, _order_id: &str) -> Result<()> {
        Ok(())
    }

    async fn close_position(
        &self,
        contract_id: i64,
        quantity: Decimal,
        order_type: OrderType,
    ) -> Result<LegAck> {
        // Covering side follows the sign of the held position: shorts buy
        // back, longs sell out.
        let side = {
            let inner = self.inner.lock().expect("sim venue lock");
            match inner.positions.get(&contract_id) {
                Some((held, _)) if *held < Decimal::ZERO => OrderSide::Buy,
                Some(_) => OrderSide::Sell,
                None => bail!("no position for contract {contract_id}"),
            }
        };
        let price = match order_type {
            OrderType::Limit { price } => price,
            OrderType::Market => self.fill_price(contract_id, side),
        };

        let mut inner = self.inner.lock().expect("sim venue lock");
        let Some(held) = inner.positions.get_mut(&contract_id) else {
            bail!("no position for contract {contract_id}");
        };
        match side {
            OrderSide::Sell => held.0 -= quantity,
            OrderSide::Buy => held.0 += quantity,
        }
        if held.0 == Decimal::ZERO {
            inner.positions.remove(&contract_id);
        }
        inner.order_seq += 1;
        let order_id = format!("SIM-{}", inner.order_seq);

        Ok(LegAck {
            contract_id,
            order_id: Some(order_id),
            status: LegStatus::Filled,
            filled_quantity: quantity,
            avg_fill_price: Some(price),
            reason: None,
        })
    }

    async fn account_summary(&self) -> Result<AccountSummary> {
        Ok(AccountSummary {
            net_liquidation: dec!(100000),
            available_funds: dec!(50000),
            buying_power: dec!(200000),
            unrealized_pnl: Decimal::ZERO,
        })
    }

    async fn positions(&self) -> Result<Vec<VenuePosition>> {
        let inner = self.inner.lock().expect("sim venue lock");
        Ok(inner
            .positions
            .iter()
            .map(|(id, (quantity, avg_cost))| {
                let (symbol, description) = inner.contracts.get(id).map_or_else(
                    || ("UNDERLYING".to_string(), format!("contract {id}")),
                    |c| (c.symbol.clone(), c.display_name()),
                );
                VenuePosition {
                    contract_id: *id,
                    symbol,
                    description,
                    quantity: *quantity,
                    avg_cost: *avg_cost,
                    market_price: None,
                    unrealized_pnl: None,
                }
            })
            .collect())
    }
}
