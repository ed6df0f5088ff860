use rust_decimal::Decimal;
use sentinel_core::{LegSizing, OrderSide};

/// A leg resolved against the ladder (or the underlying quote), ready to be
/// sized. The ask is the last-known value from the cache, not a fresh fetch.
#[derive(Debug, Clone)]
pub struct LegQuote {
    pub contract_id: i64,
    pub description: String,
    pub side: OrderSide,
    pub ask: Option<Decimal>,
    pub multiplier: Decimal,
}

/// A resolved leg together with its sizing rule.
#[derive(Debug, Clone)]
pub struct PlannedLeg {
    pub quote: LegQuote,
    pub sizing: LegSizing,
}

/// A leg sized to whole contracts.
#[derive(Debug, Clone)]
pub struct SizedLeg {
    pub contract_id: i64,
    pub description: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub multiplier: Decimal,
    /// Ask the sizing was computed from.
    pub ask: Decimal,
}

impl SizedLeg {
    /// Dollar notional at the sizing ask, for display and confirmation.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.ask * self.quantity * self.multiplier
    }
}

/// A leg dropped from the order, with the reason it was dropped. Excluded
/// legs are always reported to the operator, never silently discarded.
#[derive(Debug, Clone)]
pub struct ExcludedLeg {
    pub description: String,
    pub reason: String,
}

/// Size one leg. Amount-based legs take `floor(amount / (ask * multiplier))`
/// contracts, minimum 1. Quantity-based legs pass the quantity through as
/// given. Either way a missing or non-positive ask excludes the leg.
pub fn size_leg(leg: &PlannedLeg) -> Result<SizedLeg, ExcludedLeg> {
    let quote = &leg.quote;
    let ask = match quote.ask {
        Some(ask) if ask > Decimal::ZERO => ask,
        Some(ask) => {
            return Err(ExcludedLeg {
                description: quote.description.clone(),
                reason: format!("non-positive ask {ask}"),
            });
        }
        None => {
            return Err(ExcludedLeg {
                description: quote.description.clone(),
                reason: "no ask available".to_string(),
            });
        }
    };

    let quantity = match leg.sizing {
        LegSizing::Amount { amount } => {
            let per_contract = ask * quote.multiplier;
            let q = (amount / per_contract).floor();
            q.max(Decimal::ONE)
        }
        LegSizing::Quantity { quantity } => {
            if quantity <= Decimal::ZERO {
                return Err(ExcludedLeg {
                    description: quote.description.clone(),
                    reason: format!("non-positive quantity {quantity}"),
                });
            }
            quantity
        }
    };

    Ok(SizedLeg {
        contract_id: quote.contract_id,
        description: quote.description.clone(),
        side: quote.side,
        quantity,
        multiplier: quote.multiplier,
        ask,
    })
}
