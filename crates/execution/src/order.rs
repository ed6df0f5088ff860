use std::time::Duration;

use chrono::Utc;
use sentinel_core::{
    EngineError, ExitConfig, FilledLeg, LegOrder, LegStatus, OrderType, Trade, TradePhase,
    VenueAdapter, Watch,
};
use tracing::{info, warn};

use crate::sizing::{size_leg, ExcludedLeg, PlannedLeg, SizedLeg};

/// The order as it will be submitted: accepted legs, excluded legs, and any
/// warnings raised during construction.
#[derive(Debug, Clone)]
pub struct OrderPlan {
    pub legs: Vec<SizedLeg>,
    pub excluded: Vec<ExcludedLeg>,
    pub warnings: Vec<String>,
}

/// A leg the venue rejected. The rest of the group stands.
#[derive(Debug, Clone)]
pub struct RejectedLeg {
    pub description: String,
    pub reason: String,
}

/// Outcome of an entry submission. `trade` is `None` only when every leg was
/// rejected.
#[derive(Debug)]
pub struct EntryReport {
    pub trade: Option<Trade>,
    pub rejected: Vec<RejectedLeg>,
}

/// Size every leg and assemble the order plan. Unsizable legs land in
/// `excluded`; a zero-exit-condition configuration is flagged here, before
/// anything is sent.
#[must_use]
pub fn plan_order(legs: &[PlannedLeg], exit: &ExitConfig) -> OrderPlan {
    let mut sized = Vec::new();
    let mut excluded = Vec::new();
    for leg in legs {
        match size_leg(leg) {
            Ok(s) => sized.push(s),
            Err(e) => excluded.push(e),
        }
    }

    let mut warnings = Vec::new();
    if exit.enabled_count() == 0 {
        warnings.push(
            "no exit conditions enabled; the position will stay open until closed manually"
                .to_string(),
        );
    }
    for e in &excluded {
        warnings.push(format!("leg {} excluded: {}", e.description, e.reason));
    }

    OrderPlan {
        legs: sized,
        excluded,
        warnings,
    }
}

/// Submit the plan's legs as one order group sharing a single trade id.
///
/// Submission is never retried; a timeout or venue error surfaces
/// immediately so a fill is never duplicated. Legs are acked independently
/// and a rejected leg does not fail the others.
pub async fn submit_entry(
    adapter: &dyn VenueAdapter,
    watch: &Watch,
    plan: &OrderPlan,
    deadline: Duration,
) -> Result<EntryReport, EngineError> {
    if plan.legs.is_empty() {
        return Err(EngineError::InvalidConfig(
            "no sizable legs to submit".to_string(),
        ));
    }

    let orders: Vec<LegOrder> = plan
        .legs
        .iter()
        .map(|leg| LegOrder {
            contract_id: leg.contract_id,
            side: leg.side,
            quantity: leg.quantity,
            order_type: OrderType::Market,
        })
        .collect();

    let acks = tokio::time::timeout(deadline, adapter.submit_order(&orders))
        .await
        .map_err(|_| EngineError::AdapterTimeout("submit_order"))?
        .map_err(EngineError::Adapter)?;

    let entered_at = Utc::now();
    let trade_id = format!("{}-{}", watch.id, entered_at.timestamp_millis());

    let mut filled = Vec::new();
    let mut rejected = Vec::new();
    for leg in &plan.legs {
        let ack = acks.iter().find(|a| a.contract_id == leg.contract_id);
        match ack {
            Some(ack) if ack.status != LegStatus::Rejected => {
                filled.push(FilledLeg {
                    contract_id: leg.contract_id,
                    description: leg.description.clone(),
                    side: leg.side,
                    quantity: ack.filled_quantity.max(leg.quantity),
                    multiplier: leg.multiplier,
                    fill_price: ack.avg_fill_price.unwrap_or(leg.ask),
                    order_id: ack.order_id.clone(),
                    current_price: None,
                });
            }
            Some(ack) => {
                let reason = ack
                    .reason
                    .clone()
                    .unwrap_or_else(|| "rejected by venue".to_string());
                warn!(leg = %leg.description, %reason, "entry leg rejected");
                rejected.push(RejectedLeg {
                    description: leg.description.clone(),
                    reason,
                });
            }
            None => {
                warn!(leg = %leg.description, "venue returned no ack for leg");
                rejected.push(RejectedLeg {
                    description: leg.description.clone(),
                    reason: "no acknowledgement from venue".to_string(),
                });
            }
        }
    }

    if filled.is_empty() {
        return Ok(EntryReport {
            trade: None,
            rejected,
        });
    }

    let exit = watch.trade_config.exit.clone();
    let phase = if exit.limit.is_some() {
        TradePhase::LimitPending
    } else {
        TradePhase::Filled
    };
    info!(trade_id = %trade_id, legs = filled.len(), "entry order filled");

    Ok(EntryReport {
        trade: Some(Trade {
            id: trade_id,
            watch_id: watch.id.clone(),
            symbol: watch.instrument.symbol.clone(),
            direction: watch.direction,
            legs: filled,
            phase,
            exit,
            entered_at,
            closed_at: None,
            close_reason: None,
        }),
        rejected,
    })
}
