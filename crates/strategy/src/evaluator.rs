use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use sentinel_core::{
    CrossSide, Direction, EngineError, IndicatorValues, MarketSnapshot, Signal, StrategyKind,
    TriggerState, Watch, ZoneStatus,
};

use crate::indicators::{bollinger, sma};

/// Result of one evaluation pass for a watch.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub snapshot: MarketSnapshot,
    pub trigger: TriggerState,
    /// Present only on the non-active → active edge.
    pub signal: Option<Signal>,
}

/// Edge-trigger state carried across ticks for one watch.
///
/// A signal fires only on the transition into the active zone; re-evaluating
/// with unchanged inputs, or staying inside the band, never re-fires.
#[derive(Debug, Default, Clone)]
pub struct SignalTracker {
    was_active: bool,
}

impl SignalTracker {
    /// Forget the current zone occupancy so the next active tick fires again.
    /// Used by the manual reset-signal operation.
    pub fn reset(&mut self) {
        self.was_active = false;
    }

    fn observe(&mut self, active: bool) -> bool {
        let fired = active && !self.was_active;
        self.was_active = active;
        fired
    }
}

/// Evaluate one tick of a watch: indicator values, trigger zone, and the
/// fired-signal edge.
///
/// # Errors
///
/// `EngineError::DataUnavailable` when the close history is shorter than the
/// watch's required history (primary period + 1, or the confirmation period
/// when longer).
pub fn evaluate(
    watch: &Watch,
    closes: &[Decimal],
    price: Decimal,
    tracker: &mut SignalTracker,
    now: DateTime<Utc>,
) -> Result<Evaluation, EngineError> {
    if closes.len() < watch.required_history() {
        return Err(EngineError::DataUnavailable(format!(
            "{}: {} bars on hand, {} required for the indicator",
            watch.instrument.symbol,
            closes.len(),
            watch.required_history()
        )));
    }
    let prev_closes = &closes[..closes.len() - 1];

    let (indicator, prev_primary) = match watch.strategy {
        StrategyKind::MovingAverage => {
            let value = sma(closes, watch.period).ok_or_else(|| unavailable(watch, "MA"))?;
            let prev = sma(prev_closes, watch.period).ok_or_else(|| unavailable(watch, "MA"))?;
            (IndicatorValues::Ma { value }, prev)
        }
        StrategyKind::Bollinger => {
            let bands = bollinger(closes, watch.period, watch.band_std_dev)
                .ok_or_else(|| unavailable(watch, "bands"))?;
            let prev = sma(prev_closes, watch.period).ok_or_else(|| unavailable(watch, "bands"))?;
            (
                IndicatorValues::Bands {
                    upper: bands.upper,
                    middle: bands.middle,
                    lower: bands.lower,
                },
                prev,
            )
        }
    };

    let confirm_value = match (watch.strategy, watch.confirm_period) {
        (StrategyKind::MovingAverage, Some(period)) => {
            Some(sma(closes, period).ok_or_else(|| unavailable(watch, "confirm MA"))?)
        }
        _ => None,
    };

    let snapshot = MarketSnapshot {
        price,
        indicator,
        prev_primary,
        confirm_value,
        timestamp: now,
    };

    let trigger = trigger_state(watch, &snapshot);
    let fired = tracker.observe(trigger.is_active());

    let signal = fired.then(|| Signal {
        watch_id: watch.id.clone(),
        symbol: watch.instrument.symbol.clone(),
        direction: watch.direction,
        price,
        indicator_value: snapshot.indicator.primary(),
        band_low: trigger.band_low,
        band_high: trigger.band_high,
        confirm_ok: trigger.confirm_ok,
        timestamp: now,
    });

    Ok(Evaluation {
        snapshot,
        trigger,
        signal,
    })
}

fn unavailable(watch: &Watch, what: &str) -> EngineError {
    EngineError::DataUnavailable(format!("{}: {what} not computable", watch.instrument.symbol))
}

/// Derive the trigger zone from a snapshot; deterministic, no state.
fn trigger_state(watch: &Watch, snapshot: &MarketSnapshot) -> TriggerState {
    let n = watch.buffer_points;
    let price = snapshot.price;

    let (status, band_low, band_high) = match snapshot.indicator {
        IndicatorValues::Ma { value: ma } => {
            let ready = snapshot.indicator_direction().agrees_with(watch.direction);
            let (low, high) = match watch.direction {
                Direction::Long => (ma, ma + n),
                Direction::Short => (ma - n, ma),
            };
            let status = if !ready {
                ZoneStatus::Inactive
            } else if price >= low && price <= high {
                ZoneStatus::Active
            } else {
                ZoneStatus::Ready
            };
            (status, low, high)
        }
        IndicatorValues::Bands { upper, lower, .. } => {
            // Band strategy has no directional prerequisite: ready as soon as
            // the bands are computable.
            let (low, high, active) = match watch.direction {
                Direction::Long => (lower, lower + n, price <= lower + n),
                Direction::Short => (upper - n, upper, price >= upper - n),
            };
            let status = if active {
                ZoneStatus::Active
            } else {
                ZoneStatus::Ready
            };
            (status, low, high)
        }
    };

    // Price agreement with the confirmation MA in the watch direction.
    // Surfaced every tick; suppresses auto-trading, never gates `Active`.
    let confirm_ok = snapshot.confirm_value.map(|confirm| match watch.direction {
        Direction::Long => price >= confirm,
        Direction::Short => price <= confirm,
    });

    TriggerState {
        status,
        band_low,
        band_high,
        confirm_ok,
    }
}

/// Whether the underlying crossed a line on the given side (with the offset
/// already folded into `line`). Shared by the exit monitor.
#[must_use]
pub fn crossed(price: Decimal, line: Decimal, side: CrossSide) -> bool {
    match side {
        CrossSide::Above => price > line,
        CrossSide::Below => price < line,
    }
}
