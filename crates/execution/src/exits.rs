use chrono::NaiveTime;
use rust_decimal::Decimal;
use sentinel_core::{
    BandExitTarget, CloseReason, Direction, ExitDelta, FilledLeg, IndicatorValues, MarketSnapshot,
    OrderSide, Trade,
};
use sentinel_strategy::crossed;

/// Take-profit price for one leg: the fill price moved by the configured
/// delta in the leg's profit direction. Bought legs profit upward, sold
/// legs downward.
#[must_use]
pub fn limit_target(leg: &FilledLeg, delta: ExitDelta) -> Decimal {
    let offset = match delta {
        ExitDelta::Points { value } => value,
        ExitDelta::Percent { value } => leg.fill_price * value / Decimal::ONE_HUNDRED,
    };
    match leg.side {
        OrderSide::Buy => leg.fill_price + offset,
        OrderSide::Sell => leg.fill_price - offset,
    }
}

/// Evaluate the trade's exit conditions against one tick.
///
/// Conditions are checked in a fixed precedence order and the first match
/// wins: limit take-profit, then wall-clock time, then MA cross, then band
/// cross. Returns `None` when nothing matched (including the flagged but
/// valid zero-condition configuration).
#[must_use]
pub fn check_exits(trade: &Trade, snapshot: &MarketSnapshot, now: NaiveTime) -> Option<CloseReason> {
    if let Some(limit) = trade.exit.limit {
        if limit_reached(trade, limit.delta) {
            return Some(CloseReason::LimitTarget);
        }
    }

    if let Some(time) = trade.exit.time {
        if now >= time.at {
            return Some(CloseReason::TimeStop);
        }
    }

    if let Some(ma) = trade.exit.ma {
        let line = snapshot.indicator.primary() + ma.offset_points;
        if crossed(snapshot.price, line, ma.side) {
            return Some(CloseReason::MaCross);
        }
    }

    if let Some(band) = trade.exit.band {
        if let IndicatorValues::Bands { upper, middle, lower } = snapshot.indicator {
            let target = match band.target {
                BandExitTarget::Middle => middle,
                // The band opposite the entry side.
                BandExitTarget::Opposite => match trade.direction {
                    Direction::Long => upper,
                    Direction::Short => lower,
                },
            };
            if crossed(snapshot.price, target + band.offset_points, band.side) {
                return Some(CloseReason::BandCross);
            }
        }
    }

    None
}

/// The limit target counts as reached only when every leg has a known quote
/// at or beyond its target. A leg with no quote yet can never satisfy it.
fn limit_reached(trade: &Trade, delta: ExitDelta) -> bool {
    !trade.legs.is_empty()
        && trade.legs.iter().all(|leg| {
            leg.current_price.map_or(false, |price| match leg.side {
                OrderSide::Buy => price >= limit_target(leg, delta),
                OrderSide::Sell => price <= limit_target(leg, delta),
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use sentinel_core::{
        BandExit, CrossSide, ExitConfig, LimitExit, MaExit, TimeExit, TradePhase,
    };

    fn make_leg(fill: Decimal, current: Option<Decimal>) -> FilledLeg {
        leg_with_side(OrderSide::Buy, fill, current)
    }

    fn short_leg(fill: Decimal, current: Option<Decimal>) -> FilledLeg {
        leg_with_side(OrderSide::Sell, fill, current)
    }

    fn leg_with_side(side: OrderSide, fill: Decimal, current: Option<Decimal>) -> FilledLeg {
        FilledLeg {
            contract_id: 1,
            description: "SPY 2026-09-18 605C".to_string(),
            side,
            quantity: dec!(4),
            multiplier: dec!(100),
            fill_price: fill,
            order_id: Some("ord-1".to_string()),
            current_price: current,
        }
    }

    fn make_trade(exit: ExitConfig, legs: Vec<FilledLeg>) -> Trade {
        Trade {
            id: "spy-long-1".to_string(),
            watch_id: "spy-long".into(),
            symbol: "SPY".to_string(),
            direction: Direction::Long,
            legs,
            phase: TradePhase::Filled,
            exit,
            entered_at: Utc.with_ymd_and_hms(2026, 3, 2, 14, 30, 0).unwrap(),
            closed_at: None,
            close_reason: None,
        }
    }

    fn ma_snapshot(price: Decimal, ma: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            price,
            indicator: IndicatorValues::Ma { value: ma },
            prev_primary: ma,
            confirm_value: None,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap(),
        }
    }

    fn noon() -> NaiveTime {
        NaiveTime::from_hms_opt(12, 0, 0).unwrap()
    }

    #[test]
    fn limit_target_points_and_percent() {
        let leg = make_leg(dec!(2.50), None);
        assert_eq!(
            limit_target(&leg, ExitDelta::Points { value: dec!(0.75) }),
            dec!(3.25)
        );
        assert_eq!(
            limit_target(&leg, ExitDelta::Percent { value: dec!(20) }),
            dec!(3.000)
        );
    }

    #[test]
    fn limit_target_moves_down_for_sold_legs() {
        let leg = short_leg(dec!(2.50), None);
        assert_eq!(
            limit_target(&leg, ExitDelta::Points { value: dec!(0.75) }),
            dec!(1.75)
        );
        assert_eq!(
            limit_target(&leg, ExitDelta::Percent { value: dec!(20) }),
            dec!(2.000)
        );
    }

    #[test]
    fn short_leg_limit_fires_on_profit_not_on_loss() {
        let exit = ExitConfig {
            limit: Some(LimitExit {
                delta: ExitDelta::Points { value: dec!(5) },
            }),
            ..ExitConfig::default()
        };
        let snap = ma_snapshot(dec!(100), dec!(100));

        // Sold at 100 with a 5-point target: 105 is a loss, 95 is the take.
        let losing = make_trade(exit.clone(), vec![short_leg(dec!(100), Some(dec!(105)))]);
        assert_eq!(check_exits(&losing, &snap, noon()), None);

        let winning = make_trade(exit, vec![short_leg(dec!(100), Some(dec!(95)))]);
        assert_eq!(
            check_exits(&winning, &snap, noon()),
            Some(CloseReason::LimitTarget)
        );
    }

    #[test]
    fn limit_fires_when_every_leg_reaches_target() {
        let exit = ExitConfig {
            limit: Some(LimitExit {
                delta: ExitDelta::Percent { value: dec!(20) },
            }),
            ..ExitConfig::default()
        };
        let trade = make_trade(exit, vec![make_leg(dec!(2.50), Some(dec!(3.05)))]);
        assert_eq!(
            check_exits(&trade, &ma_snapshot(dec!(101), dec!(100)), noon()),
            Some(CloseReason::LimitTarget)
        );
    }

    #[test]
    fn limit_needs_a_quote_on_every_leg() {
        let exit = ExitConfig {
            limit: Some(LimitExit {
                delta: ExitDelta::Points { value: dec!(0.10) },
            }),
            ..ExitConfig::default()
        };
        let trade = make_trade(
            exit,
            vec![
                make_leg(dec!(2.50), Some(dec!(9.99))),
                make_leg(dec!(2.50), None),
            ],
        );
        assert_eq!(
            check_exits(&trade, &ma_snapshot(dec!(101), dec!(100)), noon()),
            None
        );
    }

    #[test]
    fn time_stop_fires_at_or_after_the_configured_time() {
        let exit = ExitConfig {
            time: Some(TimeExit {
                at: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            }),
            ..ExitConfig::default()
        };
        let trade = make_trade(exit, vec![make_leg(dec!(2.50), None)]);
        let snap = ma_snapshot(dec!(101), dec!(100));

        assert_eq!(
            check_exits(&trade, &snap, NaiveTime::from_hms_opt(15, 29, 59).unwrap()),
            None
        );
        assert_eq!(
            check_exits(&trade, &snap, NaiveTime::from_hms_opt(15, 30, 0).unwrap()),
            Some(CloseReason::TimeStop)
        );
    }

    #[test]
    fn ma_cross_applies_the_signed_offset() {
        let exit = ExitConfig {
            ma: Some(MaExit {
                side: CrossSide::Below,
                offset_points: dec!(-2),
            }),
            ..ExitConfig::default()
        };
        let trade = make_trade(exit, vec![make_leg(dec!(2.50), None)]);

        // Line sits at MA - 2 = 98.
        assert_eq!(
            check_exits(&trade, &ma_snapshot(dec!(98.5), dec!(100)), noon()),
            None
        );
        assert_eq!(
            check_exits(&trade, &ma_snapshot(dec!(97.9), dec!(100)), noon()),
            Some(CloseReason::MaCross)
        );
    }

    #[test]
    fn band_cross_targets_the_opposite_band_for_longs() {
        let exit = ExitConfig {
            band: Some(BandExit {
                target: BandExitTarget::Opposite,
                side: CrossSide::Above,
                offset_points: dec!(0),
            }),
            ..ExitConfig::default()
        };
        let trade = make_trade(exit, vec![make_leg(dec!(2.50), None)]);
        let snap = MarketSnapshot {
            price: dec!(110.5),
            indicator: IndicatorValues::Bands {
                upper: dec!(110),
                middle: dec!(100),
                lower: dec!(90),
            },
            prev_primary: dec!(100),
            confirm_value: None,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap(),
        };
        assert_eq!(check_exits(&trade, &snap, noon()), Some(CloseReason::BandCross));
    }

    #[test]
    fn band_cross_is_skipped_without_band_values() {
        let exit = ExitConfig {
            band: Some(BandExit {
                target: BandExitTarget::Middle,
                side: CrossSide::Above,
                offset_points: dec!(0),
            }),
            ..ExitConfig::default()
        };
        let trade = make_trade(exit, vec![make_leg(dec!(2.50), None)]);
        assert_eq!(
            check_exits(&trade, &ma_snapshot(dec!(150), dec!(100)), noon()),
            None
        );
    }

    #[test]
    fn limit_wins_when_limit_and_time_are_both_satisfied() {
        let exit = ExitConfig {
            limit: Some(LimitExit {
                delta: ExitDelta::Points { value: dec!(0.10) },
            }),
            time: Some(TimeExit {
                at: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            }),
            ..ExitConfig::default()
        };
        let trade = make_trade(exit, vec![make_leg(dec!(2.50), Some(dec!(2.70)))]);
        assert_eq!(
            check_exits(&trade, &ma_snapshot(dec!(101), dec!(100)), noon()),
            Some(CloseReason::LimitTarget)
        );
    }

    #[test]
    fn zero_conditions_never_close() {
        let trade = make_trade(ExitConfig::default(), vec![make_leg(dec!(2.50), Some(dec!(99)))]);
        assert_eq!(
            check_exits(&trade, &ma_snapshot(dec!(200), dec!(100)), noon()),
            None
        );
    }
}
