//! End-to-end lifecycle runs against the simulated venue: a long
//! moving-average watch rides a scripted price path from below the trigger
//! band into it, auto-trades the nearest OTM call, and exits on its limit
//! take-profit.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sentinel_core::{
    CloseReason, Direction, EngineConfig, ExitConfig, ExitDelta, Instrument, LadderConfig,
    LegSizing, LegTarget, LimitExit, MonitorConfig, StrategyKind, TradeConfig, Watch, WatchEvent,
    WatchPhase,
};
use sentinel_orchestrator::WatchRegistry;
use sentinel_venue_sim::SimVenue;
use tokio::sync::broadcast;

/// 22 closes whose 21-bar MA is exactly 100 and rising (previous MA 99).
fn rising_history() -> Vec<Decimal> {
    let mut closes = vec![dec!(79)];
    closes.extend(std::iter::repeat(dec!(100)).take(21));
    closes
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        monitor: MonitorConfig {
            tick_interval_ms: 10,
            adapter_timeout_ms: 1_000,
            bars_refresh_secs: 3_600,
            history_bars: 22,
            read_retries: 0,
            retry_backoff_ms: 1,
            account_refresh_secs: 3_600,
        },
        ladder: LadderConfig {
            strikes: 5,
            expiries: 3,
        },
        watchlist_path: "unused".to_string(),
    }
}

fn long_watch(auto_trade: bool, exit: ExitConfig) -> Watch {
    Watch {
        id: "spy-long".into(),
        instrument: Instrument::stock("SPY"),
        strategy: StrategyKind::MovingAverage,
        period: 21,
        buffer_points: dec!(5),
        band_std_dev: dec!(2),
        direction: Direction::Long,
        confirm_period: None,
        enabled: true,
        auto_trade,
        trade_config: TradeConfig {
            legs: vec![LegTarget::OptionRank {
                rank: 0,
                sizing: LegSizing::Amount { amount: dec!(1000) },
            }],
            exit,
        },
    }
}

async fn next_event(rx: &mut broadcast::Receiver<WatchEvent>) -> WatchEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn signal_fires_once_trades_and_rearms_on_limit_close() {
    let venue = SimVenue::new(
        rising_history(),
        vec![dec!(94), dec!(98), dec!(101), dec!(102), dec!(102)],
    );
    let registry = WatchRegistry::new(Arc::new(venue), fast_config());
    let mut events = registry.subscribe();

    let exit = ExitConfig {
        limit: Some(LimitExit {
            delta: ExitDelta::Points { value: dec!(0.40) },
        }),
        loop_rearm: true,
        ..ExitConfig::default()
    };
    registry.spawn_watch(long_watch(true, exit)).await.unwrap();

    let mut signals = 0;
    let mut ladder_strikes = Vec::new();
    let mut opened_trade = None;
    let mut closed = None;
    let mut transitions = Vec::new();

    while closed.is_none() {
        match next_event(&mut events).await {
            WatchEvent::SignalFired { signal, ladder } => {
                signals += 1;
                assert_eq!(signal.price, dec!(101));
                assert_eq!(signal.indicator_value, dec!(100));
                assert_eq!(signal.band_low, dec!(100));
                assert_eq!(signal.band_high, dec!(105));
                ladder_strikes = ladder.iter().map(|q| q.contract.strike).collect();
            }
            WatchEvent::TradeOpened { trade } => opened_trade = Some(trade),
            WatchEvent::TradeClosed { trade, reason } => closed = Some((trade, reason)),
            WatchEvent::PhaseChanged { from, to, .. } => transitions.push((from, to)),
            _ => {}
        }
    }
    // Drain the post-close re-arm transition.
    loop {
        match next_event(&mut events).await {
            WatchEvent::PhaseChanged { from, to, .. } => {
                transitions.push((from, to));
                if to == WatchPhase::Watching {
                    break;
                }
            }
            WatchEvent::SignalFired { .. } => panic!("signal re-fired inside the active band"),
            _ => {}
        }
    }

    assert_eq!(signals, 1);
    // Ladder locked at the fire-time indicator value: first OTM call at 105.
    assert_eq!(
        ladder_strikes,
        vec![dec!(105), dec!(110), dec!(115), dec!(120), dec!(125)]
    );

    // Sized from the refreshed ask: floor(1000 / (3.55 * 100)) = 2.
    let trade = opened_trade.expect("trade opened");
    assert_eq!(trade.legs.len(), 1);
    assert_eq!(trade.legs[0].quantity, dec!(2));
    assert_eq!(trade.legs[0].fill_price, dec!(3.55));

    let (closed_trade, reason) = closed.expect("trade closed");
    assert_eq!(reason, CloseReason::LimitTarget);
    assert_eq!(closed_trade.close_reason, Some(CloseReason::LimitTarget));
    assert!(closed_trade.closed_at.is_some());

    assert_eq!(
        transitions,
        vec![
            (WatchPhase::Watching, WatchPhase::Triggered),
            (WatchPhase::Triggered, WatchPhase::LimitPending),
            (WatchPhase::LimitPending, WatchPhase::Exiting),
            (WatchPhase::Exiting, WatchPhase::Closed),
            (WatchPhase::Closed, WatchPhase::Watching),
        ]
    );

    registry.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn auto_trade_off_surfaces_the_signal_without_an_order() {
    // Price falls back out of the band after the trigger so the watch sits
    // quietly in `triggered` for the rest of the test.
    let venue = SimVenue::new(rising_history(), vec![dec!(98), dec!(101), dec!(94)]);
    let registry = WatchRegistry::new(Arc::new(venue), fast_config());
    let mut events = registry.subscribe();

    let handle = registry
        .spawn_watch(long_watch(false, ExitConfig::default()))
        .await
        .unwrap();

    loop {
        match next_event(&mut events).await {
            WatchEvent::SignalFired { .. } => break,
            WatchEvent::TradeOpened { .. } => panic!("order placed with auto_trade off"),
            _ => {}
        }
    }

    // Give the actor a few more ticks; nothing should be submitted.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let status = handle.status().await.unwrap();
    assert_eq!(status.phase, WatchPhase::Triggered);
    assert!(status.trade.is_none());
    assert!(!status.ladder.is_empty());

    // Manual reset re-arms without touching any order.
    handle.reset_signal().await.unwrap();
    let status = handle.status().await.unwrap();
    assert_eq!(status.phase, WatchPhase::Watching);

    registry.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn disagreeing_confirm_ma_suppresses_auto_trade() {
    // 21-bar MA exactly 100 and rising, while the 5-bar confirm MA sits at
    // 110, above the whole trigger band. The fired signal carries
    // confirm_ok = false and no order may go out despite auto_trade.
    let mut closes = vec![dec!(79)];
    closes.extend(std::iter::repeat(dec!(96.875)).take(16));
    closes.extend(std::iter::repeat(dec!(110)).take(5));
    let venue = SimVenue::new(closes, vec![dec!(98), dec!(101), dec!(94)]);
    let registry = WatchRegistry::new(Arc::new(venue), fast_config());
    let mut events = registry.subscribe();

    let mut watch = long_watch(true, ExitConfig::default());
    watch.confirm_period = Some(5);
    let handle = registry.spawn_watch(watch).await.unwrap();

    loop {
        match next_event(&mut events).await {
            WatchEvent::SignalFired { signal, .. } => {
                assert_eq!(signal.confirm_ok, Some(false));
            }
            WatchEvent::Warning { message, .. } if message.contains("auto-trade suppressed") => {
                break;
            }
            WatchEvent::TradeOpened { .. } => {
                panic!("order placed despite a disagreeing confirmation MA")
            }
            _ => {}
        }
    }

    // The signal stays surfaced for the operator; nothing was submitted.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let status = handle.status().await.unwrap();
    assert_eq!(status.phase, WatchPhase::Triggered);
    assert!(status.trade.is_none());

    registry.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn manual_close_without_rearm_disables_the_watch() {
    let venue = SimVenue::new(rising_history(), vec![dec!(98), dec!(101), dec!(101)]);
    let registry = WatchRegistry::new(Arc::new(venue), fast_config());
    let mut events = registry.subscribe();

    // No exit conditions: valid, but flagged at order construction.
    let handle = registry
        .spawn_watch(long_watch(true, ExitConfig::default()))
        .await
        .unwrap();

    let mut flagged = false;
    loop {
        match next_event(&mut events).await {
            WatchEvent::Warning { message, .. } if message.contains("no exit conditions") => {
                flagged = true;
            }
            WatchEvent::TradeOpened { .. } => break,
            _ => {}
        }
    }
    assert!(flagged, "zero-exit-condition order was not flagged");

    handle.close_trade().await.unwrap();
    loop {
        match next_event(&mut events).await {
            WatchEvent::TradeClosed { reason, .. } => {
                assert_eq!(reason, CloseReason::Manual);
                break;
            }
            _ => {}
        }
    }

    // loop_rearm is off: the watch ends up disabled.
    loop {
        match next_event(&mut events).await {
            WatchEvent::PhaseChanged { to, .. } if to == WatchPhase::Disabled => break,
            _ => {}
        }
    }
    let status = handle.status().await.unwrap();
    assert_eq!(status.phase, WatchPhase::Disabled);
    assert!(!status.watch.enabled);

    registry.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn refilter_is_rejected_while_holding() {
    let venue = SimVenue::new(rising_history(), vec![dec!(98), dec!(101), dec!(101)]);
    let registry = WatchRegistry::new(Arc::new(venue), fast_config());
    let mut events = registry.subscribe();

    let exit = ExitConfig {
        limit: Some(LimitExit {
            // Unreachable target keeps the position open.
            delta: ExitDelta::Points { value: dec!(1000) },
        }),
        ..ExitConfig::default()
    };
    let handle = registry.spawn_watch(long_watch(true, exit)).await.unwrap();

    loop {
        if let WatchEvent::TradeOpened { .. } = next_event(&mut events).await {
            break;
        }
    }

    let reference_before = handle.status().await.unwrap().locked_reference;
    handle.refilter().await.unwrap();

    loop {
        match next_event(&mut events).await {
            WatchEvent::Warning { message, .. } if message.contains("re-filter rejected") => break,
            _ => {}
        }
    }
    assert_eq!(handle.status().await.unwrap().locked_reference, reference_before);

    registry.shutdown_all().await.unwrap();
}
