use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sentinel_core::{
    ConfigLoader, Direction, EngineConfig, ExitConfig, ExitDelta, Instrument, LegSizing,
    LegTarget, LimitExit, StrategyKind, TradeConfig, Watch, WatchEvent,
};
use sentinel_orchestrator::WatchRegistry;
use sentinel_venue_sim::SimVenue;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(about = "Strategy evaluation and order execution engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine against the simulated venue, restoring the watch list
    Run {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Run a scripted end-to-end scenario and print every event
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Run { config } => run_engine(&config).await?,
        Commands::Demo => run_demo().await?,
    }

    Ok(())
}

/// Restores the persisted watch list, publishes events to the log, and saves
/// the watch list back on ctrl-c.
async fn run_engine(config_path: &str) -> anyhow::Result<()> {
    let config = ConfigLoader::load_from(config_path)?;
    tracing::info!(config = config_path, "starting sentinel engine (paper venue)");

    let venue = Arc::new(drifting_venue());
    let registry = WatchRegistry::new(venue, config);
    let mut events = registry.subscribe();

    let restored = registry.restore_watchlist().await?;
    tracing::info!(watches = restored.len(), "watch list restored");
    let account_task = registry.spawn_account_task();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => tracing::info!("{}", describe(&event)),
                    Err(e) => {
                        tracing::warn!(error = %e, "event feed lagged");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    account_task.abort();
    registry.save_watchlist().await?;
    registry.shutdown_all().await?;
    Ok(())
}

/// A scripted scenario: a long SPY watch rides a rising tape into its
/// trigger band, auto-trades the nearest OTM call, and exits on the limit
/// take-profit.
async fn run_demo() -> anyhow::Result<()> {
    // 21-bar MA of exactly 100, previous value 99 (rising).
    let mut history = vec![dec!(79)];
    history.extend(std::iter::repeat(dec!(100)).take(21));
    let script = vec![dec!(94), dec!(98), dec!(101), dec!(102), dec!(103)];

    let mut config = EngineConfig::default();
    config.monitor.tick_interval_ms = 250;
    config.monitor.history_bars = 22;

    let venue = Arc::new(SimVenue::new(history, script));
    let registry = WatchRegistry::new(venue, config);
    let mut events = registry.subscribe();

    let watch = Watch {
        id: "spy-long-demo".into(),
        instrument: Instrument::stock("SPY"),
        strategy: StrategyKind::MovingAverage,
        period: 21,
        buffer_points: dec!(5),
        band_std_dev: dec!(2),
        direction: Direction::Long,
        confirm_period: None,
        enabled: true,
        auto_trade: true,
        trade_config: TradeConfig {
            legs: vec![LegTarget::OptionRank {
                rank: 0,
                sizing: LegSizing::Amount { amount: dec!(1000) },
            }],
            exit: ExitConfig {
                limit: Some(LimitExit {
                    delta: ExitDelta::Points { value: dec!(0.40) },
                }),
                ..ExitConfig::default()
            },
        },
    };
    registry.spawn_watch(watch).await?;

    loop {
        let event = events.recv().await?;
        println!("{}", describe(&event));
        if matches!(event, WatchEvent::PhaseChanged { to, .. } if to == sentinel_core::WatchPhase::Disabled)
        {
            break;
        }
    }

    registry.shutdown_all().await?;
    Ok(())
}

/// A venue with a gently oscillating tape for open-ended paper runs.
fn drifting_venue() -> SimVenue {
    let mut history = Vec::with_capacity(120);
    for i in 0..120u32 {
        let wobble = Decimal::from(i % 7) - dec!(3);
        history.push(dec!(100) + wobble);
    }
    let mut script = Vec::with_capacity(240);
    for i in 0..240u32 {
        let wobble = Decimal::from(i % 11) - dec!(5);
        script.push(dec!(100) + wobble);
    }
    SimVenue::new(history, script)
}

fn describe(event: &WatchEvent) -> String {
    match event {
        WatchEvent::WatchCreated { watch } => {
            format!("watch {} created ({})", watch.id, watch.instrument.symbol)
        }
        WatchEvent::WatchUpdated { watch } => format!("watch {} updated", watch.id),
        WatchEvent::WatchRemoved { watch_id } => format!("watch {watch_id} removed"),
        WatchEvent::PhaseChanged { watch_id, from, to } => {
            format!("watch {watch_id}: {from} -> {to}")
        }
        WatchEvent::TickUpdate {
            watch_id,
            snapshot,
            trigger,
        } => format!(
            "watch {watch_id}: price {} indicator {} zone {:?} band [{}, {}]",
            snapshot.price,
            snapshot.indicator.primary(),
            trigger.status,
            trigger.band_low,
            trigger.band_high
        ),
        WatchEvent::SignalFired { signal, ladder } => format!(
            "watch {}: SIGNAL {} @ {} (indicator {}, {} contracts locked)",
            signal.watch_id,
            signal.symbol,
            signal.price,
            signal.indicator_value,
            ladder.len()
        ),
        WatchEvent::TradeOpened { trade } => format!(
            "trade {} opened: {} leg(s), cost basis {}",
            trade.id,
            trade.legs.len(),
            trade.cost_basis()
        ),
        WatchEvent::TradeUpdated { trade } => format!("trade {} marked", trade.id),
        WatchEvent::TradeClosed { trade, reason } => {
            format!("trade {} closed ({reason})", trade.id)
        }
        WatchEvent::AccountUpdate { summary, positions } => format!(
            "account: net liq {}, {} position(s)",
            summary.net_liquidation,
            positions.len()
        ),
        WatchEvent::Warning { watch_id, message, .. } => match watch_id {
            Some(id) => format!("warning [{id}]: {message}"),
            None => format!("warning: {message}"),
        },
    }
}
