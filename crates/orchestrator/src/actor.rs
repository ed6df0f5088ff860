use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rust_decimal::Decimal;
use sentinel_core::{
    CloseReason, Direction, EngineError, LadderConfig, LegStatus, LegTarget, MonitorConfig,
    OptionRight, OrderSide, OrderType, QuoteSnapshot, Signal, Trade, TradePhase, VenueAdapter,
    Watch, WatchEvent, WatchPhase,
};
use sentinel_execution::{plan_order, submit_entry, LegQuote, PlannedLeg};
use sentinel_options::ChainCache;
use sentinel_strategy::{evaluate, SignalTracker};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::commands::{WatchCommand, WatchStatus};

/// Owns one watch's state and runs its evaluation passes.
///
/// Commands and ticks are serialized through a single `select!` loop, so no
/// two passes for the same watch ever run concurrently and every state
/// transition goes through [`WatchActor::set_phase`] exactly once.
pub struct WatchActor {
    watch: Watch,
    phase: WatchPhase,
    rx: mpsc::Receiver<WatchCommand>,
    event_tx: broadcast::Sender<WatchEvent>,
    adapter: Arc<dyn VenueAdapter>,
    config: MonitorConfig,
    ladder: LadderConfig,
    tracker: SignalTracker,
    bars: Vec<Decimal>,
    bars_fetched_at: Option<Instant>,
    chain: Option<ChainCache>,
    trade: Option<Trade>,
    last_quote: Option<QuoteSnapshot>,
    last_snapshot: Option<sentinel_core::MarketSnapshot>,
    last_trigger: Option<sentinel_core::TriggerState>,
}

impl WatchActor {
    #[must_use]
    pub fn new(
        watch: Watch,
        rx: mpsc::Receiver<WatchCommand>,
        event_tx: broadcast::Sender<WatchEvent>,
        adapter: Arc<dyn VenueAdapter>,
        config: MonitorConfig,
        ladder: LadderConfig,
    ) -> Self {
        let phase = if watch.enabled {
            WatchPhase::Watching
        } else {
            WatchPhase::Disabled
        };
        Self {
            watch,
            phase,
            rx,
            event_tx,
            adapter,
            config,
            ladder,
            tracker: SignalTracker::default(),
            bars: Vec::new(),
            bars_fetched_at: None,
            chain: None,
            trade: None,
            last_quote: None,
            last_snapshot: None,
            last_trigger: None,
        }
    }

    /// Runs the actor loop until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        info!(watch = %self.watch.id, "watch actor starting");

        let mut tick =
            tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms));
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.rx.recv() => {
                    match cmd {
                        Some(cmd) => {
                            if self.handle_command(cmd).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = tick.tick() => {
                    if matches!(self.phase, WatchPhase::Watching | WatchPhase::Triggered) {
                        self.entry_pass().await;
                    } else if self.phase.is_holding() {
                        self.exit_pass().await;
                    }
                }
            }
        }

        info!(watch = %self.watch.id, "watch actor stopped");
    }

    /// Returns true when the actor should shut down.
    async fn handle_command(&mut self, cmd: WatchCommand) -> bool {
        match cmd {
            WatchCommand::Enable => {
                if matches!(self.phase, WatchPhase::Disabled | WatchPhase::Closed) {
                    self.watch.enabled = true;
                    self.emit(WatchEvent::WatchUpdated {
                        watch: self.watch.clone(),
                    });
                    self.set_phase(WatchPhase::Watching);
                }
            }
            WatchCommand::Disable => {
                if self.phase.is_holding() {
                    self.warn_event(
                        "cannot disable while a position is open; close the trade first"
                            .to_string(),
                    );
                } else if self.phase != WatchPhase::Disabled {
                    self.watch.enabled = false;
                    self.emit(WatchEvent::WatchUpdated {
                        watch: self.watch.clone(),
                    });
                    self.set_phase(WatchPhase::Disabled);
                }
            }
            WatchCommand::SetAutoTrade(auto_trade) => {
                self.watch.auto_trade = auto_trade;
                self.emit(WatchEvent::WatchUpdated {
                    watch: self.watch.clone(),
                });
            }
            WatchCommand::UpdateConfig(new) => self.update_config(*new),
            WatchCommand::ResetSignal => {
                if self.phase == WatchPhase::Triggered {
                    self.tracker.reset();
                    self.set_phase(WatchPhase::Watching);
                } else {
                    self.warn_event(format!(
                        "reset-signal only applies to a triggered watch (currently {})",
                        self.phase
                    ));
                }
            }
            WatchCommand::Refilter => self.refilter().await,
            WatchCommand::Refresh { expiry } => {
                let deadline = self.deadline();
                match self.chain.as_mut() {
                    Some(chain) => {
                        if let Err(e) = chain.refresh(self.adapter.as_ref(), expiry, deadline).await
                        {
                            self.warn_event(format!("ladder refresh failed: {e}"));
                        }
                    }
                    None => self.warn_event("no option ladder captured yet".to_string()),
                }
            }
            WatchCommand::SelectExpiry(expiry) => match self.chain.as_mut() {
                Some(chain) => {
                    if let Err(e) = chain.select_expiry(expiry) {
                        self.warn_event(e.to_string());
                    }
                }
                None => self.warn_event("no option ladder captured yet".to_string()),
            },
            WatchCommand::PlaceOrder => {
                if self.phase == WatchPhase::Triggered {
                    self.place_order().await;
                } else {
                    self.warn_event(format!(
                        "place-order only applies to a triggered watch (currently {})",
                        self.phase
                    ));
                }
            }
            WatchCommand::CloseTrade => {
                if self.trade.is_some() {
                    self.close_trade(CloseReason::Manual).await;
                } else {
                    self.warn_event("no open trade to close".to_string());
                }
            }
            WatchCommand::GetStatus(tx) => {
                let _ = tx.send(self.status());
            }
            WatchCommand::Shutdown => return true,
        }
        false
    }

    fn update_config(&mut self, new: Watch) {
        if self.phase.is_holding() {
            self.warn_event(
                EngineError::LifecycleConflict(
                    "cannot reconfigure while a position is open".to_string(),
                )
                .to_string(),
            );
            return;
        }
        if new.id != self.watch.id {
            self.warn_event("watch id is immutable".to_string());
            return;
        }
        let enabled = new.enabled;
        self.watch = new;
        self.tracker.reset();
        self.bars.clear();
        self.bars_fetched_at = None;
        self.emit(WatchEvent::WatchUpdated {
            watch: self.watch.clone(),
        });
        self.set_phase(if enabled {
            WatchPhase::Watching
        } else {
            WatchPhase::Disabled
        });
    }

    /// One entry-side evaluation pass: bars, quote, indicator, trigger zone,
    /// and the fired-signal edge.
    async fn entry_pass(&mut self) {
        if !self.ensure_bars().await {
            return;
        }
        let Some(quote) = self.fetch_quote().await else {
            return;
        };

        let eval = match evaluate(
            &self.watch,
            &self.bars,
            quote.price,
            &mut self.tracker,
            Utc::now(),
        ) {
            Ok(eval) => eval,
            Err(e) => {
                debug!(watch = %self.watch.id, error = %e, "pass skipped");
                return;
            }
        };

        self.last_quote = Some(quote);
        self.last_snapshot = Some(eval.snapshot.clone());
        self.last_trigger = Some(eval.trigger.clone());
        self.emit(WatchEvent::TickUpdate {
            watch_id: self.watch.id.clone(),
            snapshot: eval.snapshot.clone(),
            trigger: eval.trigger,
        });

        // First capture happens once monitoring has an indicator to center on.
        if self.chain.is_none() {
            if let Err(e) = self
                .capture_chain(eval.snapshot.indicator.primary())
                .await
            {
                debug!(watch = %self.watch.id, error = %e, "initial ladder capture failed");
            }
        }

        if let Some(signal) = eval.signal {
            self.on_signal(signal).await;
        }
    }

    /// A signal fired: re-capture the ladder at the level that triggered,
    /// publish it, and auto-trade if configured.
    async fn on_signal(&mut self, signal: Signal) {
        info!(
            watch = %self.watch.id,
            price = %signal.price,
            indicator = %signal.indicator_value,
            "signal fired"
        );

        let ladder = match self.capture_chain(signal.indicator_value).await {
            Ok(ladder) => ladder,
            Err(e) => {
                self.warn_event(format!("option ladder capture failed: {e}"));
                Vec::new()
            }
        };
        self.emit(WatchEvent::SignalFired {
            signal: signal.clone(),
            ladder,
        });
        self.set_phase(WatchPhase::Triggered);

        if self.watch.auto_trade {
            if signal.confirm_ok == Some(false) {
                self.warn_event(
                    "auto-trade suppressed: confirmation MA disagrees with the entry".to_string(),
                );
            } else {
                self.place_order().await;
            }
        }
    }

    /// Resolve the configured legs against the locked ladder, size them, and
    /// submit the group. The ladder used here is the one captured at signal
    /// fire time; re-filters are rejected while a position is open, so it
    /// cannot be swapped out from under the sizing.
    async fn place_order(&mut self) {
        if self.phase.is_holding() {
            self.warn_event("a position is already open".to_string());
            return;
        }
        if self.watch.trade_config.legs.is_empty() {
            self.warn_event("no legs configured; nothing to submit".to_string());
            return;
        }

        let deadline = self.deadline();
        if let Some(chain) = self.chain.as_mut() {
            // Best effort: sizing falls back to cached asks when this fails.
            if let Err(e) = chain.refresh(self.adapter.as_ref(), None, deadline).await {
                warn!(watch = %self.watch.id, error = %e, "ladder refresh before sizing failed");
            }
        }

        let mut planned = Vec::new();
        for target in &self.watch.trade_config.legs {
            match target {
                LegTarget::Underlying { sizing } => {
                    let quote = self.last_quote.as_ref();
                    planned.push(PlannedLeg {
                        quote: LegQuote {
                            contract_id: sentinel_core::UNDERLYING_CONTRACT_ID,
                            description: self.watch.instrument.symbol.clone(),
                            side: match self.watch.direction {
                                Direction::Long => OrderSide::Buy,
                                Direction::Short => OrderSide::Sell,
                            },
                            ask: quote.and_then(|q| q.ask.or(Some(q.price))),
                            multiplier: Decimal::ONE,
                        },
                        sizing: *sizing,
                    });
                }
                LegTarget::OptionRank { rank, sizing } => {
                    match self.chain.as_ref().and_then(|c| c.contract_at_rank(*rank)) {
                        Some(quoted) => planned.push(PlannedLeg {
                            quote: LegQuote {
                                contract_id: quoted.contract.contract_id,
                                description: quoted.contract.display_name(),
                                side: OrderSide::Buy,
                                ask: quoted.ask,
                                multiplier: quoted.contract.multiplier,
                            },
                            sizing: *sizing,
                        }),
                        None => {
                            self.warn_event(format!("no contract at ladder rank {rank}"));
                        }
                    }
                }
            }
        }

        let plan = plan_order(&planned, &self.watch.trade_config.exit);
        for warning in &plan.warnings {
            self.warn_event(warning.clone());
        }
        if plan.legs.is_empty() {
            self.warn_event("no sizable legs; order not sent".to_string());
            return;
        }

        match submit_entry(self.adapter.as_ref(), &self.watch, &plan, deadline).await {
            Ok(report) => {
                for rejected in report.rejected {
                    self.warn_event(format!(
                        "leg {} rejected: {}",
                        rejected.description, rejected.reason
                    ));
                }
                match report.trade {
                    Some(trade) => {
                        let phase = match trade.phase {
                            TradePhase::LimitPending => WatchPhase::LimitPending,
                            _ => WatchPhase::Filled,
                        };
                        self.emit(WatchEvent::TradeOpened {
                            trade: trade.clone(),
                        });
                        self.trade = Some(trade);
                        self.set_phase(phase);
                    }
                    None => {
                        self.warn_event(
                            "every leg was rejected; watch stays triggered".to_string(),
                        );
                    }
                }
            }
            Err(e) => self.warn_event(format!("entry submission failed: {e}")),
        }
    }

    /// One exit-side pass: refresh the indicator and leg quotes, then walk
    /// the exit conditions in precedence order.
    async fn exit_pass(&mut self) {
        if !self.ensure_bars().await {
            return;
        }
        let Some(quote) = self.fetch_quote().await else {
            return;
        };

        let eval = match evaluate(
            &self.watch,
            &self.bars,
            quote.price,
            &mut self.tracker,
            Utc::now(),
        ) {
            Ok(eval) => eval,
            Err(e) => {
                debug!(watch = %self.watch.id, error = %e, "exit pass skipped");
                return;
            }
        };

        self.last_snapshot = Some(eval.snapshot.clone());
        self.last_trigger = Some(eval.trigger.clone());
        self.emit(WatchEvent::TickUpdate {
            watch_id: self.watch.id.clone(),
            snapshot: eval.snapshot.clone(),
            trigger: eval.trigger,
        });

        self.refresh_leg_quotes(quote.price).await;
        if let Some(trade) = &self.trade {
            self.emit(WatchEvent::TradeUpdated {
                trade: trade.clone(),
            });
        }
        self.last_quote = Some(quote);

        let reason = self
            .trade
            .as_ref()
            .and_then(|trade| {
                sentinel_execution::check_exits(trade, &eval.snapshot, chrono::Local::now().time())
            });
        if let Some(reason) = reason {
            self.close_trade(reason).await;
        }
    }

    /// Update each leg's last-known price. A failed quote fetch leaves the
    /// previous values in place.
    async fn refresh_leg_quotes(&mut self, underlying_price: Decimal) {
        let Some(trade) = self.trade.as_mut() else {
            return;
        };
        let ids: Vec<i64> = trade
            .legs
            .iter()
            .map(|leg| leg.contract_id)
            .filter(|id| *id != sentinel_core::UNDERLYING_CONTRACT_ID)
            .collect();

        let quotes = if ids.is_empty() {
            Vec::new()
        } else {
            let adapter = Arc::clone(&self.adapter);
            match read_with_retry("option_quotes", &self.config, || {
                let adapter = Arc::clone(&adapter);
                let ids = ids.clone();
                async move { adapter.option_quotes(&ids).await }
            })
            .await
            {
                Ok(quotes) => quotes,
                Err(e) => {
                    warn!(watch = %self.watch.id, error = %e, "leg quote refresh failed");
                    Vec::new()
                }
            }
        };

        for leg in &mut trade.legs {
            if leg.contract_id == sentinel_core::UNDERLYING_CONTRACT_ID {
                leg.current_price = Some(underlying_price);
            } else if let Some(q) = quotes.iter().find(|q| q.contract_id == leg.contract_id) {
                leg.current_price = q.last.or(q.bid).or(leg.current_price);
            }
        }
    }

    /// Close every leg at market and transition the watch. The re-arm (or
    /// disable) happens in the same pass as the close, so the watch is never
    /// observable between holding and its post-close phase.
    async fn close_trade(&mut self, reason: CloseReason) {
        let Some(mut trade) = self.trade.take() else {
            return;
        };
        info!(watch = %self.watch.id, trade = %trade.id, %reason, "closing trade");

        self.set_phase(WatchPhase::Exiting);
        trade.phase = TradePhase::Exiting;

        let deadline = self.deadline();
        for leg in &trade.legs {
            // Closes are never retried; a duplicate fill is worse than a
            // surfaced failure.
            let result = tokio::time::timeout(
                deadline,
                self.adapter
                    .close_position(leg.contract_id, leg.quantity, OrderType::Market),
            )
            .await;
            match result {
                Ok(Ok(ack)) if ack.status != LegStatus::Rejected => {}
                Ok(Ok(ack)) => self.warn_event(format!(
                    "close rejected for {}: {}",
                    leg.description,
                    ack.reason.unwrap_or_else(|| "no reason given".to_string())
                )),
                Ok(Err(e)) => {
                    self.warn_event(format!("close failed for {}: {e}", leg.description));
                }
                Err(_) => {
                    self.warn_event(format!("close timed out for {}", leg.description));
                }
            }
        }

        let rearm = trade.exit.loop_rearm;
        trade.phase = TradePhase::Closed;
        trade.closed_at = Some(Utc::now());
        trade.close_reason = Some(reason);
        self.emit(WatchEvent::TradeClosed { trade, reason });
        self.set_phase(WatchPhase::Closed);

        if rearm {
            self.set_phase(WatchPhase::Watching);
        } else {
            self.watch.enabled = false;
            self.emit(WatchEvent::WatchUpdated {
                watch: self.watch.clone(),
            });
            self.set_phase(WatchPhase::Disabled);
        }
    }

    /// Explicit user re-filter. Rejected while a position is open so the
    /// ladder sizing was done against can never be swapped mid-trade.
    async fn refilter(&mut self) {
        if self.phase.is_holding() {
            self.warn_event(
                EngineError::LifecycleConflict(
                    "re-filter rejected while a position is open; ladder left untouched"
                        .to_string(),
                )
                .to_string(),
            );
            return;
        }
        let Some(reference) = self.last_snapshot.as_ref().map(|s| s.indicator.primary()) else {
            self.warn_event("re-filter needs an indicator value; no tick data yet".to_string());
            return;
        };
        if let Err(e) = self.capture_chain(reference).await {
            self.warn_event(format!("re-filter failed: {e}"));
        }
    }

    /// Capture a fresh ladder centered on `reference`, replacing the locked
    /// reference and all cached contracts.
    async fn capture_chain(
        &mut self,
        reference: Decimal,
    ) -> Result<Vec<sentinel_core::QuotedContract>, EngineError> {
        let right = match self.watch.direction {
            Direction::Long => OptionRight::Call,
            Direction::Short => OptionRight::Put,
        };
        let chain = ChainCache::capture(
            self.adapter.as_ref(),
            &self.watch.instrument,
            reference,
            right,
            &self.ladder,
            self.deadline(),
        )
        .await?;
        info!(
            watch = %self.watch.id,
            reference = %reference,
            expiries = chain.expiry_dates().len(),
            "option ladder captured"
        );
        let ladder = chain.selected_contracts().to_vec();
        self.chain = Some(chain);
        Ok(ladder)
    }

    /// Fetch or reuse the bar history. Returns false when no usable history
    /// is on hand, in which case the pass is skipped.
    async fn ensure_bars(&mut self) -> bool {
        let stale = self.bars_fetched_at.map_or(true, |at| {
            at.elapsed() >= Duration::from_secs(self.config.bars_refresh_secs)
        });
        if !stale && self.bars.len() >= self.watch.required_history() {
            return true;
        }

        let adapter = Arc::clone(&self.adapter);
        let instrument = self.watch.instrument.clone();
        let wanted = self.config.history_bars.max(self.watch.required_history());
        match read_with_retry("historical_bars", &self.config, || {
            let adapter = Arc::clone(&adapter);
            let instrument = instrument.clone();
            async move { adapter.historical_bars(&instrument, wanted).await }
        })
        .await
        {
            Ok(bars) => {
                self.bars = bars;
                self.bars_fetched_at = Some(Instant::now());
                !self.bars.is_empty()
            }
            Err(e) => {
                // Stale bars stay usable; only a watch with no history skips.
                if self.bars.is_empty() {
                    self.warn_event(format!("bar history unavailable: {e}"));
                    false
                } else {
                    warn!(watch = %self.watch.id, error = %e, "bar refresh failed, reusing cached history");
                    true
                }
            }
        }
    }

    async fn fetch_quote(&mut self) -> Option<QuoteSnapshot> {
        let adapter = Arc::clone(&self.adapter);
        let instrument = self.watch.instrument.clone();
        match read_with_retry("quote_snapshot", &self.config, || {
            let adapter = Arc::clone(&adapter);
            let instrument = instrument.clone();
            async move { adapter.quote_snapshot(&instrument).await }
        })
        .await
        {
            Ok(quote) => Some(quote),
            Err(e) => {
                warn!(watch = %self.watch.id, error = %e, "quote unavailable, pass skipped");
                None
            }
        }
    }

    fn status(&self) -> WatchStatus {
        WatchStatus {
            watch: self.watch.clone(),
            phase: self.phase,
            snapshot: self.last_snapshot.clone(),
            trigger: self.last_trigger.clone(),
            trade: self.trade.clone(),
            locked_reference: self.chain.as_ref().map(ChainCache::locked_reference),
            ladder: self
                .chain
                .as_ref()
                .map_or_else(Vec::new, |c| c.selected_contracts().to_vec()),
        }
    }

    /// Every transition goes through here and emits exactly one event.
    fn set_phase(&mut self, to: WatchPhase) {
        if self.phase == to {
            return;
        }
        let from = self.phase;
        self.phase = to;
        info!(watch = %self.watch.id, %from, %to, "phase change");
        self.emit(WatchEvent::PhaseChanged {
            watch_id: self.watch.id.clone(),
            from,
            to,
        });
    }

    fn emit(&self, event: WatchEvent) {
        let _ = self.event_tx.send(event);
    }

    fn warn_event(&self, message: String) {
        warn!(watch = %self.watch.id, %message);
        self.emit(WatchEvent::Warning {
            watch_id: Some(self.watch.id.clone()),
            message,
            timestamp: Utc::now(),
        });
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(self.config.adapter_timeout_ms)
    }
}

/// Run a read operation under the adapter deadline, retrying with doubling
/// backoff. Order submissions never go through here.
async fn read_with_retry<T, F, Fut>(
    op: &'static str,
    config: &MonitorConfig,
    mut call: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let deadline = Duration::from_millis(config.adapter_timeout_ms);
    let mut backoff = Duration::from_millis(config.retry_backoff_ms);
    let mut last = None;

    for attempt in 0..=config.read_retries {
        if attempt > 0 {
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
        match tokio::time::timeout(deadline, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => {
                debug!(%op, attempt, error = %e, "read failed");
                last = Some(EngineError::Adapter(e));
            }
            Err(_) => {
                debug!(%op, attempt, "read timed out");
                last = Some(EngineError::AdapterTimeout(op));
            }
        }
    }

    Err(last.unwrap_or(EngineError::AdapterTimeout(op)))
}
