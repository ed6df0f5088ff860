use chrono::NaiveDate;
use rust_decimal::Decimal;
use sentinel_core::{
    MarketSnapshot, QuotedContract, Trade, TriggerState, Watch, WatchPhase,
};
use tokio::sync::oneshot;

/// Commands accepted by a watch actor's mailbox.
#[derive(Debug)]
pub enum WatchCommand {
    /// Resume evaluation. No effect while a position is open.
    Enable,
    /// Suspend evaluation. Rejected while a position is open.
    Disable,
    SetAutoTrade(bool),
    /// Replace the watch configuration. Rejected while a position is open.
    UpdateConfig(Box<Watch>),
    /// Force a triggered watch back to watching without touching any order.
    ResetSignal,
    /// Fetch a new option ladder centered on the current indicator value,
    /// replacing the locked reference. Rejected while a position is open.
    Refilter,
    /// Re-quote the cached contracts without moving the ladder. `None`
    /// refreshes every cached expiry.
    Refresh { expiry: Option<NaiveDate> },
    SelectExpiry(NaiveDate),
    /// Manually submit the configured legs for a triggered watch.
    PlaceOrder,
    /// Close the open trade at market with a manual close reason.
    CloseTrade,
    GetStatus(oneshot::Sender<WatchStatus>),
    Shutdown,
}

/// Point-in-time view of one watch, answered by its actor.
#[derive(Debug, Clone)]
pub struct WatchStatus {
    pub watch: Watch,
    pub phase: WatchPhase,
    pub snapshot: Option<MarketSnapshot>,
    pub trigger: Option<TriggerState>,
    pub trade: Option<Trade>,
    /// Reference price the option ladder was captured at, if captured.
    pub locked_reference: Option<Decimal>,
    /// Contracts of the selected expiry, nearest strike first.
    pub ladder: Vec<QuotedContract>,
}
