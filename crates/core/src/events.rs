use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::instrument::QuotedContract;
use crate::market::{MarketSnapshot, Signal, TriggerState};
use crate::trade::{CloseReason, Trade};
use crate::traits::{AccountSummary, VenuePosition};
use crate::watch::{Watch, WatchId, WatchPhase};

/// State-change feed published to subscribers.
///
/// Every state transition the engine makes produces exactly one event, in the
/// order the transition occurred.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WatchEvent {
    WatchCreated {
        watch: Watch,
    },

    WatchUpdated {
        watch: Watch,
    },

    WatchRemoved {
        watch_id: WatchId,
    },

    /// Lifecycle transition of one watch.
    PhaseChanged {
        watch_id: WatchId,
        from: WatchPhase,
        to: WatchPhase,
    },

    /// Per-tick data update: price, indicator values, trigger-zone status.
    TickUpdate {
        watch_id: WatchId,
        snapshot: MarketSnapshot,
        trigger: TriggerState,
    },

    /// An entry signal fired, with the option ladder locked at fire time.
    SignalFired {
        signal: Signal,
        ladder: Vec<QuotedContract>,
    },

    /// A trade was opened (legs filled or submitted).
    TradeOpened {
        trade: Trade,
    },

    /// Leg quotes or phase of an open trade changed.
    TradeUpdated {
        trade: Trade,
    },

    /// A trade closed; the owning watch re-arms or disables per its config.
    TradeClosed {
        trade: Trade,
        reason: CloseReason,
    },

    /// Periodic account/position refresh from the venue.
    AccountUpdate {
        summary: AccountSummary,
        positions: Vec<VenuePosition>,
    },

    /// Operator-facing warning: rejected configuration, stale data, partial
    /// leg rejection. Carries the reason string from the error taxonomy.
    Warning {
        watch_id: Option<WatchId>,
        message: String,
        timestamp: DateTime<Utc>,
    },
}
