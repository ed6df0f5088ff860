use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::traits::OrderSide;
use crate::watch::{Direction, ExitConfig, WatchId};

/// Lifecycle phase of an open trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradePhase {
    Filled,
    LimitPending,
    Exiting,
    Closed,
}

/// Why a trade was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    LimitTarget,
    TimeStop,
    MaCross,
    BandCross,
    Manual,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LimitTarget => write!(f, "limit_target"),
            Self::TimeStop => write!(f, "time_stop"),
            Self::MaCross => write!(f, "ma_cross"),
            Self::BandCross => write!(f, "band_cross"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// One filled leg of a trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilledLeg {
    pub contract_id: i64,
    pub description: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub multiplier: Decimal,
    pub fill_price: Decimal,
    pub order_id: Option<String>,
    /// Last known price, updated by the exit monitor's quote refreshes.
    pub current_price: Option<Decimal>,
}

impl FilledLeg {
    /// Cost basis of this leg.
    #[must_use]
    pub fn cost_basis(&self) -> Decimal {
        self.fill_price * self.quantity * self.multiplier
    }
}

/// An open (or archived) position created from a fired signal.
///
/// The exit configuration is a snapshot copied at entry time; later edits to
/// the watch's defaults never retroactively change a live position's rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub watch_id: WatchId,
    pub symbol: String,
    pub direction: Direction,
    pub legs: Vec<FilledLeg>,
    pub phase: TradePhase,
    pub exit: ExitConfig,
    pub entered_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_reason: Option<CloseReason>,
}

impl Trade {
    /// Total cost basis across all legs.
    #[must_use]
    pub fn cost_basis(&self) -> Decimal {
        self.legs.iter().map(FilledLeg::cost_basis).sum()
    }
}
