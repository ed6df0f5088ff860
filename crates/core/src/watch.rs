use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::instrument::Instrument;

/// Identifier of a watch rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchId(pub String);

impl std::fmt::Display for WatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WatchId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Trade direction the watch hunts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

/// Entry strategy kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Price pullback into a rising/falling moving average.
    MovingAverage,
    /// Price touching a Bollinger band.
    Bollinger,
}

/// A user-declared monitoring rule for one instrument/strategy pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watch {
    pub id: WatchId,
    pub instrument: Instrument,
    pub strategy: StrategyKind,
    /// Primary indicator period (bars).
    pub period: usize,
    /// Trigger band width in points.
    pub buffer_points: Decimal,
    /// Band standard-deviation multiplier (Bollinger strategy).
    pub band_std_dev: Decimal,
    pub direction: Direction,
    /// Optional confirmation MA period (moving-average strategy only).
    pub confirm_period: Option<usize>,
    pub enabled: bool,
    /// When false a fired signal is surfaced but never auto-submitted.
    pub auto_trade: bool,
    pub trade_config: TradeConfig,
}

impl Watch {
    /// Bars required before the indicator (and its direction) is computable.
    #[must_use]
    pub fn required_history(&self) -> usize {
        let confirm = self.confirm_period.unwrap_or(0);
        self.period.max(confirm) + 1
    }
}

/// Which legs an auto-trade submits and how each is sized.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradeConfig {
    pub legs: Vec<LegTarget>,
    pub exit: ExitConfig,
}

/// One leg of the trade configuration, resolved against the locked option
/// ladder at signal-fire time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LegTarget {
    /// The watched underlying itself (margin-traded futures take a quantity).
    Underlying { sizing: LegSizing },
    /// The nth-nearest OTM strike of the selected expiry (0 = nearest).
    OptionRank { rank: usize, sizing: LegSizing },
}

/// Amount-based legs are sized from capital; quantity-based legs are taken as
/// given and the amount is derived for display only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LegSizing {
    Amount { amount: Decimal },
    Quantity { quantity: Decimal },
}

/// Side of a crossing condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossSide {
    Above,
    Below,
}

/// Signed take-profit delta applied to the fill price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "lowercase")]
pub enum ExitDelta {
    Points { value: Decimal },
    /// Percentage of the fill price.
    Percent { value: Decimal },
}

/// Limit take-profit against the leg's own price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitExit {
    pub delta: ExitDelta,
}

/// Close at or after a wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeExit {
    pub at: NaiveTime,
}

/// Close when the underlying crosses the primary MA plus a signed offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaExit {
    pub side: CrossSide,
    pub offset_points: Decimal,
}

/// Which band line a band-cross exit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandExitTarget {
    Middle,
    /// The band opposite the entry side.
    Opposite,
}

/// Close when the underlying crosses a band line plus a signed offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandExit {
    pub target: BandExitTarget,
    pub side: CrossSide,
    pub offset_points: Decimal,
}

/// Composable exit rules. Snapshotted onto the trade at entry so later edits
/// to the watch's defaults never change a live position's rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExitConfig {
    pub limit: Option<LimitExit>,
    pub time: Option<TimeExit>,
    pub ma: Option<MaExit>,
    pub band: Option<BandExit>,
    /// Re-arm the watch after the position closes.
    #[serde(default)]
    pub loop_rearm: bool,
}

impl ExitConfig {
    /// Number of enabled exit conditions. Zero is valid but flagged at
    /// order-construction time.
    #[must_use]
    pub fn enabled_count(&self) -> usize {
        usize::from(self.limit.is_some())
            + usize::from(self.time.is_some())
            + usize::from(self.ma.is_some())
            + usize::from(self.band.is_some())
    }
}

/// Lifecycle phase of a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchPhase {
    Disabled,
    Watching,
    Triggered,
    /// Position open, no limit exit resting.
    Filled,
    /// Position open with a limit take-profit armed.
    LimitPending,
    Exiting,
    Closed,
}

impl std::fmt::Display for WatchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disabled => "disabled",
            Self::Watching => "watching",
            Self::Triggered => "triggered",
            Self::Filled => "filled",
            Self::LimitPending => "limit_pending",
            Self::Exiting => "exiting",
            Self::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

impl WatchPhase {
    /// Whether a position is open in this phase.
    #[must_use]
    pub fn is_holding(self) -> bool {
        matches!(self, Self::Filled | Self::LimitPending | Self::Exiting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn required_history_covers_confirm_ma() {
        let mut watch = Watch {
            id: "w1".into(),
            instrument: crate::instrument::Instrument::stock("SPY"),
            strategy: StrategyKind::MovingAverage,
            period: 21,
            buffer_points: dec!(5),
            band_std_dev: dec!(2),
            direction: Direction::Long,
            confirm_period: None,
            enabled: true,
            auto_trade: false,
            trade_config: TradeConfig::default(),
        };
        assert_eq!(watch.required_history(), 22);

        watch.confirm_period = Some(55);
        assert_eq!(watch.required_history(), 56);
    }

    #[test]
    fn exit_config_counts_enabled_conditions() {
        let mut cfg = ExitConfig::default();
        assert_eq!(cfg.enabled_count(), 0);

        cfg.time = Some(TimeExit {
            at: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
        });
        cfg.ma = Some(MaExit {
            side: CrossSide::Below,
            offset_points: dec!(-2),
        });
        assert_eq!(cfg.enabled_count(), 2);
    }
}
