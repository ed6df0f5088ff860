use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::watch::{Direction, WatchId};

/// Direction of the primary indicator between the last two computed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndicatorDirection {
    Rising,
    Falling,
}

impl IndicatorDirection {
    /// Policy: a flat indicator (current == previous) reads as `Falling`.
    #[must_use]
    pub fn from_pair(current: Decimal, previous: Decimal) -> Self {
        if current > previous {
            Self::Rising
        } else {
            Self::Falling
        }
    }

    #[must_use]
    pub fn agrees_with(self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (Self::Rising, Direction::Long) | (Self::Falling, Direction::Short)
        )
    }
}

/// Indicator values computed for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorValues {
    Ma { value: Decimal },
    Bands { upper: Decimal, middle: Decimal, lower: Decimal },
}

impl IndicatorValues {
    /// The primary line: the MA itself, or the middle band.
    #[must_use]
    pub fn primary(&self) -> Decimal {
        match self {
            Self::Ma { value } => *value,
            Self::Bands { middle, .. } => *middle,
        }
    }
}

/// Ephemeral per-tick view of one watch's market state. Superseded every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub price: Decimal,
    pub indicator: IndicatorValues,
    /// Previous primary indicator value, for direction.
    pub prev_primary: Decimal,
    /// Confirmation MA value when the watch has one configured.
    pub confirm_value: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl MarketSnapshot {
    #[must_use]
    pub fn indicator_direction(&self) -> IndicatorDirection {
        IndicatorDirection::from_pair(self.indicator.primary(), self.prev_primary)
    }
}

/// Zone status derived per tick. `Active` implies the trigger conditions held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneStatus {
    /// Directional prerequisite not met (MA strategy only).
    Inactive,
    /// Prerequisites met, price outside the trigger band.
    Ready,
    /// Price inside the trigger band.
    Active,
}

/// Derived trigger state; recomputed deterministically from snapshot + watch,
/// never cached independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerState {
    pub status: ZoneStatus,
    /// The numeric trigger band currently in force, low..=high.
    pub band_low: Decimal,
    pub band_high: Decimal,
    /// Confirmation indicator agreement; `None` when no confirm MA is
    /// configured. Reported every tick, never gates `Active` on its own.
    pub confirm_ok: Option<bool>,
}

impl TriggerState {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ZoneStatus::Active
    }
}

/// A fired entry signal: the edge transition from non-active to active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub watch_id: WatchId,
    pub symbol: String,
    pub direction: Direction,
    pub price: Decimal,
    /// Primary indicator value at fire time.
    pub indicator_value: Decimal,
    pub band_low: Decimal,
    pub band_high: Decimal,
    pub confirm_ok: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn flat_indicator_reads_falling() {
        let dir = IndicatorDirection::from_pair(dec!(100), dec!(100));
        assert_eq!(dir, IndicatorDirection::Falling);
    }

    #[test]
    fn direction_agreement() {
        assert!(IndicatorDirection::Rising.agrees_with(Direction::Long));
        assert!(IndicatorDirection::Falling.agrees_with(Direction::Short));
        assert!(!IndicatorDirection::Rising.agrees_with(Direction::Short));
        assert!(!IndicatorDirection::Falling.agrees_with(Direction::Long));
    }

    #[test]
    fn primary_is_middle_band() {
        let bands = IndicatorValues::Bands {
            upper: dec!(110),
            middle: dec!(100),
            lower: dec!(90),
        };
        assert_eq!(bands.primary(), dec!(100));
    }
}
