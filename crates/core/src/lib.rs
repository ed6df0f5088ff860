pub mod config;
pub mod config_loader;
pub mod error;
pub mod events;
pub mod instrument;
pub mod market;
pub mod trade;
pub mod traits;
pub mod watch;

pub use config::{EngineConfig, LadderConfig, MonitorConfig};
pub use config_loader::ConfigLoader;
pub use error::EngineError;
pub use events::WatchEvent;
pub use instrument::{Instrument, OptionContract, OptionRight, QuotedContract, SecurityType};
pub use market::{
    IndicatorDirection, IndicatorValues, MarketSnapshot, Signal, TriggerState, ZoneStatus,
};
pub use trade::{CloseReason, FilledLeg, Trade, TradePhase};
pub use traits::{
    AccountSummary, ContractQuote, LegAck, LegOrder, LegStatus, OrderSide, OrderType,
    QuoteSnapshot, VenueAdapter, VenuePosition, UNDERLYING_CONTRACT_ID,
};
pub use watch::{
    BandExit, BandExitTarget, CrossSide, Direction, ExitConfig, ExitDelta, LegSizing, LegTarget,
    LimitExit, MaExit, StrategyKind, TimeExit, TradeConfig, Watch, WatchId, WatchPhase,
};
