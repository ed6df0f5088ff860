use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub monitor: MonitorConfig,
    pub ladder: LadderConfig,
    /// Watch-list snapshot file restored at startup.
    pub watchlist_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Evaluation tick interval per watch, milliseconds.
    pub tick_interval_ms: u64,
    /// Deadline for every venue adapter call, milliseconds.
    pub adapter_timeout_ms: u64,
    /// How often the historical bar series is refetched, seconds.
    pub bars_refresh_secs: u64,
    /// Bars requested from the venue for indicator history.
    pub history_bars: usize,
    /// Retry attempts for read operations (quotes, bars, chain).
    pub read_retries: u32,
    /// Base backoff between read retries, milliseconds.
    pub retry_backoff_ms: u64,
    /// How often account summary/positions are published, seconds.
    pub account_refresh_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderConfig {
    /// OTM strikes captured per expiry.
    pub strikes: usize,
    /// Nearest expiries captured per re-filter.
    pub expiries: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig::default(),
            ladder: LadderConfig::default(),
            watchlist_path: "config/watchlist.json".to_string(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            adapter_timeout_ms: 10_000,
            bars_refresh_secs: 3_600,
            history_bars: 120,
            read_retries: 3,
            retry_backoff_ms: 500,
            account_refresh_secs: 300,
        }
    }
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            strikes: 5,
            expiries: 3,
        }
    }
}
