use thiserror::Error;

/// Engine-level rejections and failures.
///
/// Every variant carries a reason string so the operator can tell "no data
/// yet" from "your configuration is invalid" from "the venue rejected this".
#[derive(Debug, Error)]
pub enum EngineError {
    /// Insufficient history, missing quote, or missing chain. Handled locally
    /// by skipping the watch's pass; never substituted with a synthetic value.
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    /// A venue adapter call failed (rejection, disconnect).
    #[error("venue adapter error: {0}")]
    Adapter(#[source] anyhow::Error),

    /// A venue adapter call exceeded its deadline. Cached data stays in place.
    #[error("venue adapter timed out during {0}")]
    AdapterTimeout(&'static str),

    /// Rejected before any order was sent (e.g. sizing a leg with a
    /// non-positive ask, arming an exit monitor with zero conditions).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation conflicts with the watch's current lifecycle phase (e.g.
    /// re-filtering the chain while a position is open).
    #[error("lifecycle conflict: {0}")]
    LifecycleConflict(String),
}

impl EngineError {
    pub fn adapter(err: anyhow::Error) -> Self {
        Self::Adapter(err)
    }
}
