//! Indicator math and trigger-zone evaluation.
//!
//! Pure functions of the bar history plus the latest price; no venue calls.
//! Callers treat an unavailable indicator as `ready = false` and skip the
//! watch's pass.

pub mod evaluator;
pub mod indicators;

pub use evaluator::{crossed, evaluate, Evaluation, SignalTracker};
pub use indicators::{bollinger, sma, Bands};
