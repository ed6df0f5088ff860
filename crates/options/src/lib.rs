//! Per-watch option chain cache.
//!
//! Two distinct operations, never conflated: a **re-filter** fetches a fresh
//! contract ladder centered on the current indicator value and replaces the
//! locked reference wholesale; a **refresh** re-queries quotes for the
//! existing contract set only. The ladder never silently re-centers when only
//! quotes move.

pub mod chain;

pub use chain::ChainCache;
