//! Simulated venue adapter.
//!
//! Serves a scripted price path, a synthetic option chain, and immediate
//! fills without touching a real brokerage. Everything is deterministic so
//! tests can assert on exact prices and quantities.

mod venue;

pub use venue::SimVenue;
