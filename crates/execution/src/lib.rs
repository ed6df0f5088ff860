//! Order sizing, entry submission, and exit monitoring.
//!
//! Sizing turns leg targets plus last-known asks into whole-contract
//! quantities. Entry submission sends all accepted legs as one order group
//! under a single trade id, with per-leg acks. The exit monitor evaluates up
//! to four conditions per tick in a fixed precedence order and reports the
//! first that matches.

pub mod exits;
pub mod order;
pub mod sizing;

pub use exits::{check_exits, limit_target};
pub use order::{plan_order, submit_entry, EntryReport, OrderPlan, RejectedLeg};
pub use sizing::{size_leg, ExcludedLeg, LegQuote, PlannedLeg, SizedLeg};
