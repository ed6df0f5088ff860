//! Watch lifecycle orchestration.
//!
//! One actor per watch owns that watch's state and runs its evaluation
//! passes; a mailbox serializes commands with ticks so no two passes for the
//! same watch ever interleave. The registry spawns actors, hands out
//! handles, and owns the shared event feed.

pub mod actor;
pub mod commands;
pub mod handle;
pub mod registry;
pub mod store;

pub use actor::WatchActor;
pub use commands::{WatchCommand, WatchStatus};
pub use handle::WatchHandle;
pub use registry::WatchRegistry;
