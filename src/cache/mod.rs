//! Process-wide snapshot cache with one-shot watches.
//!
//! The cache maps a [`GroupKey`] to its latest [`crate::Snapshot`]. Readers
//! never block each other; a publish replaces the snapshot and wakes every
//! watch that now observes a different version, in one critical section.
mod key;
mod snapshot_cache;
mod watch;

pub use key::*;
pub use snapshot_cache::*;
pub use watch::*;
