//! Immutable, versioned resource snapshots.
//!
//! A [`Snapshot`] holds one [`ResourceSet`] per resource type for one
//! requester group. Snapshots are never mutated after publication; a new
//! reconciliation produces a new snapshot that supersedes the old one.
mod resource;
#[allow(clippy::module_inception)]
mod snapshot;
mod version;

pub use resource::*;
pub use snapshot::*;
pub use version::*;
