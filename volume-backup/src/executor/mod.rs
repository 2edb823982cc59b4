//! Store and restore orchestration.
//!
//! [`store::BackupEngine`] resolves the data container and writes the
//! descriptor plus every volume into one archive.
//! [`restore::RestoreEngine`] recreates the container from the archived
//! descriptor and replays the volumes into the new container's host paths.

pub mod mapping;
pub mod restore;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use mapping::PathTranslationTable;
pub use restore::{RestoreEngine, RestoreState, RestoreSummary};
pub use store::{BackupEngine, StoreSummary};
