//! File system operations for volume backups.

pub mod metadata;
pub mod walker;

pub use metadata::EntryMetadata;
pub use walker::{VolumeEntry, VolumeWalker};
