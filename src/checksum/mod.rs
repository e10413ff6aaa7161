//! Merkle checksums over the target graph
//!
//! Leaf checksums come from file content; every target folds its
//! dependencies' checksums and its own files' checksums, so a target's
//! checksum changes whenever anything it transitively depends on changes.
//! Targets are grouped by project file, and projects into one root aggregate
//! which is the persisted result of a run.

mod builder;
mod cache;
mod calculator;
mod file;
mod project;
mod target;

pub use builder::TargetChecksumBuilder;
pub use cache::ChecksumCache;
pub use calculator::ProjectChecksumCalculator;
pub use file::{FileChecksumHolder, FileChecksumProducer, FsChecksumProducer};
pub use project::{ProjectChecksumHolder, RootChecksumHolder, ROOT_NAME};
pub use target::{TargetChecksumHolder, TargetChecksumRecord};
