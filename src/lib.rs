//! # kiln_cache
//!
//! A content-addressed cache for the build products of a modular target graph.
//!
//! Every target gets a Merkle checksum folded from its own files and the
//! checksums of everything it depends on, so a target's key changes exactly
//! when something able to affect its output changes. The keys address
//! build products in a local cache, optionally backed by a shared remote one.
//!
//! ## Core Concepts
//!
//! - **Checksums**: BLAKE3 digests of file content, combined bottom-up through the graph
//! - **Checksum trees**: The persisted result of a run, one record per target
//! - **Target infos**: A root target's dependency closure keyed for one build configuration
//! - **Storage**: Local, remote and mixed backends behind one lookup/store interface
//!
//! ## Example
//!
//! ```ignore
//! use kiln_cache::{FsChecksumProducer, ProjectChecksumCalculator, ProjectGraph};
//!
//! let graph = ProjectGraph::load("graph.json")?;
//! let tree = ProjectChecksumCalculator::new(FsChecksumProducer::new()).calculate(&graph)?;
//! tree.save("checksums.json")?;
//! ```

pub mod checksum;
pub mod config;
pub mod graph;
pub mod model;
pub mod remote;
pub mod store;
pub mod targets;
pub mod tree;

mod error;

pub use checksum::{
    ChecksumCache, FileChecksumHolder, FileChecksumProducer, FsChecksumProducer,
    ProjectChecksumCalculator, ProjectChecksumHolder, RootChecksumHolder, TargetChecksumBuilder,
    TargetChecksumHolder, TargetChecksumRecord,
};
pub use config::CacheConfig;
pub use error::{Error, ErrorCategory, Result};
pub use graph::{ProjectDescriptor, ProjectGraph, TargetDescriptor};
pub use model::{Checksum, ProductType};
pub use remote::{Auth, HttpCacheClient, MemoryCacheClient, RemoteCacheClient, RemoteSettings};
pub use store::{
    BuildProductCacheKey, BuildProductCacheStorage, BuildProductCacheValue,
    LocalBuildProductCacheStorage, MixedBuildProductCacheStorage, RemoteBuildProductCacheStorage,
};
pub use targets::{build_parameters_checksum, TargetInfo, TargetInfoFilter, TargetInfoProvider};
pub use tree::{diff, render_diff, DiffChange, DiffNode, TreeNode, TreeNodeConvertible};
