//! Core data model types for kiln_cache

mod checksum;
mod product;

pub use checksum::Checksum;
pub use product::ProductType;
