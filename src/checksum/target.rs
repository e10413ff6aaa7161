//! Per-target checksum holders

use super::FileChecksumHolder;
use crate::model::{Checksum, ProductType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Checksum of one target, including everything it transitively depends on.
///
/// Dependencies are shared: a target reached along several paths is one
/// `Arc` referenced from every parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetChecksumHolder {
    pub name: String,
    pub product_name: String,
    pub product_type: ProductType,
    pub checksum: Checksum,
    pub files: Vec<FileChecksumHolder>,
    pub dependencies: Vec<Arc<TargetChecksumHolder>>,
}

impl TargetChecksumHolder {
    /// Transitive dependencies, de-duplicated by name.
    ///
    /// Pre-order walk; the first occurrence of a name wins.
    pub fn all_flat_dependencies(&self) -> Vec<Arc<TargetChecksumHolder>> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let mut stack: Vec<&Arc<TargetChecksumHolder>> =
            self.dependencies.iter().rev().collect();

        while let Some(holder) = stack.pop() {
            if !seen.insert(holder.name.as_str()) {
                continue;
            }
            result.push(Arc::clone(holder));
            stack.extend(holder.dependencies.iter().rev());
        }
        result
    }

    /// Transitive framework dependencies only
    pub fn all_framework_dependencies(&self) -> Vec<Arc<TargetChecksumHolder>> {
        self.all_flat_dependencies()
            .into_iter()
            .filter(|d| d.product_type.is_framework())
            .collect()
    }

    /// The persisted form: dependencies collapse to their names
    pub fn to_record(&self) -> TargetChecksumRecord {
        TargetChecksumRecord {
            name: self.name.clone(),
            product_name: self.product_name.clone(),
            product_type: self.product_type,
            checksum: self.checksum,
            files: self.files.clone(),
            dependencies: self.dependencies.iter().map(|d| d.name.clone()).collect(),
        }
    }
}

/// A target as written to a checksum tree document.
///
/// `dependencies` are unresolved references by name; the document never
/// nests dependency holders, which keeps its size linear in the target count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetChecksumRecord {
    pub name: String,
    pub product_name: String,
    pub product_type: ProductType,
    pub checksum: Checksum,
    pub files: Vec<FileChecksumHolder>,
    pub dependencies: Vec<String>,
}
