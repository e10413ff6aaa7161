//! Per-configuration projection of a checksum tree into cache-ready records

use crate::checksum::{RootChecksumHolder, TargetChecksumRecord};
use crate::model::{Checksum, ProductType};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// One target of a dependency closure, keyed for a specific build configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub target_name: String,
    pub product_name: String,
    pub product_type: ProductType,
    pub dependencies: Vec<String>,
    /// Target checksum mixed with the build-parameters checksum
    pub checksum: Checksum,
}

impl TargetInfo {
    fn new(record: &TargetChecksumRecord, build_parameters: &Checksum) -> Self {
        TargetInfo {
            target_name: record.name.clone(),
            product_name: record.product_name.clone(),
            product_type: record.product_type,
            dependencies: record.dependencies.clone(),
            checksum: record.checksum.add(build_parameters),
        }
    }
}

/// Checksum of a build configuration given as key/value parameters.
///
/// Keys are sorted, so the result does not depend on declaration order.
pub fn build_parameters_checksum(parameters: &BTreeMap<String, String>) -> Result<Checksum> {
    let canonical = serde_json::to_vec(parameters)?;
    Ok(Checksum::digest(&canonical))
}

/// Resolves [`TargetInfo`]s from a persisted checksum tree.
///
/// One checksum run serves any number of build configurations: each
/// configuration only mixes its own checksum into the stored target checksums.
pub struct TargetInfoProvider {
    checksum_holder: RootChecksumHolder,
}

impl TargetInfoProvider {
    pub fn new(checksum_holder: RootChecksumHolder) -> Self {
        TargetInfoProvider { checksum_holder }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(RootChecksumHolder::load(path)?))
    }

    pub fn checksum_holder(&self) -> &RootChecksumHolder {
        &self.checksum_holder
    }

    /// Persist the underlying checksum tree
    pub fn save_checksum(&self, path: impl AsRef<Path>) -> Result<()> {
        self.checksum_holder.save(path)
    }

    /// The transitive dependency closure of `target`, de-duplicated by name.
    ///
    /// Order is a pre-order walk of declared dependencies; the first occurrence
    /// of a target wins. The root itself is not included.
    pub fn dependencies(
        &self,
        target: &str,
        build_parameters: &Checksum,
    ) -> Result<Vec<TargetInfo>> {
        let index = self.checksum_holder.target_index();
        let root = index
            .get(target)
            .ok_or_else(|| Error::EmptyTargetChecksum {
                target_name: target.to_string(),
            })?;

        Ok(flatten(root, &index)
            .into_iter()
            .map(|record| TargetInfo::new(record, build_parameters))
            .collect())
    }

    /// The target producing `product_name`
    pub fn target_info(&self, product_name: &str, build_parameters: &Checksum) -> Result<TargetInfo> {
        self.checksum_holder
            .targets()
            .find(|t| t.product_name == product_name)
            .map(|record| TargetInfo::new(record, build_parameters))
            .ok_or_else(|| Error::EmptyProductChecksum {
                product_name: product_name.to_string(),
            })
    }
}

/// Dependency names are references into the document; unknown names are skipped
fn flatten<'a>(
    root: &'a TargetChecksumRecord,
    index: &HashMap<&str, &'a TargetChecksumRecord>,
) -> Vec<&'a TargetChecksumRecord> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    let mut stack: Vec<&str> = root.dependencies.iter().rev().map(String::as_str).collect();

    while let Some(name) = stack.pop() {
        if !seen.insert(name) {
            continue;
        }
        if let Some(&record) = index.get(name) {
            result.push(record);
            stack.extend(record.dependencies.iter().rev().map(String::as_str));
        }
    }
    result
}

/// Narrows resolved targets down to what artifact integration needs
pub struct TargetInfoFilter<'a> {
    provider: &'a TargetInfoProvider,
}

impl<'a> TargetInfoFilter<'a> {
    pub fn new(provider: &'a TargetInfoProvider) -> Self {
        TargetInfoFilter { provider }
    }

    pub fn obtain_required_targets(
        &self,
        target_name: &str,
        build_parameters: &Checksum,
    ) -> Result<Vec<TargetInfo>> {
        self.provider.dependencies(target_name, build_parameters)
    }

    /// Bundles are carried inside the frameworks that use them and are not integrated on their own
    pub fn framework_target_infos(&self, target_infos: &[TargetInfo]) -> Vec<TargetInfo> {
        target_infos
            .iter()
            .filter(|info| !info.product_type.is_bundle())
            .cloned()
            .collect()
    }
}
