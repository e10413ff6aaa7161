//! Product kinds a target can build

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a target produces. Serialized as the native project's identifier.
/// Identifiers without a variant of their own read as [`ProductType::None`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProductType {
    #[serde(rename = "com.apple.product-type.framework")]
    Framework,
    #[serde(rename = "com.apple.product-type.bundle")]
    Bundle,
    #[serde(rename = "com.apple.product-type.library.static")]
    StaticLibrary,
    #[serde(rename = "com.apple.product-type.library.dynamic")]
    DynamicLibrary,
    #[serde(rename = "com.apple.product-type.application")]
    Application,
    #[serde(rename = "com.apple.product-type.bundle.unit-test")]
    UnitTestBundle,
    #[default]
    #[serde(rename = "none", other)]
    None,
}

impl ProductType {
    /// The identifier used in the project file, persisted trees and cache paths
    pub fn raw_value(&self) -> &'static str {
        match self {
            ProductType::Framework => "com.apple.product-type.framework",
            ProductType::Bundle => "com.apple.product-type.bundle",
            ProductType::StaticLibrary => "com.apple.product-type.library.static",
            ProductType::DynamicLibrary => "com.apple.product-type.library.dynamic",
            ProductType::Application => "com.apple.product-type.application",
            ProductType::UnitTestBundle => "com.apple.product-type.bundle.unit-test",
            ProductType::None => "none",
        }
    }

    pub fn from_raw_value(raw: &str) -> Option<Self> {
        [
            ProductType::Framework,
            ProductType::Bundle,
            ProductType::StaticLibrary,
            ProductType::DynamicLibrary,
            ProductType::Application,
            ProductType::UnitTestBundle,
            ProductType::None,
        ]
        .into_iter()
        .find(|t| t.raw_value() == raw)
    }

    /// File extension of the built product, without the dot
    pub fn file_extension(&self) -> &'static str {
        match self {
            ProductType::Framework => "framework",
            ProductType::Bundle => "bundle",
            ProductType::StaticLibrary => "a",
            ProductType::DynamicLibrary => "dylib",
            ProductType::Application => "app",
            ProductType::UnitTestBundle => "xctest",
            ProductType::None => "",
        }
    }

    /// Resource files only count towards the checksum of bundles
    pub fn is_bundle(&self) -> bool {
        matches!(self, ProductType::Bundle)
    }

    pub fn is_framework(&self) -> bool {
        matches!(self, ProductType::Framework)
    }

    /// Whether `name` can be loaded as a product of this type.
    /// The toolchain cannot load frameworks whose name contains a hyphen.
    pub fn is_valid_product_name(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        match self {
            ProductType::Framework => !name.contains('-'),
            _ => true,
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw_value())
    }
}
