//! Cache configuration
//!
//! Sources, later wins: built-in defaults, a JSON file, then `KILN_*`
//! environment variables.

use crate::remote::{Auth, HttpCacheClient, RemoteSettings};
use crate::store::{
    BuildProductCacheStorage, LocalBuildProductCacheStorage, MixedBuildProductCacheStorage,
    RemoteBuildProductCacheStorage,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub const ENV_CACHE_DIR: &str = "KILN_CACHE_DIR";
pub const ENV_REMOTE_URL: &str = "KILN_REMOTE_URL";
pub const ENV_API_TOKEN: &str = "KILN_API_TOKEN";
pub const ENV_UPLOAD: &str = "KILN_UPLOAD";

/// Downloads from the remote are unpacked here, and removed once copied into the local cache
const REMOTE_DOWNLOAD_DIR: &str = ".remote-downloads";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Root of the local cache
    pub cache_dir: PathBuf,
    /// Shared cache service, if any
    pub remote: Option<RemoteSettings>,
    /// Whether stores also go to the remote
    pub upload: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
        CacheConfig {
            cache_dir: base.join("kiln"),
            remote: None,
            upload: false,
        }
    }
}

impl CacheConfig {
    /// Defaults, overlaid by `path` when given and present, then by the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// A missing file yields the defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay settings from environment variables, looked up through `var`
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = var(ENV_CACHE_DIR).filter(|v| !v.is_empty()) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(url) = var(ENV_REMOTE_URL).filter(|v| !v.is_empty()) {
            match self.remote.as_mut() {
                Some(remote) => remote.url = url,
                None => self.remote = Some(RemoteSettings::new(url)),
            }
        }
        if let Some(token) = var(ENV_API_TOKEN).filter(|v| !v.is_empty()) {
            match self.remote.as_mut() {
                Some(remote) => remote.auth = Auth::Token(token),
                None => warn!("{} is set but no remote cache is configured", ENV_API_TOKEN),
            }
        }
        if let Some(upload) = var(ENV_UPLOAD) {
            self.upload = parse_flag(&upload).ok_or_else(|| {
                Error::Config(format!("{} must be a boolean, got {:?}", ENV_UPLOAD, upload))
            })?;
        }
        Ok(())
    }

    /// The storage hierarchy this configuration describes: the local cache
    /// alone, or the local cache in front of the remote one
    pub fn storage(&self) -> Result<Box<dyn BuildProductCacheStorage>> {
        let local = LocalBuildProductCacheStorage::new(&self.cache_dir);
        let Some(settings) = &self.remote else {
            return Ok(Box::new(local));
        };

        let client = Arc::new(HttpCacheClient::new(settings.clone())?);
        let remote =
            RemoteBuildProductCacheStorage::new(client, self.cache_dir.join(REMOTE_DOWNLOAD_DIR));
        Ok(Box::new(MixedBuildProductCacheStorage::new(
            local,
            remote,
            self.upload,
        )))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert!(config.cache_dir.ends_with("kiln"));
        assert_eq!(config.remote, None);
        assert!(!config.upload);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let config = CacheConfig::from_file(&dir.path().join("kiln.json")).unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_file_roundtrip_and_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kiln.json");

        let mut config = CacheConfig::default();
        config.cache_dir = dir.path().join("cache");
        config.remote = Some(RemoteSettings::new("http://cache.local"));
        config.upload = true;
        config.save(&path).unwrap();
        assert_eq!(CacheConfig::from_file(&path).unwrap(), config);

        std::fs::write(&path, r#"{"upload": true}"#).unwrap();
        let partial = CacheConfig::from_file(&path).unwrap();
        assert!(partial.upload);
        assert_eq!(partial.cache_dir, CacheConfig::default().cache_dir);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CacheConfig::default();
        config
            .apply_env(env(&[
                (ENV_CACHE_DIR, "/tmp/kiln-env"),
                (ENV_REMOTE_URL, "https://cache.example.com"),
                (ENV_API_TOKEN, "t0ken"),
                (ENV_UPLOAD, "true"),
            ]))
            .unwrap();

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/kiln-env"));
        let remote = config.remote.unwrap();
        assert_eq!(remote.url, "https://cache.example.com");
        assert_eq!(remote.auth, Auth::Token("t0ken".into()));
        assert!(config.upload);
    }

    #[test]
    fn test_invalid_upload_flag() {
        let mut config = CacheConfig::default();
        let result = config.apply_env(env(&[(ENV_UPLOAD, "sometimes")]));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_token_without_remote_is_ignored() {
        let mut config = CacheConfig::default();
        config.apply_env(env(&[(ENV_API_TOKEN, "t0ken")])).unwrap();
        assert_eq!(config.remote, None);
    }

    #[test]
    fn test_local_only_storage() {
        let dir = tempdir().unwrap();
        let config = CacheConfig {
            cache_dir: dir.path().to_path_buf(),
            remote: None,
            upload: false,
        };
        let storage = config.storage().unwrap();
        let key = crate::store::BuildProductCacheKey::new(
            "Kit",
            crate::model::ProductType::Framework,
            crate::model::Checksum::digest(b"kit"),
        );
        assert_eq!(storage.lookup(&key).unwrap(), None);
    }
}
