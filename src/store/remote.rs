//! Cache backed by a remote cache service

use super::{archive, BuildProductCacheKey, BuildProductCacheStorage, BuildProductCacheValue};
use crate::remote::RemoteCacheClient;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Talks to a [`RemoteCacheClient`] using the key's string form.
///
/// Downloaded artifacts are unpacked into a scratch directory under
/// `download_dir` that belongs to the returned hit, so nothing downloaded
/// outlives the caller's use of it. Failing to reach the service while
/// looking up is a miss; failing while storing is an error.
pub struct RemoteBuildProductCacheStorage {
    client: Arc<dyn RemoteCacheClient>,
    download_dir: PathBuf,
}

impl RemoteBuildProductCacheStorage {
    pub fn new(client: Arc<dyn RemoteCacheClient>, download_dir: impl Into<PathBuf>) -> Self {
        RemoteBuildProductCacheStorage {
            client,
            download_dir: download_dir.into(),
        }
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    fn fetch(&self, key: &BuildProductCacheKey) -> Result<Option<Vec<u8>>> {
        match self.client.get(&key.to_string()) {
            Ok(found) => Ok(found),
            Err(e @ (Error::Network(_) | Error::Http(_))) => {
                warn!(key = %key, error = %e, "remote cache unreachable, treating as miss");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn materialize(&self, key: &BuildProductCacheKey, payload: &[u8]) -> Result<(TempDir, PathBuf)> {
        let root = &self.download_dir;
        std::fs::create_dir_all(root).map_err(|e| Error::storage(root, e))?;
        let scratch = tempfile::Builder::new()
            .prefix(".download-")
            .tempdir_in(root)
            .map_err(|e| Error::storage(root, e))?;
        let artifact = scratch.path().join(key.file_name());
        archive::unpack(payload, &artifact)?;
        Ok((scratch, artifact))
    }
}

impl BuildProductCacheStorage for RemoteBuildProductCacheStorage {
    fn lookup(&self, key: &BuildProductCacheKey) -> Result<Option<BuildProductCacheValue>> {
        key.validate()?;
        let payload = match self.fetch(key)? {
            Some(payload) => payload,
            None => {
                debug!(key = %key, "remote cache miss");
                return Ok(None);
            }
        };

        match self.materialize(key, &payload) {
            Ok((scratch, path)) => {
                debug!(key = %key, bytes = payload.len(), "remote cache hit");
                Ok(Some(BuildProductCacheValue::in_scratch(key.clone(), path, scratch)))
            }
            Err(Error::Corruption(reason)) => {
                warn!(key = %key, reason = %reason, "corrupt remote artifact, treating as miss");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn store(&self, key: &BuildProductCacheKey, artifact: &Path) -> Result<()> {
        key.validate()?;
        let payload = archive::pack(artifact)?;
        let bytes = payload.len();
        self.client.put(&key.to_string(), payload)?;
        info!(key = %key, bytes, "uploaded to remote cache");
        Ok(())
    }
}
