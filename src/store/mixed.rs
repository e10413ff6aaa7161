//! Local cache in front of a remote one

use super::{BuildProductCacheKey, BuildProductCacheStorage, BuildProductCacheValue};
use crate::{Error, Result};
use std::path::Path;
use tracing::debug;

/// Looks up locally first, then remotely. Remote hits are copied into the
/// local cache before they are returned, so the next lookup stays local.
///
/// Stores always go to the local cache; they reach the remote only when
/// `should_upload` is set, which keeps read-only machines from publishing.
pub struct MixedBuildProductCacheStorage<L, R> {
    local: L,
    remote: R,
    should_upload: bool,
}

impl<L, R> MixedBuildProductCacheStorage<L, R>
where
    L: BuildProductCacheStorage,
    R: BuildProductCacheStorage,
{
    pub fn new(local: L, remote: R, should_upload: bool) -> Self {
        MixedBuildProductCacheStorage {
            local,
            remote,
            should_upload,
        }
    }

    pub fn should_upload(&self) -> bool {
        self.should_upload
    }
}

impl<L, R> BuildProductCacheStorage for MixedBuildProductCacheStorage<L, R>
where
    L: BuildProductCacheStorage,
    R: BuildProductCacheStorage,
{
    fn lookup(&self, key: &BuildProductCacheKey) -> Result<Option<BuildProductCacheValue>> {
        if let Some(hit) = self.local.lookup(key)? {
            return Ok(Some(hit));
        }
        let Some(remote_hit) = self.remote.lookup(key)? else {
            return Ok(None);
        };

        debug!(key = %key, "copying remote hit into local cache");
        self.local.store(key, &remote_hit.path)?;
        self.local.lookup(key)?.map(Some).ok_or_else(|| {
            Error::Corruption(format!("{} missing from local cache right after store", key))
        })
    }

    fn store(&self, key: &BuildProductCacheKey, artifact: &Path) -> Result<()> {
        self.local.store(key, artifact)?;
        if self.should_upload {
            self.remote.store(key, artifact)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Checksum, ProductType};
    use crate::remote::MemoryCacheClient;
    use crate::store::{LocalBuildProductCacheStorage, RemoteBuildProductCacheStorage};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn key() -> BuildProductCacheKey {
        BuildProductCacheKey::new("Kit", ProductType::Framework, Checksum::digest(b"kit"))
    }

    fn artifact(root: &Path) -> PathBuf {
        let path = root.join("Kit.framework");
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("Kit"), b"binary").unwrap();
        path
    }

    fn mixed(
        root: &Path,
        client: Arc<MemoryCacheClient>,
        upload: bool,
    ) -> MixedBuildProductCacheStorage<LocalBuildProductCacheStorage, RemoteBuildProductCacheStorage>
    {
        MixedBuildProductCacheStorage::new(
            LocalBuildProductCacheStorage::new(root.join("local")),
            RemoteBuildProductCacheStorage::new(client, root.join("downloads")),
            upload,
        )
    }

    #[test]
    fn test_remote_hit_is_written_through() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MemoryCacheClient::new());
        RemoteBuildProductCacheStorage::new(client.clone(), dir.path().join("uploader"))
            .store(&key(), &artifact(dir.path()))
            .unwrap();

        let storage = mixed(dir.path(), client.clone(), false);
        let hit = storage.lookup(&key()).unwrap().unwrap();
        assert!(hit.path.starts_with(dir.path().join("local")));

        client.set_online(false);
        let again = storage.lookup(&key()).unwrap().unwrap();
        assert_eq!(fs::read(again.path.join("Kit")).unwrap(), b"binary");
    }

    #[test]
    fn test_write_through_leaves_no_download_behind() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MemoryCacheClient::new());
        let src = artifact(dir.path());
        fs::write(src.join("Kit"), vec![7u8; 1 << 20]).unwrap();
        RemoteBuildProductCacheStorage::new(client.clone(), dir.path().join("uploader"))
            .store(&key(), &src)
            .unwrap();

        let storage = mixed(dir.path(), client, false);
        let hit = storage.lookup(&key()).unwrap().unwrap();
        assert!(!hit.is_transient());
        assert_eq!(fs::read(hit.path.join("Kit")).unwrap().len(), 1 << 20);

        let leftovers = fs::read_dir(dir.path().join("downloads")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_store_without_upload_stays_local() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MemoryCacheClient::new());
        let storage = mixed(dir.path(), client.clone(), false);

        storage.store(&key(), &artifact(dir.path())).unwrap();
        assert!(client.is_empty());
        assert!(storage.lookup(&key()).unwrap().is_some());
    }

    #[test]
    fn test_store_with_upload_reaches_remote() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MemoryCacheClient::new());
        let storage = mixed(dir.path(), client.clone(), true);

        storage.store(&key(), &artifact(dir.path())).unwrap();
        assert!(client.contains(&key().to_string()));
    }

    #[test]
    fn test_upload_failure_is_reported() {
        let dir = tempdir().unwrap();
        let client = Arc::new(MemoryCacheClient::new());
        client.set_online(false);
        let storage = mixed(dir.path(), client, true);

        assert!(storage.store(&key(), &artifact(dir.path())).is_err());
        // The local copy was still written
        assert!(storage.lookup(&key()).unwrap().is_some());
    }

    #[test]
    fn test_miss_everywhere() {
        let dir = tempdir().unwrap();
        let storage = mixed(dir.path(), Arc::new(MemoryCacheClient::new()), false);
        assert_eq!(storage.lookup(&key()).unwrap(), None);
    }
}
