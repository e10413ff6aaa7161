//! Remote cache service clients
//!
//! The service is a flat byte store keyed by a cache key's string form.

mod http;

use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

pub use http::{Auth, HttpCacheClient, RemoteSettings, DEFAULT_TIMEOUT_SECS};

/// Byte-level access to a remote cache service
pub trait RemoteCacheClient: Send + Sync {
    /// `Ok(None)` when the service has nothing under `key`
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &str, data: Vec<u8>) -> Result<()>;
}

/// In-process cache service that can be switched offline
pub struct MemoryCacheClient {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    online: AtomicBool,
}

impl Default for MemoryCacheClient {
    fn default() -> Self {
        MemoryCacheClient {
            entries: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
        }
    }
}

impl MemoryCacheClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with [`Error::Network`]
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn check_online(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Network("remote cache is offline".into()))
        }
    }
}

impl RemoteCacheClient for MemoryCacheClient {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_online()?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: &str, data: Vec<u8>) -> Result<()> {
        self.check_online()?;
        self.entries.write().insert(key.to_string(), data);
        Ok(())
    }
}
