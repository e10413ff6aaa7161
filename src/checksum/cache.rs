//! Memoization of target checksums for one checksum run

use super::TargetChecksumHolder;
use crate::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::ThreadId;

enum Slot {
    /// Being computed by the given thread
    InProgress(ThreadId),
    Ready(Arc<TargetChecksumHolder>),
}

/// Outcome of claiming a target in the cache
pub(crate) enum Claim {
    /// Already computed
    Hit(Arc<TargetChecksumHolder>),
    /// The caller now owns the computation and must `fulfill` or `abandon` it
    Owned,
}

/// Shared memo of computed targets, keyed by target name.
///
/// Each target is computed at most once per cache. A thread that finds a
/// target in progress on another thread waits for it; finding it in progress
/// on its own thread means the recursion came back around, which is a cycle.
/// The lock is only held to inspect or update slots, never while computing.
#[derive(Default)]
pub struct ChecksumCache {
    slots: Mutex<HashMap<String, Slot>>,
    changed: Condvar,
}

impl ChecksumCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a finished holder, if any
    pub fn get(&self, name: &str) -> Option<Arc<TargetChecksumHolder>> {
        match self.slots.lock().get(name) {
            Some(Slot::Ready(holder)) => Some(Arc::clone(holder)),
            _ => None,
        }
    }

    /// Number of finished holders
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|s| matches!(s, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn claim(&self, name: &str) -> Result<Claim> {
        let me = std::thread::current().id();
        let mut slots = self.slots.lock();
        loop {
            match slots.get(name) {
                Some(Slot::Ready(holder)) => return Ok(Claim::Hit(Arc::clone(holder))),
                Some(Slot::InProgress(owner)) if *owner == me => {
                    return Err(Error::DependencyCycle {
                        target: name.to_string(),
                    });
                }
                Some(Slot::InProgress(_)) => self.changed.wait(&mut slots),
                None => {
                    slots.insert(name.to_string(), Slot::InProgress(me));
                    return Ok(Claim::Owned);
                }
            }
        }
    }

    pub(crate) fn fulfill(&self, holder: Arc<TargetChecksumHolder>) {
        self.slots
            .lock()
            .insert(holder.name.clone(), Slot::Ready(holder));
        self.changed.notify_all();
    }

    /// Release a claim whose computation failed so waiters can retry
    pub(crate) fn abandon(&self, name: &str) {
        self.slots.lock().remove(name);
        self.changed.notify_all();
    }

    /// Finished holders, consuming the cache at the end of a run
    pub fn into_holders(self) -> HashMap<String, Arc<TargetChecksumHolder>> {
        self.slots
            .into_inner()
            .into_iter()
            .filter_map(|(name, slot)| match slot {
                Slot::Ready(holder) => Some((name, holder)),
                Slot::InProgress(_) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Checksum, ProductType};

    fn holder(name: &str) -> Arc<TargetChecksumHolder> {
        Arc::new(TargetChecksumHolder {
            name: name.into(),
            product_name: name.into(),
            product_type: ProductType::Framework,
            checksum: Checksum::digest(name.as_bytes()),
            files: vec![],
            dependencies: vec![],
        })
    }

    #[test]
    fn test_claim_then_hit() {
        let cache = ChecksumCache::new();
        assert!(matches!(cache.claim("Kit").unwrap(), Claim::Owned));
        cache.fulfill(holder("Kit"));
        assert!(matches!(cache.claim("Kit").unwrap(), Claim::Hit(_)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reentrant_claim_is_cycle() {
        let cache = ChecksumCache::new();
        assert!(matches!(cache.claim("Kit").unwrap(), Claim::Owned));
        assert!(matches!(
            cache.claim("Kit"),
            Err(Error::DependencyCycle { .. })
        ));
    }

    #[test]
    fn test_waiter_receives_other_threads_result() {
        let cache = Arc::new(ChecksumCache::new());
        assert!(matches!(cache.claim("Kit").unwrap(), Claim::Owned));

        let waiter = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || match cache.claim("Kit").unwrap() {
                Claim::Hit(h) => h.name.clone(),
                Claim::Owned => "owned".to_string(),
            })
        };

        std::thread::sleep(std::time::Duration::from_millis(20));
        cache.fulfill(holder("Kit"));
        assert_eq!(waiter.join().unwrap(), "Kit");
    }

    #[test]
    fn test_abandon_lets_next_caller_own() {
        let cache = ChecksumCache::new();
        assert!(matches!(cache.claim("Kit").unwrap(), Claim::Owned));
        cache.abandon("Kit");
        assert!(cache.is_empty());
        assert!(matches!(cache.claim("Kit").unwrap(), Claim::Owned));
    }
}
