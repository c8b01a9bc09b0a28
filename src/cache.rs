use std::sync::Arc;
use std::time::Duration;

use log::debug;
use moka::sync::Cache;

use crate::acquire::{DatasetId, DatasetSource};
use crate::data::schema::Schema;
use crate::error::{Error, Result};
use crate::snapshot::{Snapshot, SnapshotStore};

/// Snapshots keyed by dataset identifier, re-acquired after a time-to-live.
///
/// Concurrent misses on the same key share one acquisition; the others wait
/// for it and receive the same snapshot (or the same error).
pub struct SnapshotCache {
    store: SnapshotStore,
    source: Box<dyn DatasetSource>,
    schema: Schema,
    /// `None` when the TTL is zero: every call acquires.
    cache: Option<Cache<String, Arc<Snapshot>>>,
}

impl SnapshotCache {
    pub fn new(
        store: SnapshotStore,
        source: Box<dyn DatasetSource>,
        schema: Schema,
        ttl: Duration,
    ) -> Self {
        let cache = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .time_to_live(ttl)
                .max_capacity(16)
                .build()
        });
        SnapshotCache {
            store,
            source,
            schema,
            cache,
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// The current snapshot of `id`, acquiring it on a miss.
    ///
    /// `Ok(None)` means the dataset was fetched but holds no usable data.
    /// Every other failure propagates; failures are never cached.
    pub fn get(&self, id: &DatasetId) -> Result<Option<Arc<Snapshot>>> {
        let result = match &self.cache {
            None => self.load(id),
            Some(cache) => {
                let key = id.to_string();
                if let Some(hit) = cache.get(&key) {
                    debug!("snapshot cache hit for {key}");
                    return Ok(Some(hit));
                }
                cache
                    .try_get_with(key, || self.load(id))
                    .map_err(Error::from_shared)
            }
        };
        match result {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) if e.is_not_found() => {
                debug!("no data for {id}: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Drop the cached snapshot so the next [`get`](Self::get) re-acquires.
    pub fn invalidate(&self, id: &DatasetId) {
        if let Some(cache) = &self.cache {
            cache.invalidate(&id.to_string());
        }
    }

    fn load(&self, id: &DatasetId) -> Result<Arc<Snapshot>> {
        self.store
            .acquire(self.source.as_ref(), id, &self.schema)
            .map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;
    use crate::acquire::PRIMARY_FILE;
    use crate::data::schema::FUEL_ECONOMY;
    use crate::snapshot::tests::RAW_CSV;

    /// Writes a fixed CSV and counts how often it was asked to.
    struct CountingSource {
        calls: Arc<AtomicUsize>,
        file_name: &'static str,
        fail_auth: bool,
    }

    impl DatasetSource for CountingSource {
        fn fetch(&self, _id: &DatasetId, dest: &Path) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_auth {
                return Err(Error::Authentication("401 Unauthorized".into()));
            }
            let path = dest.join(self.file_name);
            std::fs::write(&path, RAW_CSV).map_err(|e| Error::io(path, e))
        }
    }

    fn cache_with(
        root: &Path,
        file_name: &'static str,
        fail_auth: bool,
        ttl: Duration,
    ) -> (SnapshotCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            calls: Arc::clone(&calls),
            file_name,
            fail_auth,
        };
        let store = SnapshotStore::new(root);
        let cache = SnapshotCache::new(store, Box::new(source), FUEL_ECONOMY, ttl);
        (cache, calls)
    }

    fn id() -> DatasetId {
        "epa/fuel-economy".parse().unwrap()
    }

    #[test]
    fn hits_reuse_the_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, calls) = cache_with(dir.path(), PRIMARY_FILE, false, Duration::from_secs(60));

        let a = cache.get(&id()).unwrap().unwrap();
        let b = cache.get(&id()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate(&id());
        let c = cache.get(&id()).unwrap().unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_ttl_acquires_every_time() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, calls) = cache_with(dir.path(), PRIMARY_FILE, false, Duration::ZERO);

        cache.get(&id()).unwrap().unwrap();
        cache.get(&id()).unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn expired_entries_are_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, calls) = cache_with(dir.path(), PRIMARY_FILE, false, Duration::from_millis(50));

        cache.get(&id()).unwrap().unwrap();
        thread::sleep(Duration::from_millis(120));
        cache.get(&id()).unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_primary_file_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, calls) = cache_with(dir.path(), "other.csv", false, Duration::from_secs(60));

        assert!(cache.get(&id()).unwrap().is_none());
        // Not cached: the next call tries again.
        assert!(cache.get(&id()).unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn authentication_failures_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, _) = cache_with(dir.path(), PRIMARY_FILE, true, Duration::from_secs(60));

        let err = cache.get(&id()).unwrap_err();
        assert!(err.is_authentication());
    }

    #[test]
    fn failing_calls_do_not_pile_up_directories() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, calls) = cache_with(dir.path(), PRIMARY_FILE, true, Duration::ZERO);

        assert!(cache.get(&id()).is_err());
        assert!(cache.get(&id()).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.store().generations(&id()).unwrap().len(), 1);

        let (cache, _) = cache_with(dir.path(), "other.csv", false, Duration::ZERO);
        assert!(cache.get(&id()).unwrap().is_none());
        assert!(cache.get(&id()).unwrap().is_none());
        assert_eq!(cache.store().generations(&id()).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_misses_share_one_acquisition() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, calls) = cache_with(dir.path(), PRIMARY_FILE, false, Duration::from_secs(60));

        let snapshots: Vec<Arc<Snapshot>> = thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| cache.get(&id()).unwrap().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(snapshots.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
