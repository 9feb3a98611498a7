//! Bounded LRU cache of open raster tile handles
//!
//! The cache is the only resource shared between augmentation workers.
//! Opening and evicting are mutually exclusive per tile path, while
//! samples from different already-open handles proceed concurrently.
//! A handle evicted while a worker is still sampling from it stays
//! alive until that worker drops its `Arc`.

use crate::error::{Error, Result};
use crate::raster::RasterHandle;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Default number of simultaneously open tile handles.
///
/// Tune together with the augmenter worker count: a pool much larger
/// than the cache thrashes on eviction and reopen of the same tiles.
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// Per-path slot. Locking the slot serializes the open for that path;
/// a second request for the same tile waits here and then reuses the
/// freshly opened handle instead of opening a duplicate.
#[derive(Default)]
struct TileSlot {
    handle: Mutex<Option<Arc<RasterHandle>>>,
}

/// Bounded pool of open raster handles with least-recently-used eviction.
pub struct RasterCache {
    slots: Mutex<LruCache<PathBuf, Arc<TileSlot>>>,
}

impl RasterCache {
    /// Create a cache holding at most `capacity` open handles.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            slots: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Get the handle for a tile path, opening it lazily.
    ///
    /// Missing or unreadable files fail with [`Error::TileUnavailable`];
    /// the cache stays usable for other tiles.
    pub fn get_handle(&self, path: &Path) -> Result<Arc<RasterHandle>> {
        let slot = {
            let mut slots = lock(&self.slots);
            match slots.get(path) {
                Some(slot) => Arc::clone(slot),
                None => {
                    let slot = Arc::new(TileSlot::default());
                    // put() evicts the least recently used slot when full
                    slots.put(path.to_path_buf(), Arc::clone(&slot));
                    slot
                }
            }
        };

        let mut guard = lock(&slot.handle);
        if let Some(handle) = guard.as_ref() {
            return Ok(Arc::clone(handle));
        }

        debug!(path = %path.display(), "opening raster tile");
        match RasterHandle::open(path) {
            Ok(handle) => {
                let handle = Arc::new(handle);
                *guard = Some(Arc::clone(&handle));
                Ok(handle)
            }
            Err(e) => {
                // Release the slot so the failed path does not pin a
                // cache entry.
                lock(&self.slots).pop(path);
                Err(Error::TileUnavailable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Number of cached slots (open or in-flight).
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for RasterCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterCache")
            .field("open", &self.len())
            .finish()
    }
}

// A poisoned mutex only means another thread panicked mid-operation;
// the protected state is still structurally valid, so keep going.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
