//! The shared tile cache: a sharded `TileId -> TileRecord` map with
//! clock-sweep eviction against a memory budget.
//!
//! Grounded on `vfx_io::cache::ImageCache`'s `tiles: RwLock<HashMap<TileKey,
//! Tile>>` plus its LRU list, generalized to sharding (for concurrent-write
//! throughput under many threads) and a clock-sweep recency bit in place of
//! an exact LRU list, matching OIIO's `ImageCacheTile`/`TileCache` which
//! also uses a recency bit rather than list-splicing on every access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use crate::id::TileId;
use crate::stats::CacheStatistics;

/// Shard count for the tile map. A power of two so [`TileId::shard`] can
/// mask instead of mod.
pub const N_SHARDS: usize = 16;

/// One cached tile's pixel payload and publication state.
///
/// Exactly one thread constructs and fills a given `TileRecord` (the winner
/// of [`TileCache::insert_or_retrieve`]); every other thread that names the
/// same [`TileId`] gets a clone of the same `Arc<TileRecord>` and spins on
/// [`TileRecord::wait_ready`] until the winner publishes.
pub struct TileRecord {
    id: TileId,
    nbytes: usize,
    pixels: OnceLock<Arc<[u8]>>,
    ready: AtomicBool,
    valid: AtomicBool,
    recently_used: AtomicBool,
}

impl TileRecord {
    /// Creates an unfilled record for `id`, pre-sized to `nbytes` (its
    /// eventual pixel payload size, known from the file's header before any
    /// decode happens). The cache accounts `nbytes` against the memory
    /// budget at construction time, not when pixels are actually written.
    pub fn empty(id: TileId, nbytes: usize) -> Self {
        Self {
            id,
            nbytes,
            pixels: OnceLock::new(),
            ready: AtomicBool::new(false),
            valid: AtomicBool::new(false),
            recently_used: AtomicBool::new(true),
        }
    }

    /// The identity this record was constructed for.
    pub fn id(&self) -> TileId {
        self.id
    }

    /// Accounted byte size (fixed at construction).
    pub fn nbytes(&self) -> usize {
        self.nbytes
    }

    /// Publishes this record's pixels. Only the winning thread from
    /// [`TileCache::insert_or_retrieve`] should call this, exactly once.
    ///
    /// `valid` is stored before `ready`; both are plain atomic stores on the
    /// same thread, so the release on `ready` carries the `valid` store (and
    /// the prior `pixels.set`) across to any thread that later does an
    /// acquire load of `ready` - the one synchronization point readers
    /// need.
    pub fn publish(&self, valid: bool, pixels: Arc<[u8]>) {
        let _ = self.pixels.set(pixels);
        self.valid.store(valid, Ordering::Release);
        self.ready.store(true, Ordering::Release);
    }

    /// True once [`Self::publish`] has run.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// True if the published tile decoded successfully (meaningless before
    /// [`Self::is_ready`]).
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// The published pixel buffer, if any.
    pub fn pixels(&self) -> Option<&Arc<[u8]>> {
        self.pixels.get()
    }

    /// Busy-waits (with capped exponential backoff) until [`Self::is_ready`].
    ///
    /// Every non-winning reader of a freshly inserted tile takes this path;
    /// the backoff keeps a 32-thread pile-up on one tile from burning a CPU
    /// core's worth of spin per waiter.
    pub fn wait_ready(&self) {
        let mut backoff_micros = 1u64;
        while !self.is_ready() {
            std::thread::sleep(std::time::Duration::from_micros(backoff_micros));
            backoff_micros = (backoff_micros * 2).min(5_000);
        }
    }

    /// Sets the clock-sweep recency bit (called on every successful find).
    pub fn mark_used(&self) {
        self.recently_used.store(true, Ordering::Relaxed);
    }

    /// Clears the recency bit, returning its previous value.
    fn clear_used(&self) -> bool {
        self.recently_used.swap(false, Ordering::Relaxed)
    }
}

/// Sharded, memory-bounded `TileId -> TileRecord` cache.
pub struct TileCache {
    shards: Vec<RwLock<HashMap<TileId, Arc<TileRecord>>>>,
    stats: Arc<CacheStatistics>,
    max_bytes: AtomicUsize,
    sweep_lock: Mutex<()>,
    sweep_cursor: Mutex<(usize, usize)>,
}

impl TileCache {
    /// Creates an empty cache bounded to `max_bytes`, sharing `stats` with
    /// the rest of the coordinator.
    pub fn new(max_bytes: usize, stats: Arc<CacheStatistics>) -> Self {
        Self {
            shards: (0..N_SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
            stats,
            max_bytes: AtomicUsize::new(max_bytes),
            sweep_lock: Mutex::new(()),
            sweep_cursor: Mutex::new((0, 0)),
        }
    }

    /// Current memory budget, in bytes.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes.load(Ordering::Relaxed)
    }

    /// Changes the memory budget. Does not itself trigger a sweep; the next
    /// insert or [`Self::check_max_mem`] call will.
    pub fn set_max_bytes(&self, n: usize) {
        self.max_bytes.store(n.max(1), Ordering::Relaxed);
    }

    /// Returns the existing record for `id`, if resident.
    pub fn find(&self, id: &TileId) -> Option<Arc<TileRecord>> {
        let shard = &self.shards[id.shard(self.shards.len())];
        let rec = shard.read().unwrap().get(id).cloned();
        if let Some(rec) = &rec {
            rec.mark_used();
        }
        rec
    }

    /// Atomically inserts `new_record` for `id` unless another thread beat
    /// it to it. Returns `(winner, inserted)`: `inserted == true` iff the
    /// caller's record is the one now resident and the caller must fill and
    /// [`TileRecord::publish`] it.
    pub fn insert_or_retrieve(&self, id: TileId, new_record: Arc<TileRecord>) -> (Arc<TileRecord>, bool) {
        debug_assert_eq!(new_record.id(), id);
        let shard = &self.shards[id.shard(self.shards.len())];
        {
            let read = shard.read().unwrap();
            if let Some(existing) = read.get(&id) {
                existing.mark_used();
                return (existing.clone(), false);
            }
        }
        let mut write = shard.write().unwrap();
        if let Some(existing) = write.get(&id) {
            existing.mark_used();
            return (existing.clone(), false);
        }
        write.insert(id, new_record.clone());
        self.stats.record_tile_created();
        self.stats.add_bytes_used(new_record.nbytes());
        drop(write);
        self.check_max_mem();
        (new_record, true)
    }

    /// Inserts a client-supplied, already-published record (used by
    /// `add_tile`), replacing any existing entry for the same id.
    pub fn force_insert(&self, id: TileId, record: Arc<TileRecord>) {
        let shard = &self.shards[id.shard(self.shards.len())];
        let previous = shard.write().unwrap().insert(id, record.clone());
        if let Some(prev) = previous {
            self.stats.sub_bytes_used(prev.nbytes());
            self.stats.record_tile_evicted();
        }
        self.stats.record_tile_created();
        self.stats.add_bytes_used(record.nbytes());
        self.check_max_mem();
    }

    /// Removes `id` from the cache, if present.
    pub fn erase(&self, id: &TileId) {
        let shard = &self.shards[id.shard(self.shards.len())];
        if let Some(rec) = shard.write().unwrap().remove(id) {
            self.stats.sub_bytes_used(rec.nbytes());
            self.stats.record_tile_evicted();
        }
    }

    /// Removes every tile belonging to `file` (used by `invalidate`).
    pub fn erase_file(&self, file: crate::id::FileIndex) {
        for shard in &self.shards {
            let ids: Vec<TileId> = shard.read().unwrap().keys().filter(|id| id.file == file).copied().collect();
            for id in &ids {
                self.erase(id);
            }
        }
    }

    /// Removes every tile from the cache (used by `invalidate_all`).
    pub fn clear(&self) {
        for shard in &self.shards {
            let mut write = shard.write().unwrap();
            let freed: usize = write.values().map(|r| r.nbytes()).sum();
            let count = write.len();
            write.clear();
            drop(write);
            self.stats.sub_bytes_used(freed);
            for _ in 0..count {
                self.stats.record_tile_evicted();
            }
        }
    }

    /// Current resident tile count, summed across shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().unwrap().len()).sum()
    }

    /// True if the cache holds no tiles.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enforces the memory budget via clock-sweep eviction.
    ///
    /// `HashMap` gives no stable, resumable iteration order once the map is
    /// mutated between sweeps, so rather than holding a live iterator across
    /// releases (as a linked-list clock implementation would), each pass
    /// snapshots the current shard's key set and walks it by index; the
    /// persisted `(shard, offset)` cursor still gives every tile a turn
    /// before any tile gets a second chance, which is the clock algorithm's
    /// actual guarantee.
    pub fn check_max_mem(&self) {
        if self.stats.bytes_used() <= self.max_bytes() {
            return;
        }
        let Ok(_guard) = self.sweep_lock.try_lock() else {
            return;
        };

        let mut cursor = self.sweep_cursor.lock().unwrap();
        let mut loops = 0usize;
        let max_loops = 100 * self.shards.len();
        while self.stats.bytes_used() > self.max_bytes() && loops < max_loops {
            loops += 1;
            let shard_idx = cursor.0 % self.shards.len();
            let ids: Vec<TileId> = self.shards[shard_idx].read().unwrap().keys().copied().collect();
            if ids.is_empty() {
                cursor.0 = (cursor.0 + 1) % self.shards.len();
                cursor.1 = 0;
                continue;
            }
            let i = cursor.1 % ids.len();
            let id = ids[i];
            cursor.1 += 1;
            if cursor.1 >= ids.len() {
                cursor.0 = (cursor.0 + 1) % self.shards.len();
                cursor.1 = 0;
            }

            let Some(rec) = self.find_no_mark(&id) else { continue };
            if !rec.is_ready() {
                continue; // being filled right now, leave it alone
            }
            if rec.clear_used() {
                continue; // was recently used; give it one more lap
            }
            self.erase(&id);
        }
    }

    fn find_no_mark(&self, id: &TileId) -> Option<Arc<TileRecord>> {
        let shard = &self.shards[id.shard(self.shards.len())];
        shard.read().unwrap().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::FileIndex;

    fn id(x: u32) -> TileId {
        TileId::new(FileIndex::new(0), 0, 0, x, 0, 0, 0, 4, 0)
    }

    fn stats() -> Arc<CacheStatistics> {
        Arc::new(CacheStatistics::default())
    }

    #[test]
    fn insert_or_retrieve_gives_exactly_one_winner() {
        let cache = TileCache::new(1 << 30, stats());
        let tid = id(0);
        let (first, inserted1) = cache.insert_or_retrieve(tid, Arc::new(TileRecord::empty(tid, 64)));
        let (second, inserted2) = cache.insert_or_retrieve(tid, Arc::new(TileRecord::empty(tid, 64)));
        assert!(inserted1);
        assert!(!inserted2);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn publish_is_observed_after_ready() {
        let cache = TileCache::new(1 << 30, stats());
        let tid = id(1);
        let (winner, inserted) = cache.insert_or_retrieve(tid, Arc::new(TileRecord::empty(tid, 4)));
        assert!(inserted);
        assert!(!winner.is_ready());
        winner.publish(true, Arc::from(vec![1u8, 2, 3, 4].into_boxed_slice()));
        let found = cache.find(&tid).unwrap();
        found.wait_ready();
        assert!(found.is_valid());
        assert_eq!(found.pixels().unwrap().as_ref(), &[1, 2, 3, 4]);
    }

    #[test]
    fn eviction_respects_recency() {
        let cache = TileCache::new(100, stats());
        for i in 0..5 {
            let tid = id(i);
            let rec = Arc::new(TileRecord::empty(tid, 40));
            let (winner, inserted) = cache.insert_or_retrieve(tid, rec);
            assert!(inserted);
            winner.publish(true, Arc::from(vec![0u8; 40].into_boxed_slice()));
        }
        assert!(cache.len() < 5);
    }

    #[test]
    fn erase_file_removes_only_matching_tiles() {
        let cache = TileCache::new(1 << 30, stats());
        let a = TileId::new(FileIndex::new(0), 0, 0, 0, 0, 0, 0, 4, 0);
        let b = TileId::new(FileIndex::new(1), 0, 0, 0, 0, 0, 0, 4, 0);
        for tid in [a, b] {
            let (winner, _) = cache.insert_or_retrieve(tid, Arc::new(TileRecord::empty(tid, 16)));
            winner.publish(true, Arc::from(vec![0u8; 16].into_boxed_slice()));
        }
        cache.erase_file(FileIndex::new(0));
        assert!(cache.find(&a).is_none());
        assert!(cache.find(&b).is_some());
    }
}
