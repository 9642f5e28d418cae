//! Aggregate cache statistics and the `getstats(level)` report.
//!
//! Grounded on `vfx_io::cache::CacheStats` (hits/misses/evictions/peak_size)
//! extended with the per-file, open-handle, and microcache counters §6's
//! statistics surface names, and on OIIO's two-tier `imagecache_memory_print.h`
//! report style.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Process-wide (well: coordinator-wide) cache statistics.
///
/// Every counter is a lock-free atomic; no field requires external
/// synchronization to update.
#[derive(Debug, Default)]
pub struct CacheStatistics {
    /// Tiles ever constructed.
    pub tiles_created: AtomicU64,
    /// Tiles currently resident in the cache.
    pub tiles_current: AtomicU64,
    /// Highest `tiles_current` ever observed.
    pub tiles_peak: AtomicU64,
    /// Codec handles ever opened.
    pub open_files_created: AtomicU64,
    /// Codec handles currently open.
    pub open_files_current: AtomicU64,
    /// Highest `open_files_current` ever observed.
    pub open_files_peak: AtomicU64,
    /// `find_tile` calls summed across all threads.
    pub find_tile_calls: AtomicU64,
    /// `find_tile` calls that missed both microcache slots.
    pub microcache_misses: AtomicU64,
    /// `find_tile_main_cache` calls that missed the shared map.
    pub tile_cache_misses: AtomicU64,
    /// Bytes read from disk/codec.
    pub bytes_read: AtomicU64,
    /// Cumulative I/O time, in milliseconds (coarser than seconds for atomic
    /// accumulation; divide by 1000.0 for a seconds figure).
    pub io_time_ms: AtomicU64,
    /// Distinct fingerprints recorded.
    pub fingerprints: AtomicU64,
    /// Distinct (non-duplicate) files known to the registry.
    pub unique_files: AtomicU64,
    /// Current tile-cache memory footprint in bytes.
    pub bytes_used: AtomicUsize,
}

impl CacheStatistics {
    /// Records a tile construction, bumping `tiles_created`/`tiles_current`
    /// and tracking the running peak.
    pub fn record_tile_created(&self) {
        self.tiles_created.fetch_add(1, Ordering::Relaxed);
        let now = self.tiles_current.fetch_add(1, Ordering::Relaxed) + 1;
        self.tiles_peak.fetch_max(now, Ordering::Relaxed);
    }

    /// Records a tile eviction.
    pub fn record_tile_evicted(&self) {
        self.tiles_current.fetch_sub(1, Ordering::Relaxed);
    }

    /// Records a codec handle open, tracking the running peak.
    pub fn record_file_opened(&self) {
        self.open_files_created.fetch_add(1, Ordering::Relaxed);
        let now = self.open_files_current.fetch_add(1, Ordering::Relaxed) + 1;
        self.open_files_peak.fetch_max(now, Ordering::Relaxed);
    }

    /// Records a codec handle close.
    pub fn record_file_closed(&self) {
        self.open_files_current.fetch_sub(1, Ordering::Relaxed);
    }

    /// Adds `n` bytes to the memory footprint (tile insertion).
    pub fn add_bytes_used(&self, n: usize) {
        self.bytes_used.fetch_add(n, Ordering::Relaxed);
    }

    /// Subtracts `n` bytes from the memory footprint (tile eviction).
    pub fn sub_bytes_used(&self, n: usize) {
        self.bytes_used.fetch_sub(n, Ordering::Relaxed);
    }

    /// Records an I/O read.
    pub fn record_read(&self, bytes: u64, elapsed_ms: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
        self.io_time_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
    }

    /// Records a newly inserted content fingerprint (a not-previously-seen
    /// file hash entered into the duplicate-coalescing table).
    pub fn record_fingerprint(&self) {
        self.fingerprints.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a newly created file record (a filename not already known to
    /// the registry).
    pub fn record_unique_file(&self) {
        self.unique_files.fetch_add(1, Ordering::Relaxed);
    }

    /// Current memory footprint, in bytes.
    pub fn bytes_used(&self) -> usize {
        self.bytes_used.load(Ordering::Relaxed)
    }

    /// Renders a human-readable report.
    ///
    /// `level == 0` produces a single summary line; `level >= 1` adds the
    /// per-counter breakdown (OIIO's two-tier verbosity).
    pub fn getstats(&self, level: u32) -> String {
        let summary = format!(
            "vfx-cache: {} tiles resident ({} peak), {:.1} MB used, {} files open ({} peak)",
            self.tiles_current.load(Ordering::Relaxed),
            self.tiles_peak.load(Ordering::Relaxed),
            self.bytes_used() as f64 / (1024.0 * 1024.0),
            self.open_files_current.load(Ordering::Relaxed),
            self.open_files_peak.load(Ordering::Relaxed),
        );
        if level == 0 {
            return summary;
        }

        format!(
            "{summary}\n\
             Tiles: {} created, {} current, {} peak\n\
             Files: {} opened, {} current, {} peak, {} unique, {} fingerprints\n\
             Find-tile calls: {} ({} microcache misses, {} shared-cache misses)\n\
             I/O: {} bytes read, {:.3}s total\n",
            self.tiles_created.load(Ordering::Relaxed),
            self.tiles_current.load(Ordering::Relaxed),
            self.tiles_peak.load(Ordering::Relaxed),
            self.open_files_created.load(Ordering::Relaxed),
            self.open_files_current.load(Ordering::Relaxed),
            self.open_files_peak.load(Ordering::Relaxed),
            self.unique_files.load(Ordering::Relaxed),
            self.fingerprints.load(Ordering::Relaxed),
            self.find_tile_calls.load(Ordering::Relaxed),
            self.microcache_misses.load(Ordering::Relaxed),
            self.tile_cache_misses.load(Ordering::Relaxed),
            self.bytes_read.load(Ordering::Relaxed),
            self.io_time_ms.load(Ordering::Relaxed) as f64 / 1000.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_peak_independent_of_current() {
        let s = CacheStatistics::default();
        s.record_tile_created();
        s.record_tile_created();
        s.record_tile_evicted();
        assert_eq!(s.tiles_current.load(Ordering::Relaxed), 1);
        assert_eq!(s.tiles_peak.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn getstats_level_zero_is_one_line() {
        let s = CacheStatistics::default();
        assert_eq!(s.getstats(0).lines().count(), 1);
        assert!(s.getstats(1).lines().count() > 1);
    }
}
