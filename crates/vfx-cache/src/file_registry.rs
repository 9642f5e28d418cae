//! The file registry: a concurrent `filename -> FileRecord` map, header
//! ingestion, open-handle lifecycle, max-open-files enforcement, UDIM
//! virtual files, and duplicate-file fingerprint coalescing.
//!
//! Grounded on `vfx_io::cache::ImageCache`'s `RwLock<HashMap<...>>` fields
//! and `ensure_space`/`evict` sweep pattern (generalized from an LRU list to
//! the clock-sweep this crate's spec requires), `vfx_ocio::cache::ProcessorCache`'s
//! read-then-upgrade-to-write lookup idiom, and OIIO `ImageCacheImpl::check_max_files`'s
//! clamping/sweep algorithm.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant, SystemTime};

use vfx_core::format::DataFormat;

use crate::codec::{ImageInput, ImageInputCreator, ImageSpec};
use crate::coordinator::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::id::FileIndex;
use crate::stats::CacheStatistics;
use crate::udim;

const NAME_SHARDS: usize = 16;

/// Environment-map cubeface/latlong layout, detected from a subimage's
/// `textureformat` metadata and resolution aspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvLayout {
    /// Not an environment map.
    #[default]
    None,
    /// `3W x 2H` cross layout.
    ThreeByTwo,
    /// `W x 6H` strip layout.
    SixByOne,
    /// Equirectangular lat-long layout.
    LatLong,
}

/// Header information for one MIP level of one subimage.
pub struct LevelInfo {
    /// The level's header (possibly synthesized, for auto-mip levels).
    pub spec: ImageSpec,
    /// Effective tile width (native or fabricated).
    pub tile_width: u32,
    /// Effective tile height (native or fabricated).
    pub tile_height: u32,
    /// Effective tile depth.
    pub tile_depth: u32,
    /// Tile count along x.
    pub tiles_x: u32,
    /// Tile count along y.
    pub tiles_y: u32,
    /// Tile count along z.
    pub tiles_z: u32,
    /// True if this level was fabricated by the `automip` path rather than
    /// read from the file (no `read_tile`/`read_scanlines` call against the
    /// codec will succeed for it; it must be downsampled from the level
    /// above).
    pub synthesized: bool,
    tiles_read_bits: Vec<AtomicU64>,
}

impl LevelInfo {
    fn new(spec: ImageSpec, tile_width: u32, tile_height: u32, tile_depth: u32, synthesized: bool) -> Self {
        let tw = tile_width.max(1);
        let th = tile_height.max(1);
        let td = tile_depth.max(1);
        let tiles_x = spec.width.div_ceil(tw).max(1);
        let tiles_y = spec.height.div_ceil(th).max(1);
        let tiles_z = spec.depth.div_ceil(td).max(1);
        let n_tiles = tiles_x as u64 * tiles_y as u64 * tiles_z as u64;
        let n_words = n_tiles.div_ceil(64).max(1) as usize;
        Self {
            spec,
            tile_width: tw,
            tile_height: th,
            tile_depth: td,
            tiles_x,
            tiles_y,
            tiles_z,
            synthesized,
            tiles_read_bits: (0..n_words).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    fn bit_index(&self, tx: u32, ty: u32, tz: u32) -> u64 {
        (tz as u64 * self.tiles_y as u64 + ty as u64) * self.tiles_x as u64 + tx as u64
    }

    /// Marks tile `(tx, ty, tz)` as read. Returns `true` if it had already
    /// been marked (a redundant read within this residency).
    pub fn mark_tile_read(&self, tx: u32, ty: u32, tz: u32) -> bool {
        let bit = self.bit_index(tx, ty, tz);
        let word = (bit / 64) as usize;
        let mask = 1u64 << (bit % 64);
        if word >= self.tiles_read_bits.len() {
            return false;
        }
        let prev = self.tiles_read_bits[word].fetch_or(mask, Ordering::Relaxed);
        prev & mask != 0
    }
}

/// Header information for one subimage.
pub struct SubimageInfo {
    /// Per-channel pixel data type.
    pub format: DataFormat,
    /// Channel count.
    pub nchannels: u32,
    /// MIP pyramid, level 0 largest.
    pub levels: Vec<LevelInfo>,
    /// Stored as scanlines rather than native tiles.
    pub untiled: bool,
    /// Has only one MIP level on disk.
    pub unmipped: bool,
    /// `depth > 1`.
    pub is_volume: bool,
    /// Data window equals display window.
    pub full_pixel_range: bool,
    /// Tile size was fabricated by the `autotile` path.
    pub autotiled: bool,
    /// Smallest mip index whose resolution is within `max_mip_res`.
    pub min_mip_level: u32,
    /// Environment-map layout, if any.
    pub env_layout: EnvLayout,
    /// Y-axis orientation for lat-long maps: true = first row is +Y.
    pub y_up: bool,
    /// Texture has a one-pixel sample border.
    pub sample_border: bool,
    /// S (x) axis wrap mode, parsed from metadata.
    pub swrap: WrapMode,
    /// T (y) axis wrap mode, parsed from metadata.
    pub twrap: WrapMode,
    /// R (z) axis wrap mode, parsed from metadata (volumes only).
    pub rwrap: WrapMode,
}

/// Texture wrap mode at the edge of a subimage's data window, parsed from
/// the codec's `"wrapmodes"` metadata (OIIO's `s,t` or `s,t,r` comma-separated
/// string).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    /// Repeat the texture (default).
    #[default]
    Periodic,
    /// Clamp to the edge texel.
    Clamp,
    /// Black outside the data window.
    Black,
    /// Mirror at the edge.
    Mirror,
}

impl WrapMode {
    fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "clamp" => Self::Clamp,
            "black" => Self::Black,
            "mirror" => Self::Mirror,
            _ => Self::Periodic,
        }
    }

    /// Parses the `(swrap, twrap, rwrap)` triple out of a `"wrapmodes"`
    /// attribute value (`"s,t"` or `"s,t,r"`; missing components default to
    /// [`WrapMode::Periodic`]).
    fn parse_triple(spec: &ImageSpec) -> (Self, Self, Self) {
        let Some(raw) = spec.get_string("wrapmodes") else {
            return (Self::default(), Self::default(), Self::default());
        };
        let mut parts = raw.split(',').map(Self::parse);
        let s = parts.next().unwrap_or_default();
        let t = parts.next().unwrap_or(s);
        let r = parts.next().unwrap_or(t);
        (s, t, r)
    }
}

/// One slot of a UDIM virtual file's u x v grid.
struct UdimSlot {
    filename: String,
    resolved: RwLock<Option<FileIndex>>,
}

/// UDIM virtual-file state: a read-only grid populated once at discovery.
struct UdimGrid {
    slots: HashMap<(u32, u32), UdimSlot>,
}

/// One distinct physical (or virtual, or duplicate) file known to the
/// registry.
pub struct FileRecordInner {
    /// Canonical filename (search-path-resolved string; search-path
    /// resolution itself is a one-helper-call concern outside this crate
    /// per spec.md's scope boundary, so this is simply the string passed in).
    pub filename: String,
    input_lock: Mutex<()>,
    open_handle: RwLock<Option<Arc<dyn ImageInput>>>,
    creator_override: RwLock<Option<Arc<dyn ImageInputCreator>>>,
    subimages: RwLock<Vec<SubimageInfo>>,
    valid_spec: AtomicBool,
    broken: RwLock<Option<String>>,
    duplicate_of: RwLock<Option<FileIndex>>,
    fingerprint: RwLock<Option<String>>,
    udim: Option<UdimGrid>,
    mtime: RwLock<Option<SystemTime>>,
    ingested_autotile: AtomicU32,
    ingested_automip: AtomicBool,

    /// Clock-sweep "recently used" bit for open-handle eviction.
    pub recently_used: AtomicBool,
    /// Number of times this file's handle has been (re)opened.
    pub times_opened: AtomicU64,
    /// Tiles successfully read from this file.
    pub tiles_read: AtomicU64,
    /// Bytes successfully read from this file.
    pub bytes_read: AtomicU64,
    /// Tiles whose read bit was already set (redundant across residencies).
    pub redundant_tiles: AtomicU64,
    /// Bytes belonging to redundant tile reads.
    pub redundant_bytes: AtomicU64,
    /// Cumulative I/O time in microseconds.
    pub io_micros: AtomicU64,
    /// Error messages suppressed beyond `max_errors_per_file`.
    pub errors_issued: AtomicU32,
}

impl FileRecordInner {
    fn new(filename: String, udim: Option<UdimGrid>) -> Self {
        Self {
            filename,
            input_lock: Mutex::new(()),
            open_handle: RwLock::new(None),
            creator_override: RwLock::new(None),
            subimages: RwLock::new(Vec::new()),
            valid_spec: AtomicBool::new(false),
            broken: RwLock::new(None),
            duplicate_of: RwLock::new(None),
            fingerprint: RwLock::new(None),
            udim,
            mtime: RwLock::new(None),
            ingested_autotile: AtomicU32::new(0),
            ingested_automip: AtomicBool::new(false),
            recently_used: AtomicBool::new(true),
            times_opened: AtomicU64::new(0),
            tiles_read: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            redundant_tiles: AtomicU64::new(0),
            redundant_bytes: AtomicU64::new(0),
            io_micros: AtomicU64::new(0),
            errors_issued: AtomicU32::new(0),
        }
    }

    /// True once header ingestion has succeeded at least once.
    pub fn is_valid_spec(&self) -> bool {
        self.valid_spec.load(Ordering::Acquire)
    }

    /// True if this record is marked broken.
    pub fn is_broken(&self) -> bool {
        self.broken.read().unwrap().is_some()
    }

    /// The stored broken-message, if any.
    pub fn broken_message(&self) -> Option<String> {
        self.broken.read().unwrap().clone()
    }

    /// True if this record is a UDIM virtual file.
    pub fn is_virtual(&self) -> bool {
        self.udim.is_some()
    }

    /// `duplicate_of` target, if this record was coalesced onto another.
    pub fn duplicate_of(&self) -> Option<FileIndex> {
        *self.duplicate_of.read().unwrap()
    }

    /// True if a codec handle is currently open.
    pub fn has_open_handle(&self) -> bool {
        self.open_handle.read().unwrap().is_some()
    }

    /// Read-only access to this file's subimage headers.
    pub fn with_subimages<R>(&self, f: impl FnOnce(&[SubimageInfo]) -> R) -> R {
        f(&self.subimages.read().unwrap())
    }

    /// Number of subimages ingested.
    pub fn subimage_count(&self) -> usize {
        self.subimages.read().unwrap().len()
    }

    /// Bounds-checked access to one subimage's one mip level.
    pub fn with_level<R>(
        &self,
        subimage: u32,
        miplevel: u32,
        f: impl FnOnce(&SubimageInfo, &LevelInfo) -> R,
    ) -> CacheResult<R> {
        let subs = self.subimages.read().unwrap();
        let sub = subs.get(subimage as usize).ok_or_else(|| CacheError::UnknownSubimage {
            file: self.filename.clone(),
            subimage,
        })?;
        let lvl = sub.levels.get(miplevel as usize).ok_or_else(|| CacheError::UnknownMipLevel {
            file: self.filename.clone(),
            subimage,
            miplevel,
        })?;
        Ok(f(sub, lvl))
    }

    /// Increments `errors_issued` and reports whether this error should
    /// still be logged (caller suppresses once the per-file cap is hit).
    pub fn errors_allowed(&self, max_errors_per_file: u32) -> bool {
        self.errors_issued.fetch_add(1, Ordering::Relaxed) < max_errors_per_file
    }
}

fn try_lock_timeout<'a, T>(mutex: &'a Mutex<T>, timeout: Duration) -> Option<MutexGuard<'a, T>> {
    let start = Instant::now();
    loop {
        match mutex.try_lock() {
            Ok(guard) => return Some(guard),
            Err(std::sync::TryLockError::Poisoned(_)) => return None,
            Err(std::sync::TryLockError::WouldBlock) => {
                if start.elapsed() >= timeout {
                    return None;
                }
                std::thread::sleep(Duration::from_micros(200));
            }
        }
    }
}

/// Sharded concurrent registry of `filename -> FileRecord`.
pub struct FileRegistry {
    name_shards: Vec<RwLock<HashMap<String, FileIndex>>>,
    arena: Mutex<Vec<Arc<FileRecordInner>>>,
    fingerprints: RwLock<HashMap<String, FileIndex>>,
    open_files_current: std::sync::atomic::AtomicUsize,
    sweep_lock: Mutex<()>,
    sweep_cursor: Mutex<(usize, usize)>,
    stats: Arc<CacheStatistics>,
}

impl Default for FileRegistry {
    fn default() -> Self {
        Self::new(Arc::new(CacheStatistics::default()))
    }
}

impl FileRegistry {
    /// Creates an empty registry reporting open-handle/fingerprint/unique-file
    /// counters into the shared `stats` handle (the same one the owning
    /// [`crate::coordinator::CacheCoordinator`] hands to its [`crate::tile_cache::TileCache`]).
    pub fn new(stats: Arc<CacheStatistics>) -> Self {
        Self {
            name_shards: (0..NAME_SHARDS).map(|_| RwLock::new(HashMap::new())).collect(),
            arena: Mutex::new(Vec::new()),
            fingerprints: RwLock::new(HashMap::new()),
            open_files_current: std::sync::atomic::AtomicUsize::new(0),
            sweep_lock: Mutex::new(()),
            sweep_cursor: Mutex::new((0, 0)),
            stats,
        }
    }

    fn shard_for(&self, name: &str) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::hash::Hash::hash(name, &mut hasher);
        (std::hash::Hasher::finish(&hasher) as usize) & (NAME_SHARDS - 1)
    }

    /// Number of distinct files (including virtual/duplicate) known to the
    /// registry.
    pub fn len(&self) -> usize {
        self.arena.lock().unwrap().len()
    }

    /// True if no file is known to the registry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Currently open codec handles.
    pub fn open_files_current(&self) -> usize {
        self.open_files_current.load(Ordering::Relaxed)
    }

    /// Returns the record at `idx`.
    pub fn get(&self, idx: FileIndex) -> Arc<FileRecordInner> {
        self.arena.lock().unwrap()[idx.index()].clone()
    }

    /// Looks up (and lazily creates) the record for `filename`.
    ///
    /// Does not open the file. If `replace` is true and the file is already
    /// known, its spec and handle are invalidated and the same slot is
    /// reused ("re-created in place").
    pub fn find_or_create(
        &self,
        filename: &str,
        creator: Option<Arc<dyn ImageInputCreator>>,
        replace: bool,
    ) -> (Arc<FileRecordInner>, FileIndex, bool) {
        let shard = self.shard_for(filename);
        if !replace {
            if let Some(idx) = self.name_shards[shard].read().unwrap().get(filename).copied() {
                let record = self.get(idx);
                if let Some(c) = creator {
                    *record.creator_override.write().unwrap() = Some(c);
                }
                return (record, idx, false);
            }
        }

        let mut shard_guard = self.name_shards[shard].write().unwrap();
        if let Some(idx) = shard_guard.get(filename).copied() {
            let record = self.get(idx);
            if replace {
                self.close(&record);
                *record.broken.write().unwrap() = None;
                *record.subimages.write().unwrap() = Vec::new();
                record.valid_spec.store(false, Ordering::Release);
                *record.duplicate_of.write().unwrap() = None;
            }
            if let Some(c) = creator {
                *record.creator_override.write().unwrap() = Some(c);
            }
            return (record, idx, false);
        }

        let udim_grid = if udim::is_udim_pattern(filename) {
            udim::scan_tiles(filename).ok().map(|tiles| UdimGrid {
                slots: tiles
                    .into_iter()
                    .map(|((u, v), path)| {
                        (
                            (u, v),
                            UdimSlot {
                                filename: path.to_string_lossy().to_string(),
                                resolved: RwLock::new(None),
                            },
                        )
                    })
                    .collect(),
            })
        } else {
            None
        };

        let record = Arc::new(FileRecordInner::new(filename.to_string(), udim_grid));
        if let Some(c) = creator {
            *record.creator_override.write().unwrap() = Some(c);
        }
        let idx = {
            let mut arena = self.arena.lock().unwrap();
            let idx = FileIndex::new(arena.len());
            arena.push(record.clone());
            idx
        };
        shard_guard.insert(filename.to_string(), idx);
        self.stats.record_unique_file();
        (record, idx, true)
    }

    fn effective_creator<'a>(
        &self,
        record: &Arc<FileRecordInner>,
        default_creator: &'a Arc<dyn ImageInputCreator>,
    ) -> Arc<dyn ImageInputCreator> {
        record
            .creator_override
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(|| default_creator.clone())
    }

    fn open_and_ingest_locked(
        &self,
        record: &Arc<FileRecordInner>,
        creator: &Arc<dyn ImageInputCreator>,
        config: &CacheConfig,
    ) -> CacheResult<Arc<dyn ImageInput>> {
        let handle = creator.open(&record.filename)?;
        let subimages = ingest_headers(handle.as_ref(), &record.filename, config)?;
        *record.subimages.write().unwrap() = subimages;
        record.valid_spec.store(true, Ordering::Release);
        *record.broken.write().unwrap() = None;
        *record.open_handle.write().unwrap() = Some(handle.clone());
        record.times_opened.fetch_add(1, Ordering::Relaxed);
        record.recently_used.store(true, Ordering::Relaxed);
        record.ingested_autotile.store(config.autotile, Ordering::Relaxed);
        record.ingested_automip.store(config.automip, Ordering::Relaxed);
        self.open_files_current.fetch_add(1, Ordering::Relaxed);
        self.stats.record_file_opened();

        if let Some(fp) = handle_fingerprint(handle.as_ref()) {
            *record.fingerprint.write().unwrap() = Some(fp);
        }

        Ok(handle)
    }

    /// Runs header ingestion (if not already done) and duplicate
    /// coalescing, then follows `duplicate_of` one step unless
    /// `header_only` is set.
    pub fn verify(
        &self,
        idx: FileIndex,
        header_only: bool,
        default_creator: &Arc<dyn ImageInputCreator>,
        config: &CacheConfig,
    ) -> FileIndex {
        let record = self.get(idx);

        if record.is_virtual() {
            record.valid_spec.store(true, Ordering::Release);
            return idx;
        }

        if !record.is_valid_spec() && !record.is_broken() {
            let _guard = record.input_lock.lock().unwrap();
            if !record.is_valid_spec() && !record.is_broken() {
                let creator = self.effective_creator(&record, default_creator);
                let mut attempt = 0u32;
                loop {
                    match self.open_and_ingest_locked(&record, &creator, config) {
                        Ok(_) => break,
                        Err(e) => {
                            attempt += 1;
                            if attempt > config.failure_retries {
                                if record.errors_allowed(config.max_errors_per_file) {
                                    tracing::warn!(file = %record.filename, error = %e, "failed to open file");
                                }
                                self.mark_broken(&record, e.to_string());
                                break;
                            }
                            std::thread::sleep(Duration::from_millis(100));
                        }
                    }
                }
            }
        }

        if config.deduplicate {
            if let Some(fp) = record.fingerprint.read().unwrap().clone() {
                self.coalesce_duplicate(&record, idx, &fp);
            }
        }

        if header_only {
            return idx;
        }

        let canonical = self.follow_duplicate(idx);
        self.get(canonical).recently_used.store(true, Ordering::Relaxed);
        canonical
    }

    fn coalesce_duplicate(&self, record: &Arc<FileRecordInner>, idx: FileIndex, fingerprint: &str) {
        let existing = {
            let table = self.fingerprints.read().unwrap();
            table.get(fingerprint).copied()
        };
        match existing {
            Some(other_idx) if other_idx != idx => {
                let other = self.get(other_idx);
                if shapes_match(&record, &other) {
                    *record.duplicate_of.write().unwrap() = Some(other_idx);
                    self.close(record);
                }
            }
            Some(_) => {}
            None => {
                self.fingerprints.write().unwrap().insert(fingerprint.to_string(), idx);
                self.stats.record_fingerprint();
            }
        }
    }

    fn follow_duplicate(&self, idx: FileIndex) -> FileIndex {
        let record = self.get(idx);
        record.duplicate_of().unwrap_or(idx)
    }

    /// Opens (or returns the already-open handle for) `record`, enforcing
    /// the max-open-files limit first.
    pub fn open(
        &self,
        idx: FileIndex,
        default_creator: &Arc<dyn ImageInputCreator>,
        config: &CacheConfig,
    ) -> CacheResult<Arc<dyn ImageInput>> {
        let record = self.get(idx);
        if let Some(h) = record.open_handle.read().unwrap().clone() {
            record.recently_used.store(true, Ordering::Relaxed);
            return Ok(h);
        }
        self.check_max_files(config);
        let _guard = record.input_lock.lock().unwrap();
        if let Some(h) = record.open_handle.read().unwrap().clone() {
            record.recently_used.store(true, Ordering::Relaxed);
            return Ok(h);
        }
        let creator = self.effective_creator(&record, default_creator);
        self.open_and_ingest_locked(&record, &creator, config)
    }

    /// Marks `record` broken with `message` and drops its open handle, if
    /// any, decrementing the open-handle counters when a handle was actually
    /// dropped. Called both when header ingestion exhausts its retries and
    /// when a tile/scanline/image read fails past `failure_retries` (spec.md
    /// §4.D.5 step 5, §7).
    pub fn mark_broken(&self, record: &Arc<FileRecordInner>, message: impl Into<String>) {
        *record.broken.write().unwrap() = Some(message.into());
        let mut h = record.open_handle.write().unwrap();
        if let Some(handle) = h.take() {
            handle.close();
            self.open_files_current.fetch_sub(1, Ordering::Relaxed);
            self.stats.record_file_closed();
        }
    }

    /// Unconditionally drops `record`'s open handle.
    pub fn close(&self, record: &Arc<FileRecordInner>) {
        let _guard = record.input_lock.lock().unwrap();
        let mut h = record.open_handle.write().unwrap();
        if let Some(handle) = h.take() {
            handle.close();
            self.open_files_current.fetch_sub(1, Ordering::Relaxed);
            self.stats.record_file_closed();
        }
    }

    /// Clock-sweep release: clears the `recently_used` bit, or closes the
    /// handle if it was already clear. Gives up without blocking long if
    /// the record is busy (a 100ms timed try-lock).
    pub fn release(&self, idx: FileIndex) {
        let record = self.get(idx);
        let Some(_guard) = try_lock_timeout(&record.input_lock, Duration::from_millis(100)) else {
            return;
        };
        if record.recently_used.swap(false, Ordering::Relaxed) {
            return;
        }
        let mut h = record.open_handle.write().unwrap();
        if let Some(handle) = h.take() {
            handle.close();
            self.open_files_current.fetch_sub(1, Ordering::Relaxed);
            self.stats.record_file_closed();
        }
    }

    /// Enforces `config.max_open_files` via a clock-sweep over the
    /// registry, mirroring [`crate::tile_cache::TileCache::check_max_mem`]'s
    /// approach of snapshotting per-shard keys rather than relying on a
    /// live, order-stable iterator.
    fn check_max_files(&self, config: &CacheConfig) {
        let limit = config.max_open_files.max(1);
        if self.open_files_current() < limit {
            return;
        }
        let slack = 4usize;
        let guard = if self.open_files_current() < limit + slack && !config.max_open_files_strict {
            match self.sweep_lock.try_lock() {
                Ok(g) => g,
                Err(_) => return,
            }
        } else {
            self.sweep_lock.lock().unwrap()
        };
        let _guard = guard;

        let mut cursor = self.sweep_cursor.lock().unwrap();
        let mut loops = 0;
        while self.open_files_current() >= limit && loops < 100 {
            loops += 1;
            let shard_idx = cursor.0 % self.name_shards.len();
            let names: Vec<String> = self.name_shards[shard_idx].read().unwrap().keys().cloned().collect();
            if names.is_empty() {
                cursor.0 = (cursor.0 + 1) % self.name_shards.len();
                cursor.1 = 0;
                continue;
            }
            let i = cursor.1 % names.len();
            let name = names[i].clone();
            cursor.1 += 1;
            if cursor.1 >= names.len() {
                cursor.0 = (cursor.0 + 1) % self.name_shards.len();
                cursor.1 = 0;
            }
            if let Some(found_idx) = self.name_shards[shard_idx].read().unwrap().get(&name).copied() {
                self.release(found_idx);
            }
        }
    }

    /// Tears down `record`'s spec and handle. If `force` is false, only
    /// acts when the on-disk mtime changed or the autotile/automip settings
    /// used to ingest headers differ from the current config.
    pub fn invalidate(&self, idx: FileIndex, force: bool, config: &CacheConfig) -> bool {
        let record = self.get(idx);
        if !force && record.is_valid_spec() {
            let settings_changed = record.ingested_autotile.load(Ordering::Relaxed) != config.autotile
                || record.ingested_automip.load(Ordering::Relaxed) != config.automip;
            let mtime_changed = std::fs::metadata(&record.filename)
                .ok()
                .and_then(|m| m.modified().ok())
                .map(|mtime| {
                    let mut stored = record.mtime.write().unwrap();
                    let changed = *stored != Some(mtime);
                    *stored = Some(mtime);
                    changed
                })
                .unwrap_or(false);
            if !settings_changed && !mtime_changed {
                return false;
            }
        }
        self.close(&record);
        *record.subimages.write().unwrap() = Vec::new();
        record.valid_spec.store(false, Ordering::Release);
        *record.broken.write().unwrap() = None;
        *record.duplicate_of.write().unwrap() = None;
        if let Some(fp) = record.fingerprint.write().unwrap().take() {
            self.fingerprints.write().unwrap().remove(&fp);
        }
        true
    }

    /// Invalidates every record in the registry; returns the indices that
    /// were actually touched.
    pub fn invalidate_all(&self, force: bool, config: &CacheConfig) -> Vec<FileIndex> {
        let len = self.len();
        (0..len)
            .map(FileIndex::new)
            .filter(|&idx| self.invalidate(idx, force, config))
            .collect()
    }

    /// Resolves UDIM tile `(u, v)` of the virtual file at `idx`, opening the
    /// concrete file on first access and caching the resolution in the
    /// grid slot.
    pub fn resolve_udim(&self, idx: FileIndex, u: u32, v: u32) -> Option<FileIndex> {
        let record = self.get(idx);
        let udim = record.udim.as_ref()?;
        let slot = udim.slots.get(&(u, v))?;
        if let Some(resolved) = *slot.resolved.read().unwrap() {
            return Some(resolved);
        }
        let (_, concrete_idx, _) = self.find_or_create(&slot.filename, None, false);
        *slot.resolved.write().unwrap() = Some(concrete_idx);
        Some(concrete_idx)
    }

    /// Bounding rectangle of populated UDIM tiles, `(min_u, min_v, max_u, max_v)`.
    pub fn udim_bounds(&self, idx: FileIndex) -> Option<(u32, u32, u32, u32)> {
        let record = self.get(idx);
        let udim = record.udim.as_ref()?;
        let mut min_u = u32::MAX;
        let mut min_v = u32::MAX;
        let mut max_u = 0;
        let mut max_v = 0;
        for &(u, v) in udim.slots.keys() {
            min_u = min_u.min(u);
            min_v = min_v.min(v);
            max_u = max_u.max(u);
            max_v = max_v.max(v);
        }
        if udim.slots.is_empty() {
            None
        } else {
            Some((min_u, min_v, max_u, max_v))
        }
    }
}

fn round_up(value: u32, multiple: u32) -> u32 {
    if multiple == 0 {
        return value;
    }
    value.div_ceil(multiple) * multiple
}

fn detect_env_layout(spec: &ImageSpec) -> EnvLayout {
    let Some(fmt) = spec.get_string("textureformat") else {
        return EnvLayout::None;
    };
    if !fmt.to_lowercase().contains("environment") {
        return EnvLayout::None;
    }
    let (w, h) = (spec.width as i64, spec.height as i64);
    if h != 0 && w == 3 * h / 2 * 2 / 2 && w * 2 == 3 * h {
        EnvLayout::ThreeByTwo
    } else if h != 0 && w * 6 == h {
        EnvLayout::SixByOne
    } else {
        EnvLayout::LatLong
    }
}

fn handle_fingerprint(handle: &dyn ImageInput) -> Option<String> {
    handle.spec(0, 0).and_then(|spec| spec.get_string("oiio:fingerprint").map(|s| s.to_string()))
}

/// Runs header ingestion for a freshly opened codec handle (§4.B "Header
/// ingestion"). Enumerates subimages via `seek_subimage`, fabricates tile
/// sizes for untiled subimages per `autotile`/`autoscanline`, enumerates
/// MIP levels, synthesizes a full pyramid for unmipped subimages when
/// `automip` is set, and rejects the file on channel-count disagreement or
/// an unacceptable untiled/unmipped subimage.
fn ingest_headers(handle: &dyn ImageInput, filename: &str, config: &CacheConfig) -> CacheResult<Vec<SubimageInfo>> {
    let mut subimages = Vec::new();
    let mut expected_channels: Option<u8> = None;
    let mut s = 0u32;

    loop {
        if s > 0 && !handle.seek_subimage(s, 0) {
            break;
        }
        let Some(spec0) = handle.spec(s, 0) else { break };

        let got_channels = spec0.nchannels as u8;
        match expected_channels {
            Some(expected) if expected != got_channels => {
                return Err(CacheError::SubimageMismatch {
                    file: filename.to_string(),
                    subimage: s,
                    expected,
                    got: got_channels,
                });
            }
            None => expected_channels = Some(got_channels),
            _ => {}
        }

        let untiled = spec0.is_untiled();
        let (mut tile_w, mut tile_h) = (spec0.tile_width, spec0.tile_height);
        let mut autotiled = false;
        if untiled {
            if !config.accept_untiled {
                return Err(CacheError::UntiledNotAccepted(filename.to_string()));
            }
            if config.autotile > 0 {
                let mut at = config.autotile.next_power_of_two();
                if config.autoscanline {
                    at = spec0.width;
                } else if let Some(rps) = spec0.get_int("tiff:RowsPerStrip") {
                    if rps > 1 {
                        at = round_up(at, rps as u32);
                    }
                }
                tile_w = at.min(spec0.width).max(1);
                tile_h = config.autotile.next_power_of_two().min(spec0.height).max(1);
                autotiled = true;
            } else {
                tile_w = spec0.width.max(1);
                tile_h = spec0.height.max(1);
            }
        }

        let mut levels = vec![LevelInfo::new(spec0.clone(), tile_w, tile_h, spec0.tile_depth.max(1), false)];
        let mut m = 1u32;
        loop {
            if !handle.seek_subimage(s, m) {
                break;
            }
            let Some(sp) = handle.spec(s, m) else { break };
            let lvl_tw = tile_w.min(sp.width.max(1));
            let lvl_th = tile_h.min(sp.height.max(1));
            levels.push(LevelInfo::new(sp, lvl_tw, lvl_th, 1, false));
            m += 1;
        }

        let is_volume = spec0.is_volume();
        let unmipped = levels.len() == 1 && !is_volume && spec0.get_string("oiio:texturetype").is_none();
        if unmipped && !config.accept_unmipped {
            return Err(CacheError::UnmippedNotAccepted(filename.to_string()));
        }
        if unmipped && config.automip {
            let mut w = spec0.width;
            let mut h = spec0.height;
            while w > 1 || h > 1 {
                w = (w / 2).max(1);
                h = (h / 2).max(1);
                let mut sp = spec0.clone();
                sp.width = w;
                sp.height = h;
                sp.full_width = w;
                sp.full_height = h;
                let lvl_tw = tile_w.min(w).max(1);
                let lvl_th = tile_h.min(h).max(1);
                levels.push(LevelInfo::new(sp, lvl_tw, lvl_th, 1, true));
            }
        }

        let mut min_mip_level = (levels.len() - 1) as u32;
        for (i, lvl) in levels.iter().enumerate() {
            if lvl.spec.width.max(lvl.spec.height) <= config.max_mip_res {
                min_mip_level = i as u32;
                break;
            }
        }

        let (swrap, twrap, rwrap) = WrapMode::parse_triple(&spec0);

        subimages.push(SubimageInfo {
            format: spec0.format,
            nchannels: spec0.nchannels,
            untiled,
            unmipped,
            is_volume,
            full_pixel_range: spec0.width == spec0.full_width && spec0.height == spec0.full_height,
            autotiled,
            min_mip_level,
            env_layout: detect_env_layout(&spec0),
            y_up: config.latlong_up.is_y(),
            sample_border: spec0.get_int("oiio:sampleborder").map(|v| v != 0).unwrap_or(false),
            swrap,
            twrap,
            rwrap,
            levels,
        });
        s += 1;
    }

    if subimages.is_empty() {
        return Err(CacheError::OpenFailed(filename.to_string()));
    }
    Ok(subimages)
}

fn shapes_match(a: &Arc<FileRecordInner>, b: &Arc<FileRecordInner>) -> bool {
    let a_sub = a.subimages.read().unwrap();
    let b_sub = b.subimages.read().unwrap();
    if a_sub.len() != b_sub.len() {
        return false;
    }
    a_sub.iter().zip(b_sub.iter()).all(|(x, y)| {
        x.format == y.format
            && x.nchannels == y.nchannels
            && x.levels.len() == y.levels.len()
            && x.levels[0].spec.width == y.levels[0].spec.width
            && x.levels[0].spec.height == y.levels[0].spec.height
            && x.levels[0].spec.depth == y.levels[0].spec.depth
            && x.env_layout == y.env_layout
            && x.y_up == y.y_up
            && x.sample_border == y.sample_border
            && x.swrap == y.swrap
            && x.twrap == y.twrap
            && x.rwrap == y.rwrap
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ImageInputCreator;
    use std::collections::HashMap as StdHashMap;
    use vfx_core::spec::AttrValue;

    struct ConstInput {
        spec: ImageSpec,
    }

    impl ImageInput for ConstInput {
        fn format_name(&self) -> &str {
            "test"
        }
        fn seek_subimage(&self, subimage: u32, miplevel: u32) -> bool {
            subimage == 0 && miplevel == 0
        }
        fn spec(&self, subimage: u32, miplevel: u32) -> Option<ImageSpec> {
            (subimage == 0 && miplevel == 0).then(|| self.spec.clone())
        }
        fn read_tile(&self, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: &mut [u8]) -> CacheResult<()> {
            Ok(())
        }
        fn read_scanlines(
            &self,
            _: u32,
            _: u32,
            _: u32,
            _: u32,
            _: u32,
            _: u32,
            _: u32,
            _: &mut [u8],
        ) -> CacheResult<()> {
            Ok(())
        }
        fn read_image(&self, _: u32, _: u32, _: u32, _: u32, _: &mut [u8]) -> CacheResult<()> {
            Ok(())
        }
        fn close(&self) {}
        fn geterror(&self) -> Option<String> {
            None
        }
    }

    struct ConstCreator {
        fingerprint: Option<String>,
    }

    impl ImageInputCreator for ConstCreator {
        fn open(&self, _filename: &str) -> CacheResult<Arc<dyn ImageInput>> {
            let mut attributes = StdHashMap::new();
            if let Some(fp) = &self.fingerprint {
                attributes.insert("oiio:fingerprint".to_string(), AttrValue::String(fp.clone()));
            }
            Ok(Arc::new(ConstInput {
                spec: ImageSpec {
                    x: 0,
                    y: 0,
                    z: 0,
                    width: 16,
                    height: 16,
                    depth: 1,
                    full_x: 0,
                    full_y: 0,
                    full_z: 0,
                    full_width: 16,
                    full_height: 16,
                    full_depth: 1,
                    tile_width: 8,
                    tile_height: 8,
                    tile_depth: 1,
                    nchannels: 4,
                    format: DataFormat::F32,
                    attributes,
                },
            }))
        }
    }

    #[test]
    fn find_or_create_reuses_the_same_index() {
        let registry = FileRegistry::default();
        let (_, idx1, first1) = registry.find_or_create("a.exr", None, false);
        let (_, idx2, first2) = registry.find_or_create("a.exr", None, false);
        assert_eq!(idx1, idx2);
        assert!(first1);
        assert!(!first2);
    }

    #[test]
    fn verify_opens_and_sets_valid_spec() {
        let registry = FileRegistry::default();
        let (_, idx, _) = registry.find_or_create("a.exr", None, false);
        let creator: Arc<dyn ImageInputCreator> = Arc::new(ConstCreator { fingerprint: None });
        let config = CacheConfig::default();
        let canonical = registry.verify(idx, false, &creator, &config);
        assert_eq!(canonical, idx);
        let record = registry.get(idx);
        assert!(record.is_valid_spec());
        assert!(record.has_open_handle());
    }

    #[test]
    fn duplicate_fingerprints_coalesce() {
        let registry = FileRegistry::default();
        let creator: Arc<dyn ImageInputCreator> = Arc::new(ConstCreator {
            fingerprint: Some("same-hash".to_string()),
        });
        let config = CacheConfig::default();

        let (_, idx_a, _) = registry.find_or_create("a.exr", None, false);
        registry.verify(idx_a, false, &creator, &config);

        let (_, idx_b, _) = registry.find_or_create("b.exr", None, false);
        let canon = registry.verify(idx_b, false, &creator, &config);

        assert_eq!(canon, idx_a);
        let record_b = registry.get(idx_b);
        assert_eq!(record_b.duplicate_of(), Some(idx_a));
        assert!(!record_b.has_open_handle());
    }

    #[test]
    fn udim_pattern_resolves_known_tiles() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["tex.1001.exr", "tex.1011.exr", "tex.1002.exr"] {
            std::fs::File::create(dir.path().join(name)).unwrap();
        }
        let pattern = dir.path().join("tex.<UDIM>.exr");
        let registry = FileRegistry::default();
        let (_, idx, _) = registry.find_or_create(pattern.to_str().unwrap(), None, false);
        assert!(registry.get(idx).is_virtual());
        assert!(registry.resolve_udim(idx, 0, 0).is_some());
        assert!(registry.resolve_udim(idx, 1, 0).is_some());
        assert!(registry.resolve_udim(idx, 0, 1).is_some());
        assert!(registry.resolve_udim(idx, 3, 0).is_none());
    }

    #[test]
    fn broken_implies_no_open_handle() {
        struct FailingCreator;
        impl ImageInputCreator for FailingCreator {
            fn open(&self, filename: &str) -> CacheResult<Arc<dyn ImageInput>> {
                Err(CacheError::OpenFailed(filename.to_string()))
            }
        }
        let registry = FileRegistry::default();
        let (_, idx, _) = registry.find_or_create("missing.exr", None, false);
        let creator: Arc<dyn ImageInputCreator> = Arc::new(FailingCreator);
        let config = CacheConfig::default();
        registry.verify(idx, false, &creator, &config);
        let record = registry.get(idx);
        assert!(record.is_broken());
        assert!(!record.has_open_handle());
    }
}
