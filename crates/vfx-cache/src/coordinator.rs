//! The cache coordinator: public API surface, configuration, the
//! per-thread microcache, and the find-tile / get-pixels dispatch that ties
//! [`crate::file_registry::FileRegistry`] and [`crate::tile_cache::TileCache`]
//! together.
//!
//! Grounded on `vfx_io::cache::ImageCache`'s public method surface
//! (`get`/`put`/`evict`/stats accessors) generalized to the tiled,
//! mip-mapped, concurrent-read protocol spec.md requires, and on
//! `vfx_ocio::cache::ProcessorCache`'s `Arc<...>`-sharing ownership model for
//! a cache that many threads hold a clone of.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use vfx_core::spec::AttrValue;

use crate::codec::{ImageInput, ImageInputCreator, ImageSpec, VfxIoInputCreator};
use crate::colorpipe::{ColorPipeline, IdentityColorPipeline};
use crate::error::{CacheError, CacheResult};
use crate::file_registry::FileRegistry;
use crate::id::{FileIndex, TileId};
use crate::stats::CacheStatistics;
use crate::tile_cache::{TileCache, TileRecord};

/// Which axis convention a lat-long environment map's rows increase toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatLongUp {
    /// First row is +Y (the common convention).
    #[default]
    Y,
    /// First row is +Z.
    Z,
}

impl LatLongUp {
    /// True for the `Y`-up convention.
    pub fn is_y(self) -> bool {
        matches!(self, LatLongUp::Y)
    }
}

/// Tunables for a [`CacheCoordinator`].
///
/// Mirrors OIIO's `ImageCache` attribute table; every field here is also
/// reachable (by name) through [`CacheCoordinator::attribute`]/
/// [`CacheCoordinator::getattribute`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Soft limit on simultaneously open codec handles.
    pub max_open_files: usize,
    /// Soft limit on tile-cache memory, in bytes.
    pub max_memory_bytes: usize,
    /// Fabricated tile size (0 = use an untiled file's full scanline width;
    /// otherwise rounded up to a power of two) for subimages with no native
    /// tiling.
    pub autotile: u32,
    /// When autotiling, fabricate tiles as full-width scanline strips
    /// instead of square tiles.
    pub autoscanline: bool,
    /// Synthesize a full MIP pyramid for subimages that ship only one level.
    pub automip: bool,
    /// Force all tile storage to `f32` regardless of the file's native format.
    pub forcefloat: bool,
    /// Accept untiled subimages (fabricating tiles per `autotile`) rather
    /// than rejecting the file outright.
    pub accept_untiled: bool,
    /// Accept unmipped subimages rather than rejecting the file outright.
    pub accept_unmipped: bool,
    /// Coalesce files with matching content fingerprints.
    pub deduplicate: bool,
    /// Extra attempts after a failed tile read before giving up.
    pub failure_retries: u32,
    /// Finest MIP resolution texture lookups are allowed to use.
    pub max_mip_res: u32,
    /// Colon-separated directories searched for relative filenames (stored,
    /// not applied - search-path resolution is a caller concern upstream of
    /// this crate).
    pub searchpath: String,
    /// Trust file extensions over sniffing file contents when opening.
    pub trust_file_extensions: bool,
    /// Treat `max_open_files` as a hard cap rather than a soft target.
    pub max_open_files_strict: bool,
    /// Filename substituted for any file that fails to open.
    pub substitute_image: Option<String>,
    /// Lat-long environment map row convention.
    pub latlong_up: LatLongUp,
    /// Per-file cap on distinct error messages surfaced via `tracing`.
    pub max_errors_per_file: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let hw = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        // mirrors OIIO's default clamp: min(100, max(10, system_limit - 5 * hw)),
        // approximating a typical 1024 soft-limit system since we don't query
        // the OS's actual rlimit from this crate.
        let system_limit = 1024usize;
        let max_open_files = 100usize.min(10usize.max(system_limit.saturating_sub(5 * hw)));
        Self {
            max_open_files,
            max_memory_bytes: 1 << 30,
            autotile: 0,
            autoscanline: false,
            automip: false,
            forcefloat: false,
            accept_untiled: true,
            accept_unmipped: true,
            deduplicate: true,
            failure_retries: 0,
            max_mip_res: u32::MAX,
            searchpath: String::new(),
            trust_file_extensions: false,
            max_open_files_strict: false,
            substitute_image: None,
            latlong_up: LatLongUp::Y,
            max_errors_per_file: 100,
        }
    }
}

struct MicrocacheSlot {
    id: TileId,
    record: Arc<TileRecord>,
}

/// Per-thread 2-slot tile LRU plus a filename lookup cache, bypassing the
/// shared maps for the hot repeated-access path.
struct PerThreadMicrocache {
    epoch: u64,
    slots: [Option<MicrocacheSlot>; 2],
    next_victim: usize,
    filenames: HashMap<String, FileIndex>,
}

impl PerThreadMicrocache {
    fn new() -> Self {
        Self {
            epoch: 0,
            slots: [None, None],
            next_victim: 0,
            filenames: HashMap::new(),
        }
    }
}

thread_local! {
    static MICROCACHE: RefCell<PerThreadMicrocache> = RefCell::new(PerThreadMicrocache::new());
    static LAST_ERROR: RefCell<Option<CacheError>> = RefCell::new(None);
}

/// The rectangle a [`TileHandle`] covers, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRoi {
    /// Left edge, in pixels.
    pub x: u32,
    /// Top edge, in pixels.
    pub y: u32,
    /// Width, in pixels.
    pub width: u32,
    /// Height, in pixels.
    pub height: u32,
}

/// A resolved reference to one cached tile, returned by
/// [`CacheCoordinator::get_tile`].
///
/// Holding one does not pin the tile against eviction; the shared record it
/// wraps stays subject to the cache's own clock-sweep regardless of any
/// handle's lifetime.
pub struct TileHandle {
    record: Arc<TileRecord>,
    roi: TileRoi,
}

impl TileHandle {
    /// The rectangle this tile covers, in pixel coordinates.
    pub fn tile_roi(&self) -> TileRoi {
        self.roi
    }

    /// The tile's decoded samples as packed `f32`, or `None` if the read
    /// failed (check [`TileHandle::is_valid`] first).
    pub fn tile_pixels(&self) -> Option<Vec<f32>> {
        self.record.pixels().map(|bytes| crate::codec::read_f32_samples(bytes))
    }

    /// False if the underlying read failed and this handle wraps a cached
    /// failure marker.
    pub fn is_valid(&self) -> bool {
        self.record.is_valid()
    }
}

/// Ties the file registry and tile cache together behind one public API.
///
/// Cheap to share: clone the `Arc<CacheCoordinator>` a caller holds rather
/// than constructing a second coordinator, so every thread reads through the
/// same registry/cache/stats.
pub struct CacheCoordinator {
    registry: FileRegistry,
    tiles: TileCache,
    stats: Arc<CacheStatistics>,
    config: RwLock<CacheConfig>,
    default_creator: Arc<dyn ImageInputCreator>,
    colorpipe: Arc<dyn ColorPipeline>,
    invalidation_epoch: AtomicU64,
}

impl CacheCoordinator {
    /// Creates a coordinator backed by the default `vfx_io`-based codec
    /// adapter and an identity color pipeline.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_creator_and_colorpipe(config, Arc::new(VfxIoInputCreator), Arc::new(IdentityColorPipeline))
    }

    /// Creates a coordinator with an explicit default codec creator and
    /// color pipeline.
    pub fn with_creator_and_colorpipe(
        config: CacheConfig,
        default_creator: Arc<dyn ImageInputCreator>,
        colorpipe: Arc<dyn ColorPipeline>,
    ) -> Self {
        let stats = Arc::new(CacheStatistics::default());
        let tiles = TileCache::new(config.max_memory_bytes, stats.clone());
        Self {
            registry: FileRegistry::new(stats.clone()),
            tiles,
            stats,
            config: RwLock::new(config),
            default_creator,
            colorpipe,
            invalidation_epoch: AtomicU64::new(0),
        }
    }

    /// Shared statistics handle.
    pub fn stats(&self) -> &Arc<CacheStatistics> {
        &self.stats
    }

    fn config_snapshot(&self) -> CacheConfig {
        self.config.read().unwrap().clone()
    }

    /// Stashes `err` as the calling thread's last error, for callers using
    /// the `bool`-return-plus-`geterror` style rather than `CacheResult`.
    fn record_error(&self, err: &CacheError) {
        LAST_ERROR.with(|cell| *cell.borrow_mut() = Some(err.clone()));
    }

    /// Returns (and, if `clear`, discards) the calling thread's last
    /// recorded error message.
    pub fn geterror(&self, clear: bool) -> Option<String> {
        LAST_ERROR.with(|cell| {
            let mut slot = cell.borrow_mut();
            let msg = slot.as_ref().map(ToString::to_string);
            if clear {
                *slot = None;
            }
            msg
        })
    }

    /// True if the calling thread has a pending error from a prior call.
    pub fn has_error(&self) -> bool {
        LAST_ERROR.with(|cell| cell.borrow().is_some())
    }

    // ---- file lifecycle ----------------------------------------------

    /// Resolves `filename` to a [`FileIndex`], opening it and ingesting its
    /// headers (or following an existing duplicate coalescing) if this is
    /// the first reference.
    pub fn find_file(&self, filename: &str) -> CacheResult<FileIndex> {
        let cached = MICROCACHE.with(|cell| cell.borrow().filenames.get(filename).copied());
        if let Some(idx) = cached {
            return Ok(idx);
        }
        let (_, idx, _) = self.registry.find_or_create(filename, None, false);
        let config = self.config_snapshot();
        let canonical = self.registry.verify(idx, false, &self.default_creator, &config);
        let record = self.registry.get(canonical);
        if record.is_broken() {
            if let Some(sub) = config.substitute_image.clone() {
                let (_, sub_idx, _) = self.registry.find_or_create(&sub, None, false);
                let sub_canon = self.registry.verify(sub_idx, false, &self.default_creator, &config);
                if !self.registry.get(sub_canon).is_broken() {
                    return Ok(sub_canon);
                }
                let err = CacheError::SubstituteMissing(sub);
                self.record_error(&err);
                return Err(err);
            }
            let err = CacheError::Broken {
                file: record.filename.clone(),
                message: record.broken_message().unwrap_or_default(),
            };
            self.record_error(&err);
            return Err(err);
        }
        MICROCACHE.with(|cell| {
            cell.borrow_mut().filenames.insert(filename.to_string(), canonical);
        });
        Ok(canonical)
    }

    /// True if `file` has a valid, non-broken spec.
    pub fn verify_file(&self, file: FileIndex) -> bool {
        let record = self.registry.get(file);
        record.is_valid_spec() && !record.is_broken()
    }

    /// True if `file` has a valid, non-broken spec (alias for
    /// [`CacheCoordinator::verify_file`], named to match the
    /// check-a-handle convention callers migrating from a C-style
    /// image-cache API expect).
    pub fn good(&self, file: FileIndex) -> bool {
        self.verify_file(file)
    }

    /// The canonical filename backing `file`.
    pub fn filename(&self, file: FileIndex) -> String {
        self.registry.get(file).filename.clone()
    }

    /// Registers `filename` with an explicit creator (procedural or
    /// in-memory images that bypass the default codec adapter).
    pub fn add_file(&self, filename: &str, creator: Arc<dyn ImageInputCreator>) -> CacheResult<FileIndex> {
        let (_, idx, _) = self.registry.find_or_create(filename, Some(creator), true);
        let config = self.config_snapshot();
        let canonical = self.registry.verify(idx, false, &self.default_creator, &config);
        let record = self.registry.get(canonical);
        if record.is_broken() {
            let err = CacheError::Broken {
                file: record.filename.clone(),
                message: record.broken_message().unwrap_or_default(),
            };
            self.record_error(&err);
            return Err(err);
        }
        Ok(canonical)
    }

    /// Injects a pre-decoded tile directly into the cache, bypassing the
    /// codec entirely.
    #[allow(clippy::too_many_arguments)]
    pub fn add_tile(
        &self,
        file: FileIndex,
        subimage: u32,
        miplevel: u32,
        x: u32,
        y: u32,
        z: u32,
        chbegin: u16,
        chend: u16,
        pixels: Arc<[u8]>,
    ) {
        let id = TileId::new(file, subimage, miplevel, x, y, z, chbegin, chend, 0);
        let record = Arc::new(TileRecord::empty(id, pixels.len()));
        record.publish(true, pixels);
        self.tiles.force_insert(id, record);
    }

    /// Resolves UDIM tile `(u, v)` of the virtual file `file` to a concrete
    /// [`FileIndex`], opening it on first reference.
    pub fn resolve_udim(&self, file: FileIndex, u: u32, v: u32) -> CacheResult<FileIndex> {
        let concrete = self
            .registry
            .resolve_udim(file, u, v)
            .ok_or_else(|| CacheError::FileNotFound(format!("no UDIM tile at ({u}, {v})")))?;
        let config = self.config_snapshot();
        let canonical = self.registry.verify(concrete, false, &self.default_creator, &config);
        Ok(canonical)
    }

    /// Bounding rectangle of populated UDIM tiles for virtual file `file`.
    pub fn udim_bounds(&self, file: FileIndex) -> Option<(u32, u32, u32, u32)> {
        self.registry.udim_bounds(file)
    }

    // ---- header / metadata access -------------------------------------

    /// The header for `file`'s `subimage`, level 0.
    pub fn get_imagespec(&self, file: FileIndex, subimage: u32) -> CacheResult<ImageSpec> {
        let record = self.registry.get(file);
        record.with_level(subimage, 0, |_, lvl| lvl.spec.clone())
    }

    /// The header for one specific `(subimage, miplevel)`.
    pub fn get_imagespec_level(&self, file: FileIndex, subimage: u32, miplevel: u32) -> CacheResult<ImageSpec> {
        let record = self.registry.get(file);
        record.with_level(subimage, miplevel, |_, lvl| lvl.spec.clone())
    }

    /// Generic metadata query, following the `"exists"`/dimension/attribute
    /// fallthrough OIIO's `get_image_info` uses.
    pub fn get_image_info(&self, file: FileIndex, dataname: &str) -> Option<AttrValue> {
        let record = self.registry.get(file);
        if dataname == "exists" {
            return Some(AttrValue::Int(i64::from(!record.is_broken())));
        }
        let spec = record.with_level(0, 0, |_, lvl| lvl.spec.clone()).ok()?;
        match dataname {
            "channels" => Some(AttrValue::Int(spec.nchannels as i64)),
            "width" => Some(AttrValue::Int(spec.width as i64)),
            "height" => Some(AttrValue::Int(spec.height as i64)),
            "subimages" => Some(AttrValue::Int(record.subimage_count() as i64)),
            _ => spec.attributes.get(dataname).cloned(),
        }
    }

    /// Optional thumbnail bytes for `file`'s `subimage`.
    pub fn get_thumbnail(&self, file: FileIndex, subimage: u32) -> CacheResult<Option<Vec<u8>>> {
        let config = self.config_snapshot();
        let handle = self.registry.open(file, &self.default_creator, &config)?;
        Ok(handle.get_thumbnail(subimage))
    }

    // ---- tile access ----------------------------------------------------

    /// Finds (reading through the codec on first reference) the tile
    /// identified by `id`.
    ///
    /// Routes through the calling thread's microcache first; a miss there
    /// falls through to the shared tile cache, where exactly one caller
    /// across all threads performs the actual decode (see
    /// [`crate::tile_cache::TileCache::insert_or_retrieve`]).
    pub fn find_tile(&self, id: TileId) -> CacheResult<Arc<TileRecord>> {
        self.stats.find_tile_calls.fetch_add(1, Ordering::Relaxed);
        let epoch = self.invalidation_epoch.load(Ordering::Acquire);

        let hit = MICROCACHE.with(|cell| {
            let mut mc = cell.borrow_mut();
            if mc.epoch != epoch {
                mc.slots = [None, None];
                mc.filenames.clear();
                mc.epoch = epoch;
            }
            mc.slots.iter().find_map(|slot| match slot {
                Some(s) if s.id == id => Some(s.record.clone()),
                _ => None,
            })
        });
        if let Some(rec) = hit {
            return Ok(rec);
        }

        self.stats.microcache_misses.fetch_add(1, Ordering::Relaxed);
        let rec = self.find_tile_main_cache(id)?;
        MICROCACHE.with(|cell| {
            let mut mc = cell.borrow_mut();
            let victim = mc.next_victim;
            mc.slots[victim] = Some(MicrocacheSlot { id, record: rec.clone() });
            mc.next_victim = 1 - victim;
        });
        Ok(rec)
    }

    /// Resolves and returns a handle to the tile covering pixel `(x, y)` at
    /// `(subimage, miplevel)`, reading it through the codec on first
    /// reference. A thin, ROI-aware wrapper over [`CacheCoordinator::find_tile`]
    /// for callers working in pixel coordinates rather than tile origins.
    #[allow(clippy::too_many_arguments)]
    pub fn get_tile(
        &self,
        file: FileIndex,
        subimage: u32,
        miplevel: u32,
        x: u32,
        y: u32,
        chbegin: u32,
        chend: u32,
    ) -> CacheResult<TileHandle> {
        let record = self.registry.get(file);
        let (tile_w, tile_h) = record
            .with_level(subimage, miplevel, |_, lvl| (lvl.tile_width, lvl.tile_height))
            .map_err(|e| {
                self.record_error(&e);
                e
            })?;
        let tile_x = (x / tile_w) * tile_w;
        let tile_y = (y / tile_h) * tile_h;
        let id = TileId::new(file, subimage, miplevel, tile_x, tile_y, 0, chbegin as u16, chend as u16, 0);
        let tile = self.find_tile(id)?;
        Ok(TileHandle {
            record: tile,
            roi: TileRoi { x: tile_x, y: tile_y, width: tile_w, height: tile_h },
        })
    }

    /// Releases a tile handle obtained from [`CacheCoordinator::get_tile`].
    ///
    /// Does nothing beyond dropping `handle`: a tile's residency is governed
    /// by the cache's own clock-sweep, never by outstanding handle counts.
    /// This exists for callers translating from an explicit acquire/release
    /// image-cache API.
    pub fn release_tile(&self, _handle: TileHandle) {}

    fn find_tile_main_cache(&self, id: TileId) -> CacheResult<Arc<TileRecord>> {
        let record = self.registry.get(id.file);
        if record.is_broken() {
            let err = CacheError::Broken {
                file: record.filename.clone(),
                message: record.broken_message().unwrap_or_default(),
            };
            self.record_error(&err);
            return Err(err);
        }
        let nbytes = self.tile_nbytes(&record, id)?;
        let placeholder = Arc::new(TileRecord::empty(id, nbytes));
        let (winner, inserted) = self.tiles.insert_or_retrieve(id, placeholder);
        if inserted {
            self.stats.tile_cache_misses.fetch_add(1, Ordering::Relaxed);
            self.fill_tile(&record, id, &winner);
        } else {
            winner.wait_ready();
        }
        Ok(winner)
    }

    fn tile_nbytes(&self, record: &Arc<crate::file_registry::FileRecordInner>, id: TileId) -> CacheResult<usize> {
        record.with_level(id.subimage, id.miplevel, |sub, lvl| {
            let nch = (id.chend as u32).min(sub.nchannels).saturating_sub(id.chbegin as u32) as usize;
            lvl.tile_width as usize * lvl.tile_height as usize * nch * 4
        })
    }

    fn fill_tile(&self, record: &Arc<crate::file_registry::FileRecordInner>, id: TileId, slot: &Arc<TileRecord>) {
        let config = self.config_snapshot();
        let mut attempt = 0u32;
        loop {
            match self.read_tile_pixels(record, id, &config) {
                Ok(mut buf) => {
                    if id.color_transform != 0 {
                        if let Ok(spec) = record.with_level(id.subimage, id.miplevel, |_, lvl| lvl.spec.clone()) {
                            let _ = self.colorpipe.colorconvert(&mut buf, &spec, "source", "display");
                        }
                    }
                    slot.publish(true, Arc::from(buf.into_boxed_slice()));
                    return;
                }
                Err(_) if attempt < config.failure_retries => {
                    attempt += 1;
                }
                Err(e) => {
                    self.registry.mark_broken(
                        record,
                        format!(
                            "tile read failed at subimage {} miplevel {} origin ({},{},{}): {e}",
                            id.subimage, id.miplevel, id.x, id.y, id.z
                        ),
                    );
                    slot.publish(false, Arc::from(Vec::<u8>::new().into_boxed_slice()));
                    return;
                }
            }
        }
    }

    /// Dispatches a single tile decode: an ordinary codec tile read, a
    /// scanline-row read amortized across an entire tile row for
    /// autotiled-untiled subimages, a whole-image `read_image` for
    /// untiled-and-not-autotiled subimages, or (for a synthesized MIP level)
    /// a recursive box-downsample from the level above.
    fn read_tile_pixels(
        &self,
        record: &Arc<crate::file_registry::FileRecordInner>,
        id: TileId,
        config: &CacheConfig,
    ) -> CacheResult<Vec<u8>> {
        let (untiled, autotiled, synthesized, tile_w, tile_h, nch_file) = record.with_level(id.subimage, id.miplevel, |sub, lvl| {
            (sub.untiled, sub.autotiled, lvl.synthesized, lvl.tile_width, lvl.tile_height, sub.nchannels)
        })?;

        let chbegin = id.chbegin as u32;
        let chend = (id.chend as u32).min(nch_file);
        let nch = chend.saturating_sub(chbegin) as usize;

        if synthesized {
            let mut buf = vec![0u8; tile_w as usize * tile_h as usize * nch * 4];
            self.downsample_tile(record, id, tile_w, tile_h, chbegin, chend, &mut buf)?;
            return Ok(buf);
        }

        if untiled && autotiled {
            return self.read_tile_row_amortized(record, id, tile_w, tile_h, chbegin, chend, config);
        }

        let mut buf = vec![0u8; tile_w as usize * tile_h as usize * nch * 4];
        let handle = self.registry.open(id.file, &self.default_creator, config)?;
        let start = std::time::Instant::now();
        let result = if untiled {
            handle.read_image(id.subimage, id.miplevel, chbegin, chend, &mut buf)
        } else {
            handle.read_tile(id.subimage, id.miplevel, id.x, id.y, id.z, chbegin, chend, &mut buf)
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                self.account_tile_read(record, id, tile_w, tile_h, buf.len() as u64, elapsed_ms);
                if untiled && record.subimage_count() == 1 {
                    // Open question preserved from spec.md §9: closing here frees the
                    // handle under pressure even though later get_pixels calls on this
                    // file remain legal and will transparently reopen it.
                    self.registry.close(record);
                }
                Ok(buf)
            }
            Err(e) => {
                if record.errors_allowed(config.max_errors_per_file) {
                    tracing::warn!(file = %record.filename, error = %e, "tile read failed");
                }
                Err(e)
            }
        }
    }

    /// Records per-file and per-thread-aggregate stats for one successful
    /// tile read, mirroring `vfx_io::cache::CacheStats`'s point-in-time
    /// accounting (§7's "redundant tile bits are a current-residency signal
    /// only" open question is preserved, not reconstructed across eviction).
    fn account_tile_read(
        &self,
        record: &Arc<crate::file_registry::FileRecordInner>,
        id: TileId,
        tile_w: u32,
        tile_h: u32,
        nbytes: u64,
        elapsed_ms: u64,
    ) {
        self.stats.record_read(nbytes, elapsed_ms);
        record.bytes_read.fetch_add(nbytes, Ordering::Relaxed);
        record.tiles_read.fetch_add(1, Ordering::Relaxed);
        record.io_micros.fetch_add(elapsed_ms * 1000, Ordering::Relaxed);
        let _ = record.with_level(id.subimage, id.miplevel, |_, lvl| {
            let tx = id.x / tile_w.max(1);
            let ty = id.y / tile_h.max(1);
            if lvl.mark_tile_read(tx, ty, id.z) {
                record.redundant_tiles.fetch_add(1, Ordering::Relaxed);
                record.redundant_bytes.fetch_add(nbytes, Ordering::Relaxed);
            }
        });
    }

    /// Reads one `tile_height`-tall row of scanlines spanning the subimage's
    /// full width, then splits it into tile-sized chunks: the chunk matching
    /// `id` is returned to the caller; every other chunk in the row is
    /// packaged into its own [`TileRecord`] and offered to the shared tile
    /// cache via `insert_or_retrieve` so a neighboring `get_pixels` call
    /// doesn't re-read scanlines this call already decoded. Amortizes one
    /// scanline read across an entire tile row, per spec.md §4.D.5.2.
    #[allow(clippy::too_many_arguments)]
    fn read_tile_row_amortized(
        &self,
        record: &Arc<crate::file_registry::FileRecordInner>,
        id: TileId,
        tile_w: u32,
        tile_h: u32,
        chbegin: u32,
        chend: u32,
        config: &CacheConfig,
    ) -> CacheResult<Vec<u8>> {
        let (img_w, img_h) = record.with_level(id.subimage, id.miplevel, |_, lvl| (lvl.spec.width, lvl.spec.height))?;
        let nch = chend.saturating_sub(chbegin) as usize;
        let row_ybegin = id.y;
        let row_yend = (id.y + tile_h).min(img_h);
        let row_h = (row_yend - row_ybegin) as usize;

        let handle = self.registry.open(id.file, &self.default_creator, config)?;
        let mut row = vec![0u8; img_w as usize * row_h * nch * 4];
        let start = std::time::Instant::now();
        handle.read_scanlines(id.subimage, id.miplevel, row_ybegin, row_yend, id.z, chbegin, chend, &mut row)?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let tiles_x = img_w.div_ceil(tile_w).max(1);

        let mut own = vec![0u8; tile_w as usize * tile_h as usize * nch * 4];
        for tx in 0..tiles_x {
            let tile_x = tx * tile_w;
            let mut chunk = vec![0u8; tile_w as usize * tile_h as usize * nch * 4];
            for local_y in 0..row_h {
                for local_x in 0..tile_w as usize {
                    let gx = tile_x as usize + local_x;
                    if gx >= img_w as usize {
                        break;
                    }
                    let src = (local_y * img_w as usize + gx) * nch * 4;
                    let dst = (local_y * tile_w as usize + local_x) * nch * 4;
                    chunk[dst..dst + nch * 4].copy_from_slice(&row[src..src + nch * 4]);
                }
            }

            if tile_x == id.x {
                self.account_tile_read(record, id, tile_w, tile_h, chunk.len() as u64, elapsed_ms);
                own = chunk;
                continue;
            }

            let neighbor_id = TileId::new(id.file, id.subimage, id.miplevel, tile_x, id.y, id.z, id.chbegin, id.chend, id.color_transform);
            let placeholder = Arc::new(TileRecord::empty(neighbor_id, chunk.len()));
            let (winner, inserted) = self.tiles.insert_or_retrieve(neighbor_id, placeholder);
            if inserted {
                self.account_tile_read(record, neighbor_id, tile_w, tile_h, chunk.len() as u64, 0);
                winner.publish(true, Arc::from(chunk.into_boxed_slice()));
            }
            // Lost the insert race for this neighbor: someone else is already
            // filling it (or already has), so our redundantly-decoded chunk is
            // simply dropped here.
        }
        Ok(own)
    }

    #[allow(clippy::too_many_arguments)]
    fn downsample_tile(
        &self,
        record: &Arc<crate::file_registry::FileRecordInner>,
        id: TileId,
        tile_w: u32,
        tile_h: u32,
        chbegin: u32,
        chend: u32,
        out: &mut [u8],
    ) -> CacheResult<()> {
        let src_miplevel = id.miplevel - 1;
        let (src_w, src_h) = record.with_level(id.subimage, src_miplevel, |_, lvl| (lvl.spec.width, lvl.spec.height))?;
        let x0 = (id.x * 2).min(src_w);
        let y0 = (id.y * 2).min(src_h);
        let x1 = ((id.x + tile_w) * 2).min(src_w);
        let y1 = ((id.y + tile_h) * 2).min(src_h);
        if x1 <= x0 || y1 <= y0 {
            return Ok(());
        }

        let nch = (chend - chbegin) as usize;
        let src = self.read_rect(id.file, id.subimage, src_miplevel, x0, y0, x1, y1, chbegin, chend)?;
        let src_w_rect = (x1 - x0) as usize;
        let src_h_rect = (y1 - y0) as usize;

        for ty in 0..tile_h as usize {
            let sy0 = ty * 2;
            if sy0 >= src_h_rect {
                continue;
            }
            let sy1 = (sy0 + 1).min(src_h_rect - 1);
            for tx in 0..tile_w as usize {
                let sx0 = tx * 2;
                if sx0 >= src_w_rect {
                    continue;
                }
                let sx1 = (sx0 + 1).min(src_w_rect - 1);
                for c in 0..nch {
                    let mut sum = 0.0f32;
                    let mut count = 0.0f32;
                    for &syy in &[sy0, sy1] {
                        for &sxx in &[sx0, sx1] {
                            let idx = (syy * src_w_rect + sxx) * nch + c;
                            if let Some(&v) = src.get(idx) {
                                sum += v;
                                count += 1.0;
                            }
                        }
                    }
                    let avg = if count > 0.0 { sum / count } else { 0.0 };
                    let dst = ((ty * tile_w as usize + tx) * nch + c) * 4;
                    if dst + 4 <= out.len() {
                        out[dst..dst + 4].copy_from_slice(&avg.to_ne_bytes());
                    }
                }
            }
        }
        Ok(())
    }

    /// Reads a (possibly multi-tile) rectangle `[x0,x1) x [y0,y1)` of one
    /// subimage/miplevel's pixel-index space (not clipped against the
    /// display window - callers needing display-window clipping should use
    /// [`Self::get_pixels`]), through the tile cache.
    #[allow(clippy::too_many_arguments)]
    fn read_rect(
        &self,
        file: FileIndex,
        subimage: u32,
        miplevel: u32,
        x0: u32,
        y0: u32,
        x1: u32,
        y1: u32,
        chbegin: u32,
        chend: u32,
    ) -> CacheResult<Vec<f32>> {
        let record = self.registry.get(file);
        let (tile_w, tile_h) = record.with_level(subimage, miplevel, |_, lvl| (lvl.tile_width, lvl.tile_height))?;
        let nch = (chend - chbegin) as usize;
        let rw = (x1 - x0) as usize;
        let rh = (y1 - y0) as usize;
        let mut out = vec![0.0f32; rw * rh * nch];

        let tx0 = x0 / tile_w;
        let tx1 = (x1 - 1) / tile_w;
        let ty0 = y0 / tile_h;
        let ty1 = (y1 - 1) / tile_h;

        for ty in ty0..=ty1 {
            for tx in tx0..=tx1 {
                let tile_x = tx * tile_w;
                let tile_y = ty * tile_h;
                let id = TileId::new(file, subimage, miplevel, tile_x, tile_y, 0, chbegin as u16, chend as u16, 0);
                let rec = self.find_tile(id)?;
                if !rec.is_valid() {
                    continue;
                }
                let Some(pixels) = rec.pixels() else { continue };
                let samples = crate::codec::read_f32_samples(pixels);
                let ov_x0 = tile_x.max(x0);
                let ov_y0 = tile_y.max(y0);
                let ov_x1 = (tile_x + tile_w).min(x1);
                let ov_y1 = (tile_y + tile_h).min(y1);
                for gy in ov_y0..ov_y1 {
                    for gx in ov_x0..ov_x1 {
                        let src_idx = ((gy - tile_y) as usize * tile_w as usize + (gx - tile_x) as usize) * nch;
                        let dst_idx = ((gy - y0) as usize * rw + (gx - x0) as usize) * nch;
                        for c in 0..nch {
                            out[dst_idx + c] = samples.get(src_idx + c).copied().unwrap_or(0.0);
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// The public hot-path read: fills `out` (row-major,
    /// `(xend-xbegin)*(yend-ybegin)*(chend-chbegin)` `f32` samples) for the
    /// rectangle `[xbegin,xend) x [ybegin,yend)` in display-window pixel
    /// coordinates, zero-filling any pixels outside the data window.
    #[allow(clippy::too_many_arguments)]
    pub fn get_pixels(
        &self,
        file: FileIndex,
        subimage: u32,
        miplevel: u32,
        xbegin: i32,
        xend: i32,
        ybegin: i32,
        yend: i32,
        chbegin: u32,
        chend: u32,
        out: &mut [f32],
    ) -> CacheResult<()> {
        let record = self.registry.get(file);
        let (dw_x, dw_y, dw_w, dw_h, tile_w, tile_h) = record
            .with_level(subimage, miplevel, |_, lvl| {
                (lvl.spec.x, lvl.spec.y, lvl.spec.width, lvl.spec.height, lvl.tile_width, lvl.tile_height)
            })
            .map_err(|e| {
                self.record_error(&e);
                e
            })?;

        let nch = (chend - chbegin) as usize;
        let out_w = (xend - xbegin).max(0) as usize;
        out.iter_mut().for_each(|v| *v = 0.0);

        let data_x0 = dw_x.max(xbegin);
        let data_y0 = dw_y.max(ybegin);
        let data_x1 = (dw_x + dw_w as i32).min(xend);
        let data_y1 = (dw_y + dw_h as i32).min(yend);
        if data_x1 <= data_x0 || data_y1 <= data_y0 {
            return Ok(());
        }

        let px0 = (data_x0 - dw_x) as u32;
        let py0 = (data_y0 - dw_y) as u32;
        let px1 = (data_x1 - dw_x) as u32;
        let py1 = (data_y1 - dw_y) as u32;

        let tx0 = px0 / tile_w;
        let tx1 = (px1 - 1) / tile_w;
        let ty0 = py0 / tile_h;
        let ty1 = (py1 - 1) / tile_h;

        for ty in ty0..=ty1 {
            for tx in tx0..=tx1 {
                let tile_x = tx * tile_w;
                let tile_y = ty * tile_h;
                let id = TileId::new(file, subimage, miplevel, tile_x, tile_y, 0, chbegin as u16, chend as u16, 0);
                let rec = self.find_tile(id)?;
                if !rec.is_valid() {
                    continue;
                }
                let Some(pixels) = rec.pixels() else { continue };
                let samples = crate::codec::read_f32_samples(pixels);

                let ov_x0 = tile_x.max(px0);
                let ov_y0 = tile_y.max(py0);
                let ov_x1 = (tile_x + tile_w).min(px1);
                let ov_y1 = (tile_y + tile_h).min(py1);
                for gy in ov_y0..ov_y1 {
                    for gx in ov_x0..ov_x1 {
                        let local_x = (gx - tile_x) as usize;
                        let local_y = (gy - tile_y) as usize;
                        let src = (local_y * tile_w as usize + local_x) * nch;
                        let out_x = (gx as i32 + dw_x - xbegin) as usize;
                        let out_y = (gy as i32 + dw_y - ybegin) as usize;
                        let dst = (out_y * out_w + out_x) * nch;
                        for c in 0..nch {
                            if dst + c < out.len() {
                                out[dst + c] = samples.get(src + c).copied().unwrap_or(0.0);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    // ---- invalidation ---------------------------------------------------

    /// Tears down `file`'s spec/handle/tiles. If `force` is false, only
    /// acts when the on-disk file changed (or autotile/automip settings did).
    /// Returns whether anything was actually invalidated.
    pub fn invalidate(&self, file: FileIndex, force: bool) -> bool {
        let config = self.config_snapshot();
        let changed = self.registry.invalidate(file, force, &config);
        if changed {
            self.tiles.erase_file(file);
            self.invalidation_epoch.fetch_add(1, Ordering::Release);
        }
        changed
    }

    /// Invalidates every known file; returns how many were actually touched.
    pub fn invalidate_all(&self, force: bool) -> usize {
        let config = self.config_snapshot();
        let touched = self.registry.invalidate_all(force, &config);
        if !touched.is_empty() {
            self.tiles.clear();
            self.invalidation_epoch.fetch_add(1, Ordering::Release);
        }
        touched.len()
    }

    /// Closes `file`'s open codec handle, freeing the OS resource, without
    /// touching its cached spec or tiles; the next read transparently
    /// reopens it. Narrower than [`CacheCoordinator::invalidate`], which
    /// also drops the spec and evicts the file's resident tiles.
    pub fn close(&self, file: FileIndex) {
        let record = self.registry.get(file);
        self.registry.close(&record);
    }

    /// Closes every currently open codec handle; cached specs and tiles
    /// are untouched.
    pub fn close_all(&self) {
        for i in 0..self.registry.len() {
            self.close(FileIndex::new(i));
        }
    }

    // ---- configuration --------------------------------------------------

    /// Sets a named configuration attribute. Unknown names are ignored
    /// (mirrors OIIO's tolerant `attribute()` surface).
    pub fn attribute(&self, name: &str, value: AttrValue) {
        let mut config = self.config.write().unwrap();
        match name {
            "max_open_files" => {
                if let Some(v) = value.as_int() {
                    config.max_open_files = v.max(1) as usize;
                }
            }
            "max_memory_MB" => {
                if let Some(v) = value.as_float() {
                    config.max_memory_bytes = (v * 1024.0 * 1024.0) as usize;
                    self.tiles.set_max_bytes(config.max_memory_bytes);
                }
            }
            "autotile" => {
                if let Some(v) = value.as_int() {
                    config.autotile = v.max(0) as u32;
                }
            }
            "autoscanline" => {
                if let Some(v) = value.as_int() {
                    config.autoscanline = v != 0;
                }
            }
            "automip" => {
                if let Some(v) = value.as_int() {
                    config.automip = v != 0;
                }
            }
            "forcefloat" => {
                if let Some(v) = value.as_int() {
                    config.forcefloat = v != 0;
                }
            }
            "accept_untiled" => {
                if let Some(v) = value.as_int() {
                    config.accept_untiled = v != 0;
                }
            }
            "accept_unmipped" => {
                if let Some(v) = value.as_int() {
                    config.accept_unmipped = v != 0;
                }
            }
            "deduplicate" => {
                if let Some(v) = value.as_int() {
                    config.deduplicate = v != 0;
                }
            }
            "failure_retries" => {
                if let Some(v) = value.as_int() {
                    config.failure_retries = v.max(0) as u32;
                }
            }
            "max_mip_res" => {
                if let Some(v) = value.as_int() {
                    config.max_mip_res = v.max(0) as u32;
                }
            }
            "searchpath" => {
                if let Some(v) = value.as_str() {
                    config.searchpath = v.to_string();
                }
            }
            "trust_file_extensions" => {
                if let Some(v) = value.as_int() {
                    config.trust_file_extensions = v != 0;
                }
            }
            "max_open_files_strict" => {
                if let Some(v) = value.as_int() {
                    config.max_open_files_strict = v != 0;
                }
            }
            "substitute_image" => {
                config.substitute_image = value.as_str().map(|s| s.to_string());
            }
            "latlong_up" => {
                if let Some(v) = value.as_str() {
                    config.latlong_up = if v.eq_ignore_ascii_case("z") { LatLongUp::Z } else { LatLongUp::Y };
                }
            }
            "max_errors_per_file" => {
                if let Some(v) = value.as_int() {
                    config.max_errors_per_file = v.max(0) as u32;
                }
            }
            _ => {}
        }
    }

    /// Reads a named configuration attribute back.
    pub fn getattribute(&self, name: &str) -> Option<AttrValue> {
        let config = self.config.read().unwrap();
        match name {
            "max_open_files" => Some(AttrValue::Int(config.max_open_files as i64)),
            "max_memory_MB" => Some(AttrValue::Float(config.max_memory_bytes as f64 / (1024.0 * 1024.0))),
            "autotile" => Some(AttrValue::Int(config.autotile as i64)),
            "autoscanline" => Some(AttrValue::Int(i64::from(config.autoscanline))),
            "automip" => Some(AttrValue::Int(i64::from(config.automip))),
            "forcefloat" => Some(AttrValue::Int(i64::from(config.forcefloat))),
            "accept_untiled" => Some(AttrValue::Int(i64::from(config.accept_untiled))),
            "accept_unmipped" => Some(AttrValue::Int(i64::from(config.accept_unmipped))),
            "deduplicate" => Some(AttrValue::Int(i64::from(config.deduplicate))),
            "failure_retries" => Some(AttrValue::Int(config.failure_retries as i64)),
            "max_mip_res" => Some(AttrValue::Int(config.max_mip_res as i64)),
            "searchpath" => Some(AttrValue::String(config.searchpath.clone())),
            "trust_file_extensions" => Some(AttrValue::Int(i64::from(config.trust_file_extensions))),
            "max_open_files_strict" => Some(AttrValue::Int(i64::from(config.max_open_files_strict))),
            "substitute_image" => config.substitute_image.clone().map(AttrValue::String),
            "latlong_up" => Some(AttrValue::String(if config.latlong_up.is_y() { "y".into() } else { "z".into() })),
            "max_errors_per_file" => Some(AttrValue::Int(config.max_errors_per_file as i64)),
            _ => None,
        }
    }

    /// Renders the shared statistics report; see [`CacheStatistics::getstats`].
    ///
    /// At `level >= 1`, appends a per-file breakdown (bytes read, then I/O
    /// time) for every file that has actually been read from, each sorted
    /// independently, heaviest first.
    pub fn getstats(&self, level: u32) -> String {
        let mut report = self.stats.getstats(level);
        if level >= 1 {
            let per_file = self.per_file_report();
            if !per_file.is_empty() {
                report.push('\n');
                report.push_str(&per_file);
            }
        }
        report
    }

    fn per_file_report(&self) -> String {
        let mut rows: Vec<(String, u64, u64)> = (0..self.registry.len())
            .map(FileIndex::new)
            .map(|idx| self.registry.get(idx))
            .filter(|r| r.bytes_read.load(Ordering::Relaxed) > 0)
            .map(|r| {
                (
                    r.filename.clone(),
                    r.bytes_read.load(Ordering::Relaxed),
                    r.io_micros.load(Ordering::Relaxed),
                )
            })
            .collect();
        if rows.is_empty() {
            return String::new();
        }

        rows.sort_by(|a, b| b.1.cmp(&a.1));
        let mut out = String::from("Per-file, by bytes read:\n");
        for (name, bytes, _) in &rows {
            out.push_str(&format!("  {bytes:>14} bytes  {name}\n"));
        }

        rows.sort_by(|a, b| b.2.cmp(&a.2));
        out.push_str("Per-file, by I/O time:\n");
        for (name, _, micros) in &rows {
            out.push_str(&format!("  {:>10.3}s  {name}\n", *micros as f64 / 1_000_000.0));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ImageInput, ImageInputCreator};
    use std::collections::HashMap as StdHashMap;
    use vfx_core::format::DataFormat;

    struct GradientInput {
        spec: ImageSpec,
    }

    impl GradientInput {
        fn new(width: u32, height: u32, tile: u32) -> Self {
            Self {
                spec: ImageSpec {
                    x: 0,
                    y: 0,
                    z: 0,
                    width,
                    height,
                    depth: 1,
                    full_x: 0,
                    full_y: 0,
                    full_z: 0,
                    full_width: width,
                    full_height: height,
                    full_depth: 1,
                    tile_width: tile,
                    tile_height: tile,
                    tile_depth: 1,
                    nchannels: 1,
                    format: DataFormat::F32,
                    attributes: StdHashMap::new(),
                },
            }
        }
    }

    impl ImageInput for GradientInput {
        fn format_name(&self) -> &str {
            "gradient"
        }
        fn seek_subimage(&self, subimage: u32, miplevel: u32) -> bool {
            subimage == 0 && miplevel == 0
        }
        fn spec(&self, subimage: u32, miplevel: u32) -> Option<ImageSpec> {
            (subimage == 0 && miplevel == 0).then(|| self.spec.clone())
        }
        fn read_tile(
            &self,
            _subimage: u32,
            _miplevel: u32,
            x: u32,
            y: u32,
            _z: u32,
            _chbegin: u32,
            _chend: u32,
            out: &mut [u8],
        ) -> CacheResult<()> {
            let tw = self.spec.tile_width;
            let th = self.spec.tile_height;
            for ty in 0..th {
                for tx in 0..tw {
                    let gx = (x + tx).min(self.spec.width - 1);
                    let gy = (y + ty).min(self.spec.height - 1);
                    let v = gx as f32 / self.spec.width as f32;
                    let dst = ((ty * tw + tx) as usize) * 4;
                    if dst + 4 <= out.len() {
                        out[dst..dst + 4].copy_from_slice(&v.to_ne_bytes());
                    }
                    let _ = gy;
                }
            }
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

    struct GradientCreator;
    impl ImageInputCreator for GradientCreator {
        fn open(&self, _filename: &str) -> CacheResult<Arc<dyn ImageInput>> {
            Ok(Arc::new(GradientInput::new(32, 32, 8)))
        }
    }

    fn coordinator() -> CacheCoordinator {
        CacheCoordinator::with_creator_and_colorpipe(
            CacheConfig::default(),
            Arc::new(GradientCreator),
            Arc::new(IdentityColorPipeline),
        )
    }

    #[test]
    fn get_pixels_reads_gradient_values() {
        let coord = coordinator();
        let file = coord.find_file("gradient.exr").unwrap();
        let mut out = vec![0.0f32; 4];
        coord.get_pixels(file, 0, 0, 0, 4, 0, 1, 0, 1, &mut out).unwrap();
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[3] - 3.0 / 32.0).abs() < 1e-3);
    }

    #[test]
    fn get_pixels_zero_fills_outside_data_window() {
        let coord = coordinator();
        let file = coord.find_file("gradient.exr").unwrap();
        let mut out = vec![9.0f32; 4];
        coord.get_pixels(file, 0, 0, -2, 2, 0, 1, 0, 1, &mut out).unwrap();
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 0.0);
    }

    #[test]
    fn concurrent_find_tile_returns_identical_record() {
        let coord = Arc::new(coordinator());
        let file = coord.find_file("gradient.exr").unwrap();
        let id = TileId::new(file, 0, 0, 0, 0, 0, 0, 1, 0);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let coord = coord.clone();
                std::thread::spawn(move || coord.find_tile(id).unwrap())
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for r in &results[1..] {
            assert!(Arc::ptr_eq(&results[0], r));
        }
    }

    #[test]
    fn attribute_roundtrips_through_getattribute() {
        let coord = coordinator();
        coord.attribute("autotile", AttrValue::Int(64));
        assert_eq!(coord.getattribute("autotile"), Some(AttrValue::Int(64)));
    }

    #[test]
    fn invalidate_all_clears_resident_tiles() {
        let coord = coordinator();
        let file = coord.find_file("gradient.exr").unwrap();
        let id = TileId::new(file, 0, 0, 0, 0, 0, 0, 1, 0);
        coord.find_tile(id).unwrap();
        assert!(!coord.tiles.is_empty());
        coord.invalidate_all(true);
        assert!(coord.tiles.is_empty());
    }
}
