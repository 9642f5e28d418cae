//! End-to-end scenario tests exercising the coordinator against small
//! synthetic codecs, covering the hot read path, concurrent tile sharing,
//! auto-mip synthesis, duplicate-file coalescing, and eviction under a
//! tight memory budget.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vfx_cache::{
    CacheConfig, CacheCoordinator, CacheResult, IdentityColorPipeline, ImageInput, ImageInputCreator, ImageSpec,
};
use vfx_core::format::DataFormat;
use vfx_core::spec::AttrValue;

fn flat_spec(width: u32, height: u32, tile: u32, nchannels: u32, attributes: HashMap<String, AttrValue>) -> ImageSpec {
    ImageSpec {
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
        nchannels,
        format: DataFormat::F32,
        attributes,
    }
}

/// A 256x256, single-channel, natively-tiled (64x64) image holding the
/// gradient `p(x, y) = (y*256 + x) mod 65536`.
struct GradientInput {
    spec: ImageSpec,
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
                let gx = x + tx;
                let gy = y + ty;
                let value = ((gy * 256 + gx) % 65536) as f32;
                let dst = ((ty * tw + tx) as usize) * 4;
                out[dst..dst + 4].copy_from_slice(&value.to_ne_bytes());
            }
        }
        Ok(())
    }
    fn read_scanlines(&self, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: &mut [u8]) -> CacheResult<()> {
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
        Ok(Arc::new(GradientInput { spec: flat_spec(256, 256, 64, 1, HashMap::new()) }))
    }
}

#[test]
fn s1_hot_path_exact_gradient_and_tile_count() {
    let coord = CacheCoordinator::with_creator_and_colorpipe(
        CacheConfig::default(),
        Arc::new(GradientCreator),
        Arc::new(IdentityColorPipeline),
    );
    let file = coord.find_file("gradient.exr").unwrap();

    let mut out = vec![0.0f32; 256 * 256];
    coord.get_pixels(file, 0, 0, 0, 256, 0, 256, 0, 1, &mut out).unwrap();

    for y in 0..256u32 {
        for x in 0..256u32 {
            let expected = ((y * 256 + x) % 65536) as f32;
            assert_eq!(out[(y * 256 + x) as usize], expected, "mismatch at ({x}, {y})");
        }
    }

    assert_eq!(coord.stats().tiles_created.load(Ordering::Relaxed), 16);
    assert_eq!(coord.stats().open_files_current.load(Ordering::Relaxed), 1);
}

/// A codec that counts `read_tile` invocations, for the "exactly one reader"
/// protocol test.
struct CountingInput {
    spec: ImageSpec,
    reads: Arc<AtomicUsize>,
}

impl ImageInput for CountingInput {
    fn format_name(&self) -> &str {
        "counting"
    }
    fn seek_subimage(&self, subimage: u32, miplevel: u32) -> bool {
        subimage == 0 && miplevel == 0
    }
    fn spec(&self, subimage: u32, miplevel: u32) -> Option<ImageSpec> {
        (subimage == 0 && miplevel == 0).then(|| self.spec.clone())
    }
    fn read_tile(&self, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, out: &mut [u8]) -> CacheResult<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(5));
        out.iter_mut().for_each(|b| *b = 0);
        Ok(())
    }
    fn read_scanlines(&self, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: &mut [u8]) -> CacheResult<()> {
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

#[test]
fn s2_concurrent_find_tile_reads_exactly_once() {
    let reads = Arc::new(AtomicUsize::new(0));
    struct CountingCreator {
        reads: Arc<AtomicUsize>,
    }
    impl ImageInputCreator for CountingCreator {
        fn open(&self, _filename: &str) -> CacheResult<Arc<dyn ImageInput>> {
            Ok(Arc::new(CountingInput { spec: flat_spec(64, 64, 32, 1, HashMap::new()), reads: self.reads.clone() }))
        }
    }

    let coord = Arc::new(CacheCoordinator::with_creator_and_colorpipe(
        CacheConfig::default(),
        Arc::new(CountingCreator { reads: reads.clone() }),
        Arc::new(IdentityColorPipeline),
    ));
    let file = coord.find_file("shared.exr").unwrap();

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let coord = coord.clone();
            std::thread::spawn(move || {
                let mut out = vec![0.0f32; 32 * 32];
                coord.get_pixels(file, 0, 0, 0, 32, 0, 32, 0, 1, &mut out).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

/// A single-level 16x16 image filled with a constant color, for auto-mip
/// synthesis.
struct ConstInput {
    spec: ImageSpec,
    value: f32,
}

impl ImageInput for ConstInput {
    fn format_name(&self) -> &str {
        "const"
    }
    fn seek_subimage(&self, subimage: u32, miplevel: u32) -> bool {
        subimage == 0 && miplevel == 0
    }
    fn spec(&self, subimage: u32, miplevel: u32) -> Option<ImageSpec> {
        (subimage == 0 && miplevel == 0).then(|| self.spec.clone())
    }
    fn read_tile(&self, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, out: &mut [u8]) -> CacheResult<()> {
        for chunk in out.chunks_exact_mut(4) {
            chunk.copy_from_slice(&self.value.to_ne_bytes());
        }
        Ok(())
    }
    fn read_scanlines(&self, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: &mut [u8]) -> CacheResult<()> {
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
    value: f32,
}
impl ImageInputCreator for ConstCreator {
    fn open(&self, _filename: &str) -> CacheResult<Arc<dyn ImageInput>> {
        Ok(Arc::new(ConstInput { spec: flat_spec(16, 16, 16, 1, HashMap::new()), value: self.value }))
    }
}

#[test]
fn s3_automip_synthesizes_constant_color_down_to_one_pixel() {
    let mut config = CacheConfig::default();
    config.automip = true;
    config.accept_unmipped = true;
    let coord =
        CacheCoordinator::with_creator_and_colorpipe(config, Arc::new(ConstCreator { value: 0.5 }), Arc::new(IdentityColorPipeline));
    let file = coord.find_file("swatch.exr").unwrap();

    let mut out = vec![0.0f32; 1];
    coord.get_pixels(file, 0, 4, 0, 1, 0, 1, 0, 1, &mut out).unwrap();
    assert_eq!(out[0], 0.5);
}

#[test]
fn s5_duplicate_fingerprints_coalesce_and_share_tiles() {
    struct DupCreator;
    impl ImageInputCreator for DupCreator {
        fn open(&self, _filename: &str) -> CacheResult<Arc<dyn ImageInput>> {
            let mut attrs = HashMap::new();
            attrs.insert("oiio:fingerprint".to_string(), AttrValue::String("same-hash".to_string()));
            Ok(Arc::new(ConstInput { spec: flat_spec(16, 16, 8, 4, attrs), value: 1.0 }))
        }
    }

    let coord =
        CacheCoordinator::with_creator_and_colorpipe(CacheConfig::default(), Arc::new(DupCreator), Arc::new(IdentityColorPipeline));
    let a = coord.find_file("a.exr").unwrap();
    let b = coord.find_file("b.exr").unwrap();
    assert_eq!(a, b, "b.exr should have coalesced onto a.exr's canonical index");

    let mut out = vec![0.0f32; 8 * 8 * 4];
    coord.get_pixels(b, 0, 0, 0, 8, 0, 8, 0, 4, &mut out).unwrap();
    assert!(out.iter().all(|&v| v == 1.0));
}

#[test]
fn s6_memory_bound_respected_under_pressure() {
    const TILE: u32 = 64;
    const N_TILES: u32 = 1024; // 1024 * 64*64*4 bytes = 16 MiB of unique tiles
    const MAX_BYTES: usize = 4 * 1024 * 1024;

    struct WideInput {
        spec: ImageSpec,
    }
    impl ImageInput for WideInput {
        fn format_name(&self) -> &str {
            "wide"
        }
        fn seek_subimage(&self, subimage: u32, miplevel: u32) -> bool {
            subimage == 0 && miplevel == 0
        }
        fn spec(&self, subimage: u32, miplevel: u32) -> Option<ImageSpec> {
            (subimage == 0 && miplevel == 0).then(|| self.spec.clone())
        }
        fn read_tile(&self, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, out: &mut [u8]) -> CacheResult<()> {
            out.iter_mut().for_each(|b| *b = 0);
            Ok(())
        }
        fn read_scanlines(&self, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: &mut [u8]) -> CacheResult<()> {
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
    struct WideCreator;
    impl ImageInputCreator for WideCreator {
        fn open(&self, _filename: &str) -> CacheResult<Arc<dyn ImageInput>> {
            Ok(Arc::new(WideInput { spec: flat_spec(TILE * N_TILES, TILE, TILE, 1, HashMap::new()) }))
        }
    }

    let mut config = CacheConfig::default();
    config.max_memory_bytes = MAX_BYTES;
    let coord = CacheCoordinator::with_creator_and_colorpipe(config, Arc::new(WideCreator), Arc::new(IdentityColorPipeline));
    let file = coord.find_file("wide.exr").unwrap();

    for i in 0..N_TILES {
        let mut out = vec![0.0f32; (TILE * TILE) as usize];
        coord.get_pixels(file, 0, 0, (i * TILE) as i32, ((i + 1) * TILE) as i32, 0, TILE as i32, 0, 1, &mut out).unwrap();
        if (i + 1) % 100 == 0 {
            assert!(
                coord.stats().bytes_used() <= (MAX_BYTES as f64 * 1.1) as usize,
                "bytes_used exceeded budget after {} tiles",
                i + 1
            );
        }
    }
}

/// An untiled (scanline-stored) 128x32 gradient, read via `autotile`.
struct UntiledGradientInput {
    spec: ImageSpec,
    scanline_reads: Arc<AtomicUsize>,
}

impl ImageInput for UntiledGradientInput {
    fn format_name(&self) -> &str {
        "untiled-gradient"
    }
    fn seek_subimage(&self, subimage: u32, miplevel: u32) -> bool {
        subimage == 0 && miplevel == 0
    }
    fn spec(&self, subimage: u32, miplevel: u32) -> Option<ImageSpec> {
        (subimage == 0 && miplevel == 0).then(|| self.spec.clone())
    }
    fn read_tile(&self, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: u32, _: &mut [u8]) -> CacheResult<()> {
        panic!("autotiled-untiled subimages must be read via read_scanlines, not read_tile");
    }
    fn read_scanlines(
        &self,
        _subimage: u32,
        _miplevel: u32,
        ybegin: u32,
        yend: u32,
        _z: u32,
        _chbegin: u32,
        _chend: u32,
        out: &mut [u8],
    ) -> CacheResult<()> {
        self.scanline_reads.fetch_add(1, Ordering::SeqCst);
        let w = self.spec.width;
        for (row, y) in (ybegin..yend).enumerate() {
            for x in 0..w {
                let value = (y * w + x) as f32;
                let dst = (row * w as usize + x as usize) * 4;
                out[dst..dst + 4].copy_from_slice(&value.to_ne_bytes());
            }
        }
        Ok(())
    }
    fn read_image(&self, _: u32, _: u32, _: u32, _: u32, _: &mut [u8]) -> CacheResult<()> {
        panic!("autotiled subimages must not fall back to read_image");
    }
    fn close(&self) {}
    fn geterror(&self) -> Option<String> {
        None
    }
}

#[test]
fn autotiled_row_read_is_amortized_across_neighbor_tiles() {
    let scanline_reads = Arc::new(AtomicUsize::new(0));
    struct UntiledCreator {
        scanline_reads: Arc<AtomicUsize>,
    }
    impl ImageInputCreator for UntiledCreator {
        fn open(&self, _filename: &str) -> CacheResult<Arc<dyn ImageInput>> {
            // width=128, height=32, tile_width/height=0 marks this untiled.
            Ok(Arc::new(UntiledGradientInput {
                spec: flat_spec(128, 32, 0, 1, HashMap::new()),
                scanline_reads: self.scanline_reads.clone(),
            }))
        }
    }

    let mut config = CacheConfig::default();
    config.autotile = 32;
    let coord = CacheCoordinator::with_creator_and_colorpipe(
        config,
        Arc::new(UntiledCreator { scanline_reads: scanline_reads.clone() }),
        Arc::new(IdentityColorPipeline),
    );
    let file = coord.find_file("untiled.exr").unwrap();

    // Reading only the leftmost tile should populate the whole row: one
    // read_scanlines call, but 128/32 = 4 resident tiles afterward.
    let mut out = vec![0.0f32; 32 * 32];
    coord.get_pixels(file, 0, 0, 0, 32, 0, 32, 0, 1, &mut out).unwrap();
    assert_eq!(scanline_reads.load(Ordering::SeqCst), 1);
    assert_eq!(coord.stats().tiles_created.load(Ordering::Relaxed), 4);

    for (i, v) in out.iter().enumerate() {
        let x = (i % 32) as u32;
        let y = (i / 32) as u32;
        assert_eq!(*v, (y * 128 + x) as f32);
    }

    // A read of a neighboring tile in the same row must not trigger another
    // scanline read: it was already populated by the first call.
    let mut out2 = vec![0.0f32; 32 * 32];
    coord.get_pixels(file, 0, 0, 64, 96, 0, 32, 0, 1, &mut out2).unwrap();
    assert_eq!(scanline_reads.load(Ordering::SeqCst), 1);
    for (i, v) in out2.iter().enumerate() {
        let x = 64 + (i % 32) as u32;
        let y = (i / 32) as u32;
        assert_eq!(*v, (y * 128 + x) as f32);
    }
}

#[test]
fn zero_sized_rect_is_ok_and_allocates_nothing() {
    let coord = CacheCoordinator::with_creator_and_colorpipe(
        CacheConfig::default(),
        Arc::new(GradientCreator),
        Arc::new(IdentityColorPipeline),
    );
    let file = coord.find_file("gradient.exr").unwrap();
    let before = coord.stats().tiles_created.load(Ordering::Relaxed);

    let mut out: Vec<f32> = Vec::new();
    coord.get_pixels(file, 0, 0, 10, 10, 10, 10, 0, 1, &mut out).unwrap();

    assert_eq!(coord.stats().tiles_created.load(Ordering::Relaxed), before);
}

#[test]
fn add_tile_round_trips_byte_for_byte() {
    let coord = CacheCoordinator::with_creator_and_colorpipe(
        CacheConfig::default(),
        Arc::new(GradientCreator),
        Arc::new(IdentityColorPipeline),
    );
    let file = coord.find_file("gradient.exr").unwrap();
    let id = vfx_cache::TileId::new(file, 0, 0, 0, 0, 0, 0, 1, 0);

    let buf: Arc<[u8]> = Arc::from(vec![1u8, 2, 3, 4].into_boxed_slice());
    coord.add_tile(file, 0, 0, 0, 0, 0, 0, 1, buf.clone());

    let found = coord.find_tile(id).unwrap();
    assert_eq!(found.pixels().unwrap().as_ref(), buf.as_ref());
}

#[test]
fn invalidate_is_idempotent() {
    let coord = CacheCoordinator::with_creator_and_colorpipe(
        CacheConfig::default(),
        Arc::new(GradientCreator),
        Arc::new(IdentityColorPipeline),
    );
    let file = coord.find_file("gradient.exr").unwrap();
    let mut out = vec![0.0f32; 64 * 64];
    coord.get_pixels(file, 0, 0, 0, 64, 0, 64, 0, 1, &mut out).unwrap();

    let first = coord.invalidate(file, true);
    let second = coord.invalidate(file, true);
    assert!(first);
    assert!(second, "force=true invalidates regardless of prior state");
}

#[test]
fn invalidate_all_clears_tiles_and_handles() {
    let coord = CacheCoordinator::with_creator_and_colorpipe(
        CacheConfig::default(),
        Arc::new(GradientCreator),
        Arc::new(IdentityColorPipeline),
    );
    let file = coord.find_file("gradient.exr").unwrap();
    let mut out = vec![0.0f32; 64 * 64];
    coord.get_pixels(file, 0, 0, 0, 64, 0, 64, 0, 1, &mut out).unwrap();
    assert!(coord.stats().tiles_current.load(Ordering::Relaxed) > 0);
    assert_eq!(coord.stats().open_files_current.load(Ordering::Relaxed), 1);

    coord.invalidate_all(true);
    assert_eq!(coord.stats().tiles_current.load(Ordering::Relaxed), 0);
    assert_eq!(coord.stats().open_files_current.load(Ordering::Relaxed), 0);
}

#[test]
fn color_transform_runs_once_and_is_cached() {
    struct CountingColorPipeline {
        calls: AtomicUsize,
    }
    impl vfx_cache::ColorPipeline for CountingColorPipeline {
        fn colorconvert(&self, buf: &mut [u8], _spec: &ImageSpec, _from: &str, _to: &str) -> CacheResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for chunk in buf.chunks_exact_mut(4) {
                let v = f32::from_ne_bytes(chunk.try_into().unwrap()) * 2.0;
                chunk.copy_from_slice(&v.to_ne_bytes());
            }
            Ok(())
        }
    }

    let pipeline = Arc::new(CountingColorPipeline { calls: AtomicUsize::new(0) });
    let coord = CacheCoordinator::with_creator_and_colorpipe(CacheConfig::default(), Arc::new(ConstCreator { value: 1.0 }), pipeline.clone());
    let file = coord.find_file("swatch.exr").unwrap();
    let id = vfx_cache::TileId::new(file, 0, 0, 0, 0, 0, 0, 1, 1);

    let first = coord.find_tile(id).unwrap();
    let second = coord.find_tile(id).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(pipeline.calls.load(Ordering::SeqCst), 1);
    let bytes = first.pixels().unwrap();
    let value = f32::from_ne_bytes(bytes[0..4].try_into().unwrap());
    assert_eq!(value, 2.0);
}
