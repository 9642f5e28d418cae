//! The codec capability consumed by the cache core.
//!
//! `vfx-cache` never depends on a concrete image format. It depends on an
//! [`ImageInput`] capability - open / seek_subimage / read_tile / read_scanlines
//! / read_image / close / geterror - the same shape as OpenImageIO's
//! `ImageInput`, generalized from [`vfx_io::traits::FormatReader`] and
//! [`vfx_io::registry::FormatRegistry`].
//!
//! The reference adapter, [`VfxIoInput`], is backed by `vfx_io::read`. Real
//! per-format tiled/scanline decoding is out of this crate's scope (per
//! spec.md's explicit Non-goals); `VfxIoInput` decodes the whole image once
//! and serves tiles/scanlines/sub-rects out of the decoded buffer, which is
//! exactly what `vfx_io`'s public surface exposes today (it has no
//! subimage/tile-level API of its own).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use vfx_core::format::DataFormat;
use vfx_core::spec::AttrValue;

use crate::error::{CacheError, CacheResult};

/// Header information for one subimage at one mip level.
///
/// A cache-local counterpart to [`vfx_core::ImageSpec`] that additionally
/// carries tile dimensions and full-resolution (display window) origin -
/// fields the codec capability must report but `vfx_core::ImageSpec`
/// doesn't need for in-memory image buffers.
#[derive(Debug, Clone)]
pub struct ImageSpec {
    /// Data window origin, x.
    pub x: i32,
    /// Data window origin, y.
    pub y: i32,
    /// Data window origin, z (0 for 2D images).
    pub z: i32,
    /// Data window width.
    pub width: u32,
    /// Data window height.
    pub height: u32,
    /// Data window depth (1 for 2D images).
    pub depth: u32,
    /// Display window origin, x.
    pub full_x: i32,
    /// Display window origin, y.
    pub full_y: i32,
    /// Display window origin, z.
    pub full_z: i32,
    /// Display window width.
    pub full_width: u32,
    /// Display window height.
    pub full_height: u32,
    /// Display window depth.
    pub full_depth: u32,
    /// Native tile width; 0 means untiled (stored as scanlines).
    pub tile_width: u32,
    /// Native tile height; 0 means untiled.
    pub tile_height: u32,
    /// Native tile depth; 1 for 2D images.
    pub tile_depth: u32,
    /// Number of channels.
    pub nchannels: u32,
    /// Per-channel pixel data type.
    pub format: DataFormat,
    /// Arbitrary metadata attributes (wrap modes, fingerprint, etc).
    pub attributes: HashMap<String, AttrValue>,
}

impl ImageSpec {
    /// Bytes occupied by one pixel of this spec's channel count and format.
    pub fn bytes_per_pixel(&self) -> usize {
        self.nchannels as usize * self.format.bytes_per_channel()
    }

    /// Whether this subimage is stored untiled (no native tile size).
    pub fn is_untiled(&self) -> bool {
        self.tile_width == 0 || self.tile_height == 0
    }

    /// Whether this subimage's largest dimension is `depth > 1`.
    pub fn is_volume(&self) -> bool {
        self.depth > 1 || self.full_depth > 1
    }

    /// Convenience accessor for a string-valued attribute.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(AttrValue::as_str)
    }

    /// Convenience accessor for an int-valued attribute.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.attributes.get(key).and_then(AttrValue::as_int)
    }
}

/// The abstract decoder capability `vfx-cache` consumes.
///
/// Implementations (TIFF, OpenEXR, PNG, procedural generators, test
/// doubles) satisfy this trait; the cache holds it as a trait object and
/// never depends on a concrete codec's own API surface.
pub trait ImageInput: Send + Sync {
    /// Human-readable format name, reported as file metadata.
    fn format_name(&self) -> &str;

    /// Repositions at `(subimage, miplevel)`. Returns `false` when out of
    /// range. Must be re-entrant after `open`.
    fn seek_subimage(&self, subimage: u32, miplevel: u32) -> bool;

    /// Reads the header for `(subimage, miplevel)`, if it exists.
    fn spec(&self, subimage: u32, miplevel: u32) -> Option<ImageSpec>;

    /// Reads exactly one tile into `out` (tightly packed, row-major).
    #[allow(clippy::too_many_arguments)]
    fn read_tile(
        &self,
        subimage: u32,
        miplevel: u32,
        x: u32,
        y: u32,
        z: u32,
        chbegin: u32,
        chend: u32,
        out: &mut [u8],
    ) -> CacheResult<()>;

    /// Reads `[ybegin, yend)` scanlines into `out`, used by the autotile path.
    #[allow(clippy::too_many_arguments)]
    fn read_scanlines(
        &self,
        subimage: u32,
        miplevel: u32,
        ybegin: u32,
        yend: u32,
        z: u32,
        chbegin: u32,
        chend: u32,
        out: &mut [u8],
    ) -> CacheResult<()>;

    /// Reads the entire subimage/mip into `out`, used by the untiled,
    /// non-autotile path.
    fn read_image(
        &self,
        subimage: u32,
        miplevel: u32,
        chbegin: u32,
        chend: u32,
        out: &mut [u8],
    ) -> CacheResult<()>;

    /// Optional thumbnail extraction.
    fn get_thumbnail(&self, _subimage: u32) -> Option<Vec<u8>> {
        None
    }

    /// Releases any underlying OS resources.
    fn close(&self);

    /// The last error recorded by this handle, if any.
    fn geterror(&self) -> Option<String>;
}

/// Constructs [`ImageInput`] handles for a filename.
///
/// Satisfied by the default `vfx_io`-backed adapter, or by a client-supplied
/// constructor for procedural/in-memory images (see `add_file`).
pub trait ImageInputCreator: Send + Sync {
    /// Opens `filename`, returning a fresh decoder handle.
    fn open(&self, filename: &str) -> CacheResult<Arc<dyn ImageInput>>;
}

/// Default [`ImageInputCreator`] backed by `vfx_io::read`.
#[derive(Debug, Default, Clone, Copy)]
pub struct VfxIoInputCreator;

impl ImageInputCreator for VfxIoInputCreator {
    fn open(&self, filename: &str) -> CacheResult<Arc<dyn ImageInput>> {
        Ok(Arc::new(VfxIoInput::open(filename)?))
    }
}

/// [`ImageInput`] adapter over `vfx_io::read`.
///
/// `vfx_io`'s public surface decodes a whole single-subimage image at once;
/// this adapter decodes on open and serves `read_tile`/`read_scanlines`/
/// `read_image` by slicing the decoded buffer, converted to `f32` once.
pub struct VfxIoInput {
    filename: String,
    format_name: &'static str,
    spec0: ImageSpec,
    pixels: Vec<f32>, // row-major, width*height*nchannels, f32
    error: Mutex<Option<String>>,
    closed: OnceLock<()>,
}

impl VfxIoInput {
    /// Opens `filename` and decodes it immediately.
    pub fn open(filename: &str) -> CacheResult<Self> {
        let image =
            vfx_io::read(filename).map_err(|e| CacheError::OpenFailed(format!("{filename}: {e}")))?;
        let format_name = match image.format {
            vfx_io::PixelFormat::U8 => "u8",
            vfx_io::PixelFormat::U16 => "u16",
            vfx_io::PixelFormat::F16 => "f16",
            vfx_io::PixelFormat::F32 => "f32",
        };
        let data_format = match image.format {
            vfx_io::PixelFormat::U8 => DataFormat::U8,
            vfx_io::PixelFormat::U16 => DataFormat::U16,
            vfx_io::PixelFormat::F16 => DataFormat::F16,
            vfx_io::PixelFormat::F32 => DataFormat::F32,
        };
        let pixels = to_f32(&image.data);

        let mut attributes = HashMap::new();
        if let Some(cs) = &image.metadata.colorspace {
            attributes.insert("colorspace".to_string(), AttrValue::String(cs.clone()));
        }

        let spec0 = ImageSpec {
            x: 0,
            y: 0,
            z: 0,
            width: image.width,
            height: image.height,
            depth: 1,
            full_x: 0,
            full_y: 0,
            full_z: 0,
            full_width: image.width,
            full_height: image.height,
            full_depth: 1,
            tile_width: 0,
            tile_height: 0,
            tile_depth: 1,
            nchannels: image.channels,
            format: data_format,
            attributes,
        };

        Ok(Self {
            filename: filename.to_string(),
            format_name,
            spec0,
            pixels,
            error: Mutex::new(None),
            closed: OnceLock::new(),
        })
    }

    fn set_error(&self, msg: impl Into<String>) {
        *self.error.lock().unwrap() = Some(msg.into());
    }
}

fn to_f32(data: &vfx_io::PixelData) -> Vec<f32> {
    match data {
        vfx_io::PixelData::U8(v) => v.iter().map(|&b| b as f32 / 255.0).collect(),
        vfx_io::PixelData::U16(v) => v.iter().map(|&b| b as f32 / 65535.0).collect(),
        vfx_io::PixelData::F32(v) => v.clone(),
    }
}

impl ImageInput for VfxIoInput {
    fn format_name(&self) -> &str {
        self.format_name
    }

    fn seek_subimage(&self, subimage: u32, miplevel: u32) -> bool {
        subimage == 0 && miplevel == 0
    }

    fn spec(&self, subimage: u32, miplevel: u32) -> Option<ImageSpec> {
        if subimage == 0 && miplevel == 0 {
            Some(self.spec0.clone())
        } else {
            None
        }
    }

    fn read_tile(
        &self,
        subimage: u32,
        miplevel: u32,
        x: u32,
        y: u32,
        _z: u32,
        chbegin: u32,
        chend: u32,
        out: &mut [u8],
    ) -> CacheResult<()> {
        if subimage != 0 || miplevel != 0 {
            self.set_error("no such subimage/miplevel");
            return Err(CacheError::UnknownSubimage {
                file: self.filename.clone(),
                subimage,
            });
        }
        let nch = (chend - chbegin) as usize;
        let w = self.spec0.width;
        let h = self.spec0.height;
        let n_samples = out.len() / 4;
        let tile_w = (n_samples / nch.max(1)) as u32;
        let mut writer = F32Writer::new(out);
        let mut yy = y;
        while writer.written() < n_samples {
            if yy >= h {
                break;
            }
            let mut xx = x;
            for _ in 0..tile_w {
                if xx < w {
                    let src = ((yy * w + xx) as usize) * self.spec0.nchannels as usize;
                    for c in 0..nch {
                        let ch = chbegin as usize + c;
                        writer.push(self.pixels.get(src + ch).copied().unwrap_or(0.0));
                    }
                } else {
                    for _ in 0..nch {
                        writer.push(0.0);
                    }
                }
                xx += 1;
            }
            yy += 1;
        }
        Ok(())
    }

    fn read_scanlines(
        &self,
        subimage: u32,
        miplevel: u32,
        ybegin: u32,
        yend: u32,
        _z: u32,
        chbegin: u32,
        chend: u32,
        out: &mut [u8],
    ) -> CacheResult<()> {
        if subimage != 0 || miplevel != 0 {
            return Err(CacheError::UnknownSubimage {
                file: self.filename.clone(),
                subimage,
            });
        }
        let nch = (chend - chbegin) as usize;
        let w = self.spec0.width;
        let mut writer = F32Writer::new(out);
        for yy in ybegin..yend {
            for xx in 0..w {
                let src = ((yy * w + xx) as usize) * self.spec0.nchannels as usize;
                for c in 0..nch {
                    let ch = chbegin as usize + c;
                    writer.push(self.pixels.get(src + ch).copied().unwrap_or(0.0));
                }
            }
        }
        Ok(())
    }

    fn read_image(
        &self,
        subimage: u32,
        miplevel: u32,
        chbegin: u32,
        chend: u32,
        out: &mut [u8],
    ) -> CacheResult<()> {
        self.read_scanlines(subimage, miplevel, 0, self.spec0.height, 0, chbegin, chend, out)
    }

    fn close(&self) {
        let _ = self.closed.set(());
    }

    fn geterror(&self) -> Option<String> {
        self.error.lock().unwrap().clone()
    }
}

/// Writes `f32` samples into a `&mut [u8]` buffer in native-endian order.
///
/// `VfxIoInput` always decodes to `f32`; this writer lets it fill the
/// byte buffers the cache allocates without reaching for `unsafe`
/// reinterpretation.
struct F32Writer<'a> {
    out: &'a mut [u8],
    pos: usize,
}

impl<'a> F32Writer<'a> {
    fn new(out: &'a mut [u8]) -> Self {
        Self { out, pos: 0 }
    }

    fn written(&self) -> usize {
        self.pos / 4
    }

    fn push(&mut self, v: f32) {
        if self.pos + 4 > self.out.len() {
            return;
        }
        self.out[self.pos..self.pos + 4].copy_from_slice(&v.to_ne_bytes());
        self.pos += 4;
    }
}

/// Reads `f32` samples back out of a byte buffer written by [`F32Writer`]
/// (or any other native-endian `f32` packing).
pub(crate) fn read_f32_samples(buf: &[u8]) -> Vec<f32> {
    buf.chunks_exact(4)
        .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_bytes_per_pixel() {
        let spec = ImageSpec {
            x: 0,
            y: 0,
            z: 0,
            width: 4,
            height: 4,
            depth: 1,
            full_x: 0,
            full_y: 0,
            full_z: 0,
            full_width: 4,
            full_height: 4,
            full_depth: 1,
            tile_width: 0,
            tile_height: 0,
            tile_depth: 1,
            nchannels: 4,
            format: DataFormat::F32,
            attributes: HashMap::new(),
        };
        assert_eq!(spec.bytes_per_pixel(), 16);
        assert!(spec.is_untiled());
        assert!(!spec.is_volume());
    }
}
