//! The color-pipeline capability consumed by the cache core.
//!
//! Used in-place on a decoded tile buffer when its [`crate::id::TileId`]'s
//! `color_transform` id is non-zero. A real implementation lives outside
//! this crate (e.g. backed by `vfx_ocio::ProcessorCache`'s `get_or_create`,
//! which is the pattern [`ColorPipeline::colorconvert`] is modeled on); this
//! crate only defines the seam and ships a no-op identity implementation.

use crate::codec::ImageSpec;
use crate::error::CacheResult;

/// Converts a decoded tile's pixels from one named color space to another.
pub trait ColorPipeline: Send + Sync {
    /// Transforms `buf` in place, interpreting it per `spec`.
    fn colorconvert(&self, buf: &mut [u8], spec: &ImageSpec, from: &str, to: &str) -> CacheResult<()>;
}

/// A [`ColorPipeline`] that performs no conversion.
///
/// Used when no color transform is configured (`color_transform == 0` on
/// every [`crate::id::TileId`]), so the coordinator never needs an `Option`
/// at the call site.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityColorPipeline;

impl ColorPipeline for IdentityColorPipeline {
    fn colorconvert(&self, _buf: &mut [u8], _spec: &ImageSpec, _from: &str, _to: &str) -> CacheResult<()> {
        Ok(())
    }
}
