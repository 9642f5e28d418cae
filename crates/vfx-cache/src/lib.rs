//! # vfx-cache
//!
//! A concurrent tile cache for bounded-memory random-access reads of tiled,
//! multi-subimage, multi-resolution image files.
//!
//! This crate is the file registry + tile cache core of an
//! OpenImageIO-style `ImageCache`: clients ask for a rectangle of pixels
//! from a named file, the cache opens the file on demand, reads and caches
//! fixed-size rectangular tiles, and evicts tiles / closes file handles
//! under memory and handle pressure, all under heavy concurrent access.
//!
//! # Architecture
//!
//! - [`id`] - [`id::TileId`] / [`id::FileIndex`], the identity types used as
//!   map keys.
//! - [`file_registry`] - [`file_registry::FileRegistry`], a concurrent
//!   `filename -> FileRecord` map: header ingestion, open-handle lifecycle,
//!   max-open-files enforcement, UDIM virtual files, duplicate-file
//!   fingerprint coalescing.
//! - [`tile_cache`] - [`tile_cache::TileCache`], a sharded concurrent
//!   `TileId -> TileRecord` map with clock-sweep eviction against a memory
//!   budget and the "exactly one reader per tile" publication protocol.
//! - [`coordinator`] - [`coordinator::CacheCoordinator`], the public
//!   surface: `get_pixels`/`get_tile`/`add_tile`/`invalidate`/`getstats`,
//!   the per-thread microcache, and auto-mip/auto-tile synthesis.
//! - [`codec`] - the [`codec::ImageInput`] capability this crate consumes;
//!   concrete decoders are out of scope (a texture-filtering/codec
//!   collaborator), but a default adapter over `vfx_io::read` is provided.
//! - [`colorpipe`] - the [`colorpipe::ColorPipeline`] capability consumed
//!   when a tile's color-transform id is non-zero; a real implementation
//!   (e.g. backed by `vfx-ocio`) lives outside this crate.
//!
//! # Quick Start
//!
//! ```ignore
//! use vfx_cache::{CacheCoordinator, CacheConfig};
//!
//! let cache = CacheCoordinator::new(CacheConfig::default());
//! let file = cache.find_file("texture.<UDIM>.exr")?;
//! let mut out = vec![0.0f32; 64 * 64 * 4];
//! cache.get_pixels(file, 0, 0, 0, 64, 0, 64, 0, 4, &mut out)?;
//! # Ok::<(), vfx_cache::CacheError>(())
//! ```
//!
//! # Non-goals
//!
//! Not a persistent on-disk tile cache, no speculative prefetch, no bound
//! on worst-case tile-read latency, no transactional consistency across
//! multiple tile reads. The texture-filtering layer (anisotropic EWA,
//! bilinear/bicubic reconstruction, environment-map projection) sits above
//! this crate and is out of scope; so is the image codec layer itself.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod codec;
pub mod colorpipe;
pub mod coordinator;
pub mod error;
pub mod file_registry;
pub mod id;
pub mod stats;
pub mod tile_cache;
pub mod udim;

// Re-exports
pub use codec::{ImageInput, ImageInputCreator, ImageSpec, VfxIoInput, VfxIoInputCreator};
pub use colorpipe::{ColorPipeline, IdentityColorPipeline};
pub use coordinator::{CacheConfig, CacheCoordinator, LatLongUp, TileHandle, TileRoi};
pub use error::{CacheError, CacheResult};
pub use file_registry::{FileRecordInner, FileRegistry};
pub use id::{FileIndex, TileId};
pub use stats::CacheStatistics;
pub use tile_cache::{TileCache, TileRecord};
