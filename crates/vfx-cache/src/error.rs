//! Error types for `vfx-cache`.
//!
//! Mirrors the error taxonomy surfaced at the cache boundary. No variant is
//! fatal: a broken file degrades only its own tiles (see
//! [`crate::coordinator::CacheCoordinator`]).

use thiserror::Error;

/// Result type alias using [`CacheError`].
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors surfaced by `vfx-cache`.
#[derive(Debug, Error, Clone)]
pub enum CacheError {
    /// The filename could not be resolved or opened.
    #[error("could not open \"{0}\"")]
    FileNotFound(String),

    /// The file is marked broken; carries the stored human-readable cause.
    #[error("\"{file}\" is broken: {message}")]
    Broken {
        /// Canonical filename.
        file: String,
        /// Human-readable cause, as reported by the codec or header ingestion.
        message: String,
    },

    /// Subimage index is out of range for the file.
    #[error("\"{file}\" has no subimage {subimage}")]
    UnknownSubimage {
        /// Canonical filename.
        file: String,
        /// Requested subimage index.
        subimage: u32,
    },

    /// MIP level index is out of range for the subimage.
    #[error("\"{file}\" subimage {subimage} has no mip level {miplevel}")]
    UnknownMipLevel {
        /// Canonical filename.
        file: String,
        /// Requested subimage index.
        subimage: u32,
        /// Requested mip level.
        miplevel: u32,
    },

    /// Subimages disagreed on channel count during header ingestion.
    #[error("\"{file}\": subimage {subimage} has {got} channels, expected {expected}")]
    SubimageMismatch {
        /// Canonical filename.
        file: String,
        /// Offending subimage index.
        subimage: u32,
        /// Channel count found on subimage 0.
        expected: u8,
        /// Channel count found on the offending subimage.
        got: u8,
    },

    /// The file is untiled and `accept_untiled` is false.
    #[error("\"{0}\" is untiled and untiled files are not accepted")]
    UntiledNotAccepted(String),

    /// The file is unmipped and `accept_unmipped` is false.
    #[error("\"{0}\" is unmipped and unmipped files are not accepted")]
    UnmippedNotAccepted(String),

    /// A tile/scanline/image read failed after exhausting retries.
    #[error("I/O failure reading \"{file}\" (subimage {subimage}, mip {miplevel}, tile ({x},{y},{z})): {message}")]
    IoFailure {
        /// Canonical filename.
        file: String,
        /// Offending subimage index.
        subimage: u32,
        /// Offending mip level.
        miplevel: u32,
        /// Tile origin x.
        x: u32,
        /// Tile origin y.
        y: u32,
        /// Tile origin z.
        z: u32,
        /// Underlying codec error message.
        message: String,
    },

    /// The configured `substitute_image` could not be opened.
    #[error("substitute image \"{0}\" could not be opened")]
    SubstituteMissing(String),

    /// The color pipeline failed to convert a tile's buffer.
    #[error("color conversion failed: {0}")]
    ColorConvertFailed(String),

    /// The codec could not be constructed for this file.
    #[error("could not construct a decoder for \"{0}\"")]
    OpenFailed(String),

    /// Wraps an I/O error from the filesystem (UDIM directory scans, etc).
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::Io(e.to_string())
    }
}

impl From<vfx_io::IoError> for CacheError {
    fn from(e: vfx_io::IoError) -> Self {
        CacheError::IoFailure {
            file: String::new(),
            subimage: 0,
            miplevel: 0,
            x: 0,
            y: 0,
            z: 0,
            message: e.to_string(),
        }
    }
}
