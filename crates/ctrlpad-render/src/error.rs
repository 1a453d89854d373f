//! Error types for the render crate.

use std::path::PathBuf;

use thiserror::Error;

/// No placement for a bitmap exists within the atlas size limit.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no space left in texture atlas for a {width}x{height} bitmap (limit {max_size}x{max_size})")]
pub struct AtlasFullError {
    /// Width of the rejected bitmap.
    pub width: u32,
    /// Height of the rejected bitmap.
    pub height: u32,
    /// The atlas size limit in effect.
    pub max_size: u32,
}

/// Errors that can occur during graphics operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A bitmap could not be placed into the texture atlas.
    #[error(transparent)]
    AtlasFull(#[from] AtlasFullError),

    /// A font asset is missing or unusable.
    #[error("failed to load font '{}': {reason}", path.display())]
    FontLoad { path: PathBuf, reason: String },

    /// The font metrics table could not be parsed.
    #[error("malformed font metrics: {0}")]
    FontMetrics(#[from] serde_json::Error),

    /// A bitmap could not be decoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// An I/O error while reading an asset or configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The renderer configuration could not be parsed.
    #[error("invalid renderer configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// A shader stage failed to compile or validate.
    ///
    /// `listing` holds the offending source with line numbers.
    #[error("{stage} shader compilation failed: {diagnostic}\n{listing}")]
    ShaderCompile {
        stage: &'static str,
        diagnostic: String,
        listing: String,
    },

    /// No suitable graphics adapter was found.
    #[error("no suitable graphics adapter found")]
    NoAdapter,

    /// Failed to request a graphics device.
    #[error("failed to request graphics device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// The graphics context has not been initialized.
    #[error("graphics context not initialized")]
    NotInitialized,

    /// The graphics context was initialized twice.
    #[error("graphics context already initialized")]
    AlreadyInitialized,

    /// Invalid viewport or texture dimensions (zero width or height).
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
