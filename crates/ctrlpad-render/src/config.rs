//! Renderer and graphics device configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::atlas::DEFAULT_ATLAS_SIZE;
use crate::error::RenderResult;

/// Settings for a [`QuadBatcher`](crate::QuadBatcher).
///
/// Usually read from the `[renderer]` table of a panel's TOML file:
///
/// ```toml
/// initial_atlas_size = [1024, 512]
/// max_atlas_size = 4096
/// fonts = ["fonts/Roboto-Regular", "fonts/Roboto-Bold"]
/// min_text_size = 8.0
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Atlas size before the first growth.
    pub initial_atlas_size: [u32; 2],
    /// Atlas size limit; `None` uses the device's maximum texture size.
    pub max_atlas_size: Option<u32>,
    /// Fonts to load in order. The first one that loads is the default font.
    pub fonts: Vec<PathBuf>,
    /// Smallest size `fit_text_in_box` may shrink text to.
    pub min_text_size: f32,
    /// Line spacing factor for multi-line text.
    pub line_spacing: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            initial_atlas_size: [DEFAULT_ATLAS_SIZE, DEFAULT_ATLAS_SIZE],
            max_atlas_size: None,
            fonts: Vec::new(),
            min_text_size: 6.0,
            line_spacing: 1.0,
        }
    }
}

impl RendererConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> RenderResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a configuration file.
    pub fn load(path: impl AsRef<Path>) -> RenderResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_initial_atlas_size(mut self, width: u32, height: u32) -> Self {
        self.initial_atlas_size = [width, height];
        self
    }

    pub fn with_max_atlas_size(mut self, max_size: u32) -> Self {
        self.max_atlas_size = Some(max_size);
        self
    }

    pub fn with_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.fonts.push(path.into());
        self
    }

    pub fn with_min_text_size(mut self, min_text_size: f32) -> Self {
        self.min_text_size = min_text_size;
        self
    }

    pub fn with_line_spacing(mut self, line_spacing: f32) -> Self {
        self.line_spacing = line_spacing;
        self
    }
}

/// Configuration options for graphics context initialization.
#[derive(Debug, Clone)]
pub struct GraphicsConfig {
    /// Preferred GPU backends to use.
    pub backends: wgpu::Backends,
    /// Power preference for adapter selection.
    pub power_preference: wgpu::PowerPreference,
    /// Required device features.
    pub required_features: wgpu::Features,
    /// Required device limits.
    pub required_limits: wgpu::Limits,
    /// Enable debug validation layers.
    pub debug_validation: bool,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::PRIMARY | wgpu::Backends::GL,
            power_preference: wgpu::PowerPreference::LowPower,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            debug_validation: cfg!(debug_assertions),
        }
    }
}
