//! Immediate-mode 2D renderer for ctrlpad touch panels.
//!
//! The crate draws the two primitives a control panel is made of: rounded
//! boxes (with gradients, outlines and drop shadows) and MSDF text. It
//! consists of three parts:
//!
//! - [`TextureAtlas`] packs font glyph pages into one growable texture.
//! - [`QuadBatcher`] turns box and text calls into vertex quads and issues
//!   as few draw calls as possible.
//! - [`wrap_text`] and [`fit_text_in_box`] lay text out on a
//!   [`GlyphFont`]'s metrics.
//!
//! The graphics API sits behind the [`GpuBackend`] trait. [`WgpuBackend`]
//! draws with wgpu; [`RecordingBackend`] only records what would be drawn.
//!
//! # Getting Started
//!
//! ```no_run
//! use ctrlpad_render::{
//!     Color, GraphicsConfig, GraphicsContext, HorizontalAlign, OutlineStyle, QuadBatcher,
//!     Rect, RendererConfig, VerticalAlign, WgpuBackend, wgpu,
//! };
//!
//! # fn example(view: wgpu::TextureView) -> ctrlpad_render::RenderResult<()> {
//! GraphicsContext::init(GraphicsConfig::default())?;
//! let backend = WgpuBackend::new(wgpu::TextureFormat::Bgra8UnormSrgb)?;
//! let config = RendererConfig::load("panel.toml")?;
//! let mut renderer = QuadBatcher::with_config(backend, &config);
//!
//! // Layout is computed once and replayed every frame.
//! let button = Rect::new(20.0, 20.0, 160.0, 60.0);
//! let label = renderer.fit_text_in_box(
//!     button.deflate(6.0),
//!     24.0,
//!     "Projector on",
//!     HorizontalAlign::Center,
//!     VerticalAlign::Middle,
//! );
//!
//! renderer.backend_mut().set_target(view, Some(Color::BLACK));
//! renderer.begin_frame(800, 480)?;
//! let (outline, fill, text) = (renderer.color("888"), renderer.color("246"), renderer.color("fff"));
//! renderer.outline_box(button, &OutlineStyle::new(2.0, outline, fill).with_radius(8.0));
//! renderer.fitted_text(&label, text);
//! renderer.end_frame();
//! # Ok(())
//! # }
//! ```

mod atlas;
mod backend;
mod color;
mod config;
mod context;
mod error;
mod font;
mod layout;
mod renderer;
mod types;
mod vertex;
mod wgpu_backend;

// Core infrastructure
pub use config::{GraphicsConfig, RendererConfig};
pub use context::{GpuResources, GraphicsContext};
pub use error::{AtlasFullError, RenderError, RenderResult};

// Graphics capability
pub use backend::{GpuBackend, GpuCommand, RecordingBackend, TextureHandle};
pub use wgpu_backend::{TEXTURE_FORMAT, WgpuBackend};

// Renderer API
pub use renderer::{BoxStyle, DropShadow, FrameStats, ImageTexture, OutlineStyle, QuadBatcher};
pub use vertex::{BATCH_QUADS, QUAD_INDICES, VERTEX_FLOATS, VERTEX_SIZE, Vertex, VertexMode, quad_indices};

// Atlas, fonts and layout
pub use atlas::{AtlasRect, DEFAULT_ATLAS_SIZE, FrontPoint, PendingUpload, TextureAtlas};
pub use font::{
    Bounds, FALLBACK_CODEPOINTS, FontMetrics, GlyphEntry, GlyphFont, GlyphRecord, KerningEntry,
    LineMetrics, PageInfo, YOrigin,
};
pub use layout::{
    FitOptions, HorizontalAlign, PlacedLine, TextBlock, TextLine, VerticalAlign, fit_text_in_box,
    wrap_text,
};

// Values
pub use color::{ColorCache, parse_hex};
pub use types::{Color, Point, Rect, Size};

// Re-export wgpu types that users commonly need
pub use wgpu;
