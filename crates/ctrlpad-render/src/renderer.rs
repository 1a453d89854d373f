//! The immediate-mode quad batcher.
//!
//! [`QuadBatcher`] turns box and text draw calls into [`Vertex`] quads and
//! hands them to a [`GpuBackend`] in as few draw calls as possible. A batch
//! ends when it holds [`BATCH_QUADS`] quads or when a different texture is
//! bound; batches are drawn in the order they were filled, so later calls
//! paint over earlier ones.
//!
//! # Frame lifecycle
//!
//! ```
//! use ctrlpad_render::{BoxStyle, QuadBatcher, RecordingBackend, Rect};
//!
//! let mut renderer = QuadBatcher::new(RecordingBackend::default());
//! renderer.begin_frame(800, 480).unwrap();
//! let fill = renderer.color("#203040");
//! renderer.draw_box(Rect::new(10.0, 10.0, 200.0, 60.0), &BoxStyle::new(fill).with_radius(8.0));
//! let stats = renderer.end_frame();
//! assert_eq!(stats.quads, 1);
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use image::RgbaImage;
use tracing::{debug, error, info};

use crate::atlas::{PendingUpload, TextureAtlas};
use crate::backend::{GpuBackend, TextureHandle};
use crate::color::ColorCache;
use crate::config::RendererConfig;
use crate::error::{RenderError, RenderResult};
use crate::font::{FontMetrics, GlyphFont};
use crate::layout::{self, FitOptions, HorizontalAlign, TextBlock, TextLine, VerticalAlign};
use crate::types::{Color, Rect};
use crate::vertex::{BATCH_QUADS, Vertex, VertexMode};

/// Edge parameters of MSDF text: no offset, slightly sharpened.
const TEXT_BORDER_BLUR: [f32; 2] = [0.0, 1.33];

/// Smallest blur accepted by [`QuadBatcher::draw_box`].
const MIN_BLUR: f32 = 1.0 / 256.0;

/// Fill parameters of a rounded box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxStyle {
    /// Color at the upper edge.
    pub top: Color,
    /// Color at the lower edge.
    pub bottom: Color,
    /// Corner radius, clamped to half the smaller side.
    pub radius: f32,
    /// Edge softness: 0 is aliased, 1 antialiased, larger values blur.
    pub blur: f32,
    /// Moves the edge outwards (negative) or inwards (positive).
    pub offset: f32,
}

impl BoxStyle {
    /// A solid, antialiased, square-cornered box.
    pub fn new(color: Color) -> Self {
        Self::gradient(color, color)
    }

    /// A vertical gradient from `top` to `bottom`.
    pub fn gradient(top: Color, bottom: Color) -> Self {
        Self {
            top,
            bottom,
            radius: 0.0,
            blur: 1.0,
            offset: 0.0,
        }
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_blur(mut self, blur: f32) -> Self {
        self.blur = blur;
        self
    }

    pub fn with_offset(mut self, offset: f32) -> Self {
        self.offset = offset;
        self
    }
}

/// A black shadow drawn beneath an outlined box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropShadow {
    /// Distance the shadow is moved right and down.
    pub offset: f32,
    /// Additional blur.
    pub blur: f32,
    /// Shadow opacity.
    pub alpha: f32,
    /// Pixels the shadow extends past the box on every side.
    pub grow: f32,
}

impl Default for DropShadow {
    fn default() -> Self {
        Self {
            offset: 0.0,
            blur: 0.0,
            alpha: 1.0,
            grow: 0.0,
        }
    }
}

impl DropShadow {
    /// Whether the shadow would be visible at all.
    fn is_visible(&self) -> bool {
        (self.offset > 0.0 || self.grow > 0.0) && self.alpha > 0.0
    }
}

/// Parameters of [`QuadBatcher::outline_box`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlineStyle {
    /// Outline thickness.
    pub width: f32,
    pub outline: Color,
    /// Fill color at the upper edge.
    pub top: Color,
    /// Fill color at the lower edge.
    pub bottom: Color,
    pub radius: f32,
    pub shadow: Option<DropShadow>,
}

impl OutlineStyle {
    /// A solid fill with an outline of `width` pixels.
    pub fn new(width: f32, outline: Color, fill: Color) -> Self {
        Self {
            width,
            outline,
            top: fill,
            bottom: fill,
            radius: 0.0,
            shadow: None,
        }
    }

    pub fn with_gradient(mut self, top: Color, bottom: Color) -> Self {
        self.top = top;
        self.bottom = bottom;
        self
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_shadow(mut self, shadow: DropShadow) -> Self {
        self.shadow = Some(shadow);
        self
    }
}

/// A texture uploaded with [`QuadBatcher::upload_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTexture {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
}

/// Statistics from a frame render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Number of quads drawn.
    pub quads: usize,
    /// Number of draw calls submitted.
    pub batches: usize,
}

/// Immediate-mode renderer for boxes and MSDF text.
pub struct QuadBatcher<B: GpuBackend> {
    backend: B,
    atlas: TextureAtlas,
    /// Quads of the current batch.
    vertices: Vec<Vertex>,
    /// Bound texture and its size in pixels.
    bound: Option<(TextureHandle, [f32; 2])>,

    fonts: HashMap<String, Rc<GlyphFont>>,
    default_font: Rc<GlyphFont>,
    font: Rc<GlyphFont>,
    colors: ColorCache,

    min_text_size: f32,
    line_spacing: f32,

    frame: FrameStats,
    most_complex: FrameStats,
}

impl<B: GpuBackend> QuadBatcher<B> {
    /// Create a renderer with default settings.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, &RendererConfig::default())
    }

    /// Create a renderer and load the configured fonts.
    pub fn with_config(mut backend: B, config: &RendererConfig) -> Self {
        let device_max = backend.max_texture_size();
        let max_size = config.max_atlas_size.map_or(device_max, |m| m.min(device_max));
        let [width, height] = config.initial_atlas_size;
        let texture = backend.create_texture();
        let atlas = TextureAtlas::new(texture, (width, height), max_size);

        debug!(
            target: "ctrlpad_render::renderer",
            atlas_max_size = atlas.max_size(),
            batch_quads = BATCH_QUADS,
            "created quad batcher"
        );

        let null = Rc::new(GlyphFont::null());
        let mut renderer = Self {
            backend,
            atlas,
            vertices: Vec::with_capacity(BATCH_QUADS * 4),
            bound: None,
            fonts: HashMap::new(),
            default_font: Rc::clone(&null),
            font: null,
            colors: ColorCache::new(),
            min_text_size: config.min_text_size,
            line_spacing: config.line_spacing,
            frame: FrameStats::default(),
            most_complex: FrameStats::default(),
        };
        renderer.bind_atlas();
        for path in &config.fonts {
            renderer.add_font(path);
        }
        if !config.fonts.is_empty() {
            renderer.set_font(None);
        }
        renderer
    }

    /// The graphics backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the graphics backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The glyph atlas.
    pub fn atlas(&self) -> &TextureAtlas {
        &self.atlas
    }

    /// Statistics of the most complex frame so far.
    pub fn most_complex_frame(&self) -> FrameStats {
        self.most_complex
    }

    // =========================================================================
    // Frame Management
    // =========================================================================

    /// Start a frame for a viewport of `width` x `height` pixels.
    ///
    /// Coordinates are pixels with the origin in the upper-left corner.
    pub fn begin_frame(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidDimensions { width, height });
        }
        // Y down: the top edge maps to +1.
        let projection = glam::Mat4::orthographic_rh(0.0, width as f32, height as f32, 0.0, -1.0, 1.0);
        self.backend.set_projection([
            projection.x_axis.x,
            projection.y_axis.y,
            projection.w_axis.x,
            projection.w_axis.y,
        ]);
        self.vertices.clear();
        self.frame = FrameStats::default();
        Ok(())
    }

    /// Draw what is left of the frame.
    pub fn end_frame(&mut self) -> FrameStats {
        self.flush();
        self.backend.end_frame();
        let frame = self.frame;
        if frame.quads > self.most_complex.quads || frame.batches > self.most_complex.batches {
            info!(
                target: "ctrlpad_render::renderer",
                quads = frame.quads,
                batches = frame.batches,
                "most complex frame so far"
            );
            self.most_complex.quads = self.most_complex.quads.max(frame.quads);
            self.most_complex.batches = self.most_complex.batches.max(frame.batches);
        }
        frame
    }

    /// Draw the quads batched so far with a single draw call.
    pub fn flush(&mut self) {
        if self.vertices.is_empty() {
            return;
        }
        debug_assert_eq!(self.vertices.len() % 4, 0);
        self.backend.draw_quads(&self.vertices);
        self.frame.quads += self.vertices.len() / 4;
        self.frame.batches += 1;
        self.vertices.clear();
    }

    /// Use `texture` for the following draws.
    ///
    /// Flushes first if the binding changes.
    pub fn set_texture(&mut self, texture: TextureHandle, width: u32, height: u32) {
        let size = [width as f32, height as f32];
        if self.bound == Some((texture, size)) {
            return;
        }
        self.flush();
        self.backend.bind_texture(texture, size);
        self.bound = Some((texture, size));
    }

    /// Upload outstanding atlas changes and bind the atlas.
    fn bind_atlas(&mut self) {
        if self.atlas.pending_upload().is_pending() {
            // Queued text must still see the old texture.
            self.flush();
            let texture = self.atlas.texture();
            match self.atlas.take_pending_upload() {
                PendingUpload::None => {}
                PendingUpload::Full => {
                    self.backend.upload_texture(texture, self.atlas.image(), None);
                    self.bound = None;
                }
                PendingUpload::Regions(regions) => {
                    for region in regions {
                        self.backend
                            .upload_texture(texture, self.atlas.image(), Some(region));
                    }
                }
            }
        }
        let (width, height) = self.atlas.size();
        self.set_texture(self.atlas.texture(), width, height);
    }

    fn push_quad(&mut self, quad: [Vertex; 4]) {
        if self.vertices.len() >= BATCH_QUADS * 4 {
            self.flush();
        }
        self.vertices.extend_from_slice(&quad);
    }

    // =========================================================================
    // Colors
    // =========================================================================

    /// Parse a hex color through the renderer's cache.
    pub fn color(&mut self, spec: &str) -> Color {
        self.colors.parse(spec)
    }

    // =========================================================================
    // Boxes
    // =========================================================================

    /// Draw a rounded box, circle or soft shadow.
    ///
    /// Empty rectangles draw nothing.
    pub fn draw_box(&mut self, rect: Rect, style: &BoxStyle) {
        if rect.is_empty() {
            return;
        }
        let (x0, y0, x1, y1) = (rect.left(), rect.top(), rect.right(), rect.bottom());
        let w = (x1 - x0) * 0.5;
        let h = (y1 - y0) * 0.5;
        let r = w.min(h).min(style.radius);
        let s = 1.0 / style.blur.max(MIN_BLUR);

        let vertex = |x: f32, y: f32, tx: f32, ty: f32, color: Color| Vertex {
            position: [x, y],
            tex_coord: [tx, ty],
            mode: VertexMode::Box.as_f32(),
            sdf_size: [w, h, r],
            border_blur: [style.offset, s],
            color: color.to_array(),
        };
        self.push_quad([
            vertex(x0, y0, -w, -h, style.top),
            vertex(x1, y0, w, -h, style.top),
            vertex(x0, y1, -w, h, style.bottom),
            vertex(x1, y1, w, h, style.bottom),
        ]);
    }

    /// Draw a box with an outline and an optional drop shadow.
    ///
    /// The outline is a full-size box in the outline color with the fill
    /// box inset by `width` on top of it.
    pub fn outline_box(&mut self, rect: Rect, style: &OutlineStyle) {
        if let Some(shadow) = style.shadow.filter(DropShadow::is_visible) {
            let shadow_rect = rect.offset(shadow.offset, shadow.offset).inflate(shadow.grow);
            let shadow_style = BoxStyle::new(Color::BLACK.with_alpha(shadow.alpha))
                .with_radius(style.radius + shadow.grow)
                .with_blur(shadow.blur + 1.0)
                .with_offset(shadow.blur);
            self.draw_box(shadow_rect, &shadow_style);
        }
        self.draw_box(rect, &BoxStyle::new(style.outline).with_radius(style.radius));
        self.draw_box(
            rect.deflate(style.width),
            &BoxStyle::gradient(style.top, style.bottom).with_radius(style.radius - style.width),
        );
    }

    // =========================================================================
    // Images
    // =========================================================================

    /// Upload `image` into a new texture for [`draw_image`](Self::draw_image).
    pub fn upload_image(&mut self, image: &RgbaImage) -> ImageTexture {
        let handle = self.backend.create_texture();
        self.backend.upload_texture(handle, image, None);
        ImageTexture {
            handle,
            width: image.width(),
            height: image.height(),
        }
    }

    /// Draw a whole texture stretched over `rect`.
    pub fn draw_image(&mut self, rect: Rect, image: &ImageTexture) {
        if rect.is_empty() {
            return;
        }
        self.set_texture(image.handle, image.width, image.height);
        let (u1, v1) = (image.width as f32, image.height as f32);
        let vertex = |x: f32, y: f32, u: f32, v: f32| Vertex {
            position: [x, y],
            tex_coord: [u, v],
            mode: VertexMode::Texture.as_f32(),
            sdf_size: [0.0; 3],
            border_blur: [0.0; 2],
            color: Color::WHITE.to_array(),
        };
        self.push_quad([
            vertex(rect.left(), rect.top(), 0.0, 0.0),
            vertex(rect.right(), rect.top(), u1, 0.0),
            vertex(rect.left(), rect.bottom(), 0.0, v1),
            vertex(rect.right(), rect.bottom(), u1, v1),
        ]);
    }

    // =========================================================================
    // Fonts
    // =========================================================================

    /// Load a font and make it current.
    ///
    /// Returns the font's name, or `None` (after logging why) if it could
    /// not be loaded; the current font is kept in that case.
    pub fn add_font(&mut self, path: impl AsRef<Path>) -> Option<String> {
        let path = path.as_ref();
        match GlyphFont::load(path, &mut self.atlas) {
            Ok(font) => Some(self.register_font(font)),
            Err(err) => {
                error!(
                    target: "ctrlpad_render::renderer",
                    path = %path.display(),
                    error = %err,
                    "failed to load font"
                );
                None
            }
        }
    }

    /// Register a font from already parsed metrics and its glyph page.
    pub fn add_font_from_parts(&mut self, metrics: FontMetrics, page: &RgbaImage) -> RenderResult<String> {
        let font = GlyphFont::from_parts(metrics, page, &mut self.atlas)?;
        Ok(self.register_font(font))
    }

    fn register_font(&mut self, font: GlyphFont) -> String {
        self.bind_atlas();
        let name = font.name().to_owned();
        let font = Rc::new(font);
        if self.default_font.is_null() {
            self.default_font = Rc::clone(&font);
        }
        self.fonts.insert(name.clone(), Rc::clone(&font));
        self.font = font;
        name
    }

    /// Select a font by name; `None` or an unknown name selects the default.
    pub fn set_font(&mut self, name: Option<&str>) -> &GlyphFont {
        self.font = name
            .and_then(|n| self.fonts.get(n))
            .map_or_else(|| Rc::clone(&self.default_font), Rc::clone);
        &self.font
    }

    /// The current font.
    pub fn font(&self) -> &GlyphFont {
        &self.font
    }

    // =========================================================================
    // Text
    // =========================================================================

    /// Width of `text` in the current font.
    pub fn text_line_width(&self, text: &str, size: f32) -> f32 {
        self.font.width(text, size)
    }

    /// Height of a line of text in the current font.
    pub fn text_line_height(&self, size: f32) -> f32 {
        self.font.max_height() * size
    }

    /// Draw one line of text with its upper-left corner at `x`, `y`.
    pub fn text_line(&mut self, x: f32, y: f32, size: f32, text: &str, color: Color, align: HorizontalAlign) {
        self.text_line_gradient(x, y, size, text, color, color, align);
    }

    /// Draw one line of text with a vertical color gradient.
    ///
    /// `align` is relative to `x`. Glyphs without an image still advance.
    #[allow(clippy::too_many_arguments)]
    pub fn text_line_gradient(
        &mut self,
        mut x: f32,
        y: f32,
        size: f32,
        text: &str,
        top: Color,
        bottom: Color,
        align: HorizontalAlign,
    ) {
        if text.is_empty() {
            return;
        }
        self.bind_atlas();
        let font = Rc::clone(&self.font);
        x -= align.shift(font.width(text, size));

        let mut prev = 0;
        for cp in text.chars().map(u32::from) {
            x += font.kerning(prev, cp) * size;
            let glyph = font.glyph(cp);
            if glyph.has_image {
                let [px0, py0, px1, py1] = glyph.plane;
                let [tx0, ty0, tx1, ty1] = glyph.atlas;
                let vertex = |vx: f32, vy: f32, u: f32, v: f32, color: Color| Vertex {
                    position: [x + vx * size, y + vy * size],
                    tex_coord: [u, v],
                    mode: VertexMode::MsdfText.as_f32(),
                    sdf_size: [0.0; 3],
                    border_blur: TEXT_BORDER_BLUR,
                    color: color.to_array(),
                };
                self.push_quad([
                    vertex(px0, py0, tx0, ty0, top),
                    vertex(px1, py0, tx1, ty0, top),
                    vertex(px0, py1, tx0, ty1, bottom),
                    vertex(px1, py1, tx1, ty1, bottom),
                ]);
            }
            x += glyph.advance * size;
            prev = cp;
        }
    }

    /// Draw text split into lines at `'\n'`.
    ///
    /// `y` is the top of the block for [`VerticalAlign::Top`], its bottom
    /// for [`VerticalAlign::Bottom`] and its middle for
    /// [`VerticalAlign::Middle`]. `line_spacing` scales the font's line
    /// height.
    #[allow(clippy::too_many_arguments)]
    pub fn text(
        &mut self,
        x: f32,
        mut y: f32,
        size: f32,
        text: &str,
        color: Color,
        halign: HorizontalAlign,
        valign: VerticalAlign,
        line_spacing: f32,
    ) {
        let pitch = self.font.line_height() * size * line_spacing;
        let lines = text.split('\n').count();
        y -= valign.shift(pitch * (lines - 1) as f32 + self.font.max_height() * size);
        for line in text.split('\n') {
            self.text_line(x, y, size, line, color, halign);
            y += pitch;
        }
    }

    /// Wrap `text` to `max_width` pixels in the current font.
    pub fn wrap_text(&self, max_width: f32, size: f32, text: &str) -> Vec<TextLine> {
        layout::wrap_text(&self.font, max_width, size, text)
    }

    /// Lay out `text` to fit into `rect` in the current font.
    ///
    /// Uses the configured minimum text size and line spacing. The result
    /// is meant to be kept and drawn with [`fitted_text`](Self::fitted_text)
    /// while the current font stays the same.
    pub fn fit_text_in_box(
        &self,
        rect: Rect,
        initial_size: f32,
        text: &str,
        halign: HorizontalAlign,
        valign: VerticalAlign,
    ) -> TextBlock {
        let options = FitOptions {
            halign,
            valign,
            line_spacing: self.line_spacing,
            min_size: self.min_text_size,
        };
        layout::fit_text_in_box(&self.font, rect, initial_size, text, &options)
    }

    /// Draw a block laid out by [`fit_text_in_box`](Self::fit_text_in_box).
    pub fn fitted_text(&mut self, block: &TextBlock, color: Color) {
        for line in &block.lines {
            self.text_line(
                line.rect.left(),
                line.rect.top(),
                line.size,
                &line.text,
                color,
                HorizontalAlign::Left,
            );
        }
    }
}

impl<B: GpuBackend + std::fmt::Debug> std::fmt::Debug for QuadBatcher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuadBatcher")
            .field("backend", &self.backend)
            .field("atlas_size", &self.atlas.size())
            .field("fonts", &self.fonts.keys().collect::<Vec<_>>())
            .field("queued_quads", &(self.vertices.len() / 4))
            .finish()
    }
}
