//! MSDF font metrics and glyph lookup.
//!
//! A font arrives as two files produced by an MSDF atlas generator:
//! `<name>.json` with metrics, glyph bounds and kerning pairs, and
//! `<name>.png` with the rendered glyph page. Loading places the page
//! into the shared [`TextureAtlas`] and rewrites every glyph's page-local
//! bounds into absolute atlas coordinates.
//!
//! Plane bounds are stored Y-down relative to the top of the line box, so
//! a line of text is positioned by its upper-left corner.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use serde::Deserialize;
use tracing::info;

use crate::atlas::TextureAtlas;
use crate::error::{RenderError, RenderResult};

/// Codepoints tried, in order, for characters missing from a font.
pub const FALLBACK_CODEPOINTS: [u32; 3] = [0xFFFD, '?' as u32, ' ' as u32];

/// Metrics of a single glyph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphRecord {
    /// Horizontal advance in em units.
    pub advance: f32,
    /// Whether the glyph has a visible image.
    pub has_image: bool,
    /// Quad bounds (x0, y0, x1, y1) in em units, Y down from the line top.
    pub plane: [f32; 4],
    /// Texture bounds (u0, v0, u1, v1) in absolute atlas pixels.
    pub atlas: [f32; 4],
}

impl GlyphRecord {
    /// The last-resort fallback: invisible, zero advance.
    pub const NULL: Self = Self::invisible(0.0);

    /// A glyph without image.
    pub const fn invisible(advance: f32) -> Self {
        Self {
            advance,
            has_image: false,
            plane: [0.0; 4],
            atlas: [0.0; 4],
        }
    }
}

/// Bounds as written by the atlas generator.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Bounds {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

/// Vertical origin of the atlas bounds in the metrics file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YOrigin {
    #[default]
    Bottom,
    Top,
}

/// The `atlas` section of the metrics file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageInfo {
    pub y_origin: YOrigin,
}

/// The `metrics` section of the metrics file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineMetrics {
    pub line_height: f32,
    pub ascender: f32,
    pub descender: f32,
    pub underline_y: f32,
    pub underline_thickness: f32,
}

impl Default for LineMetrics {
    fn default() -> Self {
        Self {
            line_height: 1.0,
            ascender: 1.0,
            descender: 0.0,
            underline_y: -0.02,
            underline_thickness: 0.01,
        }
    }
}

/// One entry of the `glyphs` list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlyphEntry {
    #[serde(default)]
    pub unicode: u32,
    #[serde(default)]
    pub advance: f32,
    pub plane_bounds: Option<Bounds>,
    pub atlas_bounds: Option<Bounds>,
}

/// One entry of the `kerning` list.
#[derive(Debug, Clone, Deserialize)]
pub struct KerningEntry {
    #[serde(default)]
    pub unicode1: u32,
    #[serde(default)]
    pub unicode2: u32,
    #[serde(default)]
    pub advance: f32,
}

/// Parsed contents of a font metrics file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FontMetrics {
    pub name: Option<String>,
    pub atlas: PageInfo,
    pub metrics: LineMetrics,
    pub glyphs: Vec<GlyphEntry>,
    pub kerning: Vec<KerningEntry>,
}

impl FontMetrics {
    /// Parse a metrics file.
    pub fn from_json(text: &str) -> RenderResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// An immutable MSDF font placed in a texture atlas.
#[derive(Debug, Clone)]
pub struct GlyphFont {
    name: String,
    /// Set only by [`GlyphFont::null`].
    null: bool,
    glyphs: HashMap<u32, GlyphRecord>,
    kern: HashMap<(u32, u32), f32>,
    fallback: GlyphRecord,
    line_height: f32,
    max_height: f32,
    baseline: f32,
    underline_y0: f32,
    underline_y1: f32,
}

impl GlyphFont {
    /// Load `<base>.json` and `<base>.png` and place the page into `atlas`.
    ///
    /// Any extension on `path` is ignored.
    pub fn load(path: impl AsRef<Path>, atlas: &mut TextureAtlas) -> RenderResult<Self> {
        let base = path.as_ref().with_extension("");
        let json_path = base.with_extension("json");
        let png_path = base.with_extension("png");

        let text = std::fs::read_to_string(&json_path).map_err(|e| font_error(&json_path, e))?;
        let metrics = FontMetrics::from_json(&text).map_err(|e| font_error(&json_path, e))?;
        let page = image::open(&png_path)
            .map_err(|e| font_error(&png_path, e))?
            .into_rgba8();

        let mut font = Self::from_parts(metrics, &page, atlas)?;
        if font.name.is_empty() {
            font.name = base
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        Ok(font)
    }

    /// Build a font from parsed metrics and its glyph page.
    pub fn from_parts(metrics: FontMetrics, page: &RgbaImage, atlas: &mut TextureAtlas) -> RenderResult<Self> {
        let placed = atlas.put(page)?;
        let (px0, py0, py1) = (placed.x0 as f32, placed.y0 as f32, placed.y1 as f32);

        let m = &metrics.metrics;
        let asc = m.ascender;
        let mut glyphs = HashMap::with_capacity(metrics.glyphs.len());
        for glyph in &metrics.glyphs {
            let record = match (glyph.plane_bounds, glyph.atlas_bounds) {
                (Some(pb), Some(ab)) => {
                    let (v0, v1) = match metrics.atlas.y_origin {
                        YOrigin::Bottom => (py1 - ab.top, py1 - ab.bottom),
                        YOrigin::Top => (py0 + ab.top, py0 + ab.bottom),
                    };
                    GlyphRecord {
                        advance: glyph.advance,
                        has_image: true,
                        plane: [pb.left, asc - pb.top, pb.right, asc - pb.bottom],
                        atlas: [px0 + ab.left, v0, px0 + ab.right, v1],
                    }
                }
                _ => GlyphRecord::invisible(glyph.advance),
            };
            glyphs.insert(glyph.unicode, record);
        }

        let kern: HashMap<(u32, u32), f32> = metrics
            .kerning
            .iter()
            .map(|k| ((k.unicode1, k.unicode2), k.advance))
            .collect();

        let fallback = FALLBACK_CODEPOINTS
            .iter()
            .find_map(|cp| glyphs.get(cp).copied())
            .unwrap_or(GlyphRecord::NULL);

        let font = Self {
            name: metrics.name.clone().unwrap_or_default(),
            null: false,
            glyphs,
            kern,
            fallback,
            line_height: m.line_height,
            max_height: asc - m.descender,
            baseline: asc,
            underline_y0: asc - m.underline_y - 0.5 * m.underline_thickness,
            underline_y1: asc - m.underline_y + 0.5 * m.underline_thickness,
        };
        info!(
            target: "ctrlpad_render::font",
            name = %font.name,
            glyphs = font.glyphs.len(),
            kerning_pairs = font.kern.len(),
            "loaded font"
        );
        Ok(font)
    }

    /// A font without glyphs: zero metrics, every character invisible.
    pub fn null() -> Self {
        Self {
            name: String::new(),
            null: true,
            glyphs: HashMap::new(),
            kern: HashMap::new(),
            fallback: GlyphRecord::NULL,
            line_height: 0.0,
            max_height: 0.0,
            baseline: 0.0,
            underline_y0: 0.0,
            underline_y1: 0.0,
        }
    }

    /// Whether this is the [`null`](Self::null) font.
    ///
    /// A loaded font without any glyphs is not null.
    pub fn is_null(&self) -> bool {
        self.null
    }

    /// Font name from the metrics file (or the file name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Glyph for `cp`, or the fallback glyph.
    #[inline]
    pub fn glyph(&self, cp: u32) -> &GlyphRecord {
        self.glyphs.get(&cp).unwrap_or(&self.fallback)
    }

    /// The glyph used for missing characters.
    pub fn fallback(&self) -> &GlyphRecord {
        &self.fallback
    }

    /// Kerning adjustment between `prev` and `cp`, in em units.
    #[inline]
    pub fn kerning(&self, prev: u32, cp: u32) -> f32 {
        self.kern.get(&(prev, cp)).copied().unwrap_or(0.0)
    }

    /// Distance between consecutive baselines, in em units.
    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    /// Ascender minus descender, in em units.
    pub fn max_height(&self) -> f32 {
        self.max_height
    }

    /// Baseline offset from the line top, in em units.
    pub fn baseline(&self) -> f32 {
        self.baseline
    }

    /// Underline band (top, bottom) from the line top, in em units.
    pub fn underline(&self) -> (f32, f32) {
        (self.underline_y0, self.underline_y1)
    }

    /// Number of glyphs with metrics.
    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Number of kerning pairs.
    pub fn kerning_count(&self) -> usize {
        self.kern.len()
    }

    /// Width of `text` at `size` pixels per em, including kerning.
    pub fn width(&self, text: &str, size: f32) -> f32 {
        let mut x = 0.0;
        let mut prev = 0;
        for cp in text.chars().map(u32::from) {
            x += self.kerning(prev, cp) + self.glyph(cp).advance;
            prev = cp;
        }
        x * size
    }
}

fn font_error(path: &Path, err: impl std::fmt::Display) -> RenderError {
    RenderError::FontLoad {
        path: PathBuf::from(path),
        reason: err.to_string(),
    }
}
