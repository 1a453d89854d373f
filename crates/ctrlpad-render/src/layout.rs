//! Text layout on MSDF font metrics: word wrapping and shrink-to-fit.
//!
//! Everything here is pure; the results are plain data that the caller
//! keeps and replays every frame with
//! [`QuadBatcher::fitted_text`](crate::QuadBatcher::fitted_text).

use crate::font::GlyphFont;
use crate::types::Rect;

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HorizontalAlign {
    /// Text starts at the anchor.
    #[default]
    Left,
    /// Text ends at the anchor.
    Right,
    /// Text is centered on the anchor.
    Center,
}

impl HorizontalAlign {
    /// How far text of width `extent` is shifted left of its anchor.
    #[inline]
    pub fn shift(self, extent: f32) -> f32 {
        match self {
            Self::Left => 0.0,
            Self::Right => extent,
            Self::Center => extent * 0.5,
        }
    }
}

/// Vertical text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VerticalAlign {
    /// Block starts at the anchor.
    #[default]
    Top,
    /// Block ends at the anchor.
    Bottom,
    /// Block is centered on the anchor.
    Middle,
}

impl VerticalAlign {
    /// How far a block of height `extent` is shifted up from its anchor.
    #[inline]
    pub fn shift(self, extent: f32) -> f32 {
        match self {
            Self::Top => 0.0,
            Self::Bottom => extent,
            Self::Middle => extent * 0.5,
        }
    }
}

/// One wrapped line and its width in pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub width: f32,
}

impl TextLine {
    fn measure(font: &GlyphFont, size: f32, text: &str) -> Self {
        let text = text.trim();
        Self {
            text: text.to_owned(),
            width: font.width(text, size),
        }
    }
}

/// A line positioned by [`fit_text_in_box`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    /// Line box; its upper-left corner is the text origin.
    pub rect: Rect,
    /// Font size the line was laid out with.
    pub size: f32,
    pub text: String,
}

/// Result of [`fit_text_in_box`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextBlock {
    pub lines: Vec<PlacedLine>,
    /// Font size chosen for the whole block.
    pub size: f32,
}

impl TextBlock {
    /// Union of all line boxes.
    pub fn bounds(&self) -> Rect {
        let mut lines = self.lines.iter().map(|l| l.rect);
        let Some(first) = lines.next() else {
            return Rect::ZERO;
        };
        let (mut x0, mut y0, mut x1, mut y1) = (first.left(), first.top(), first.right(), first.bottom());
        for r in lines {
            x0 = x0.min(r.left());
            y0 = y0.min(r.top());
            x1 = x1.max(r.right());
            y1 = y1.max(r.bottom());
        }
        Rect::from_ltrb(x0, y0, x1, y1)
    }
}

/// Options for [`fit_text_in_box`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub halign: HorizontalAlign,
    pub valign: VerticalAlign,
    /// Scale factor on the font's line height.
    pub line_spacing: f32,
    /// Smallest size the text may shrink to.
    pub min_size: f32,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            halign: HorizontalAlign::Center,
            valign: VerticalAlign::Middle,
            line_spacing: 1.0,
            min_size: 6.0,
        }
    }
}

impl FitOptions {
    pub fn with_halign(mut self, halign: HorizontalAlign) -> Self {
        self.halign = halign;
        self
    }

    pub fn with_valign(mut self, valign: VerticalAlign) -> Self {
        self.valign = valign;
        self
    }

    pub fn with_line_spacing(mut self, line_spacing: f32) -> Self {
        self.line_spacing = line_spacing;
        self
    }

    pub fn with_min_size(mut self, min_size: f32) -> Self {
        self.min_size = min_size;
        self
    }
}

/// Greedy word wrap.
///
/// Every non-alphanumeric character is a possible break and `'\n'` forces
/// one. A token without any break that is wider than `max_width` stays on
/// a line of its own. Lines are trimmed; each paragraph yields at least
/// one (possibly empty) line.
pub fn wrap_text(font: &GlyphFont, max_width: f32, size: f32, text: &str) -> Vec<TextLine> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let first = lines.len();
        wrap_paragraph(font, max_width, size, paragraph, &mut lines);
        if lines.len() == first {
            lines.push(TextLine {
                text: String::new(),
                width: 0.0,
            });
        }
    }
    lines
}

fn wrap_paragraph(font: &GlyphFont, max_width: f32, size: f32, text: &str, out: &mut Vec<TextLine>) {
    let measure = |s: &str| TextLine::measure(font, size, s);
    let mut emit = |line: TextLine| {
        if !line.text.is_empty() {
            out.push(line);
        }
    };

    // `end` is the last break that still fits after `start`.
    let (mut start, mut end) = (0, 0);
    for (i, c) in text.char_indices() {
        if c.is_alphanumeric() {
            continue;
        }
        let next = i + c.len_utf8();
        if measure(&text[start..next]).width <= max_width {
            end = next;
            continue;
        }
        if end > start {
            emit(measure(&text[start..end]));
        }
        start = end;
        let overflow = measure(&text[start..next]);
        if overflow.width > max_width {
            emit(overflow);
            start = next;
        }
        end = next;
    }

    let tail = measure(&text[start..]);
    if tail.width <= max_width || end <= start {
        emit(tail);
    } else {
        emit(measure(&text[start..end]));
        emit(measure(&text[end..]));
    }
}

/// Lay out `text` inside `rect`, shrinking the size until it fits.
///
/// Starting at `initial_size`, each step wraps at the box width and
/// reduces the size by 10% (at least one pixel) until both the widest line
/// and the block height fit, or `min_size` is reached.
pub fn fit_text_in_box(
    font: &GlyphFont,
    rect: Rect,
    initial_size: f32,
    text: &str,
    options: &FitOptions,
) -> TextBlock {
    let (box_w, box_h) = (rect.width(), rect.height());
    let mut size = initial_size;
    let (lines, line_height, pitch, height) = loop {
        let line_height = font.max_height() * size;
        let pitch = font.line_height() * size * options.line_spacing;
        let lines = wrap_text(font, box_w, size, text);
        let width = lines.iter().map(|l| l.width).fold(0.0, f32::max);
        let height = pitch * (lines.len().saturating_sub(1)) as f32 + line_height;
        if size <= options.min_size || (width <= box_w && height <= box_h) {
            break (lines, line_height, pitch, height);
        }
        size = (size * 0.9).min(size - 1.0).max(options.min_size);
    };

    let mut y = rect.top() + options.valign.shift(box_h - height);
    let placed = lines
        .into_iter()
        .map(|line| {
            let x = rect.left() + options.halign.shift(box_w - line.width);
            let placed = PlacedLine {
                rect: Rect::new(x, y, line.width, line_height),
                size,
                text: line.text,
            };
            y += pitch;
            placed
        })
        .collect();

    TextBlock { lines: placed, size }
}

#[cfg(test)]
mod tests {
    use image::RgbaImage;

    use super::*;
    use crate::atlas::TextureAtlas;
    use crate::backend::TextureHandle;
    use crate::font::FontMetrics;

    /// Every glyph advances half an em; lines are 1.2 em apart.
    fn mono_font() -> GlyphFont {
        let glyphs: Vec<String> = (32u32..127)
            .map(|cp| format!(r#"{{ "unicode": {cp}, "advance": 0.5 }}"#))
            .collect();
        let json = format!(
            r#"{{ "metrics": {{ "lineHeight": 1.2, "ascender": 0.8, "descender": -0.2 }},
                 "glyphs": [{}] }}"#,
            glyphs.join(",")
        );
        let metrics = FontMetrics::from_json(&json).unwrap();
        let mut atlas = TextureAtlas::new(TextureHandle::from_raw(1), (64, 64), 256);
        GlyphFont::from_parts(metrics, &RgbaImage::new(8, 8), &mut atlas).unwrap()
    }

    fn texts(lines: &[TextLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_wrap_breaks_at_punctuation() {
        let font = mono_font();
        // 10 px per character, 100 px per line.
        let lines = wrap_text(&font, 100.0, 20.0, "alpha beta-gamma delta");
        assert_eq!(texts(&lines), vec!["alpha", "beta-gamma", "delta"]);
        assert_eq!(lines[1].width, 100.0);
    }

    #[test]
    fn test_wrap_keeps_long_token() {
        let font = mono_font();
        let lines = wrap_text(&font, 50.0, 20.0, "ab supercalifragilistic cd");
        assert_eq!(texts(&lines), vec!["ab", "supercalifragilistic", "cd"]);
        assert!(lines[1].width > 50.0);
    }

    #[test]
    fn test_wrap_forced_newlines() {
        let font = mono_font();
        let lines = wrap_text(&font, 1000.0, 20.0, "one\ntwo\n\nthree");
        assert_eq!(texts(&lines), vec!["one", "two", "", "three"]);
    }

    #[test]
    fn test_wrap_empty_input() {
        let font = mono_font();
        let lines = wrap_text(&font, 100.0, 20.0, "");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "");
        assert_eq!(lines[0].width, 0.0);
    }

    #[test]
    fn test_wrap_multibyte_text() {
        let font = mono_font();
        let lines = wrap_text(&font, 60.0, 20.0, "grüße, straße");
        assert_eq!(texts(&lines), vec!["grüße,", "straße"]);
    }

    #[test]
    fn test_fit_shrinks_until_it_fits() {
        let font = mono_font();
        let rect = Rect::new(0.0, 0.0, 100.0, 30.0);
        let block = fit_text_in_box(&font, rect, 40.0, "hello world", &FitOptions::default());
        assert!(block.size < 40.0);
        assert!(block.size >= 6.0);
        let bounds = block.bounds();
        assert!(bounds.width() <= 100.0);
        assert!(bounds.height() <= 30.0 + 1e-3);
    }

    #[test]
    fn test_fit_alignment() {
        let font = mono_font();
        let rect = Rect::new(10.0, 20.0, 200.0, 100.0);
        let opts = FitOptions::default()
            .with_halign(HorizontalAlign::Right)
            .with_valign(VerticalAlign::Bottom);
        let block = fit_text_in_box(&font, rect, 20.0, "abc", &opts);
        assert_eq!(block.size, 20.0);
        let line = &block.lines[0];
        assert_eq!(line.rect.right(), 210.0);
        assert!((line.rect.bottom() - 120.0).abs() < 1e-4);

        let opts = FitOptions::default()
            .with_halign(HorizontalAlign::Left)
            .with_valign(VerticalAlign::Top);
        let block = fit_text_in_box(&font, rect, 20.0, "abc", &opts);
        assert_eq!(block.lines[0].rect.left(), 10.0);
        assert_eq!(block.lines[0].rect.top(), 20.0);
    }

    #[test]
    fn test_fit_stops_at_min_size() {
        let font = mono_font();
        let rect = Rect::new(0.0, 0.0, 10.0, 10.0);
        let block = fit_text_in_box(&font, rect, 50.0, "does not fit at all", &FitOptions::default());
        assert_eq!(block.size, 6.0);
        assert!(!block.lines.is_empty());
    }

    #[test]
    fn test_align_shift() {
        assert_eq!(HorizontalAlign::Left.shift(10.0), 0.0);
        assert_eq!(HorizontalAlign::Right.shift(10.0), 10.0);
        assert_eq!(HorizontalAlign::Center.shift(10.0), 5.0);
        assert_eq!(VerticalAlign::Middle.shift(-4.0), -2.0);
    }

    #[test]
    fn test_null_font_text_has_no_extent() {
        let font = GlyphFont::null();
        let lines = wrap_text(&font, 50.0, 20.0, "hello world foo");
        assert_eq!(texts(&lines), vec!["hello world foo"]);
        assert_eq!(lines[0].width, 0.0);

        let rect = Rect::new(0.0, 0.0, 50.0, 50.0);
        let block = fit_text_in_box(&font, rect, 20.0, "hello world foo", &FitOptions::default());
        assert_eq!(block.size, 20.0);
        assert_eq!(block.lines.len(), 1);
        assert_eq!(block.lines[0].rect.width(), 0.0);
    }
}
