//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use ctrlpad_render::FontMetrics;

/// Route `tracing` output to the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Advance in em units used by [`metrics_json`] for `cp`.
pub fn advance(cp: u32) -> f32 {
    match char::from_u32(cp) {
        Some('i' | 'l' | '\'' | '.' | ',' | ' ') => 0.25,
        Some('m' | 'w' | 'M' | 'W') => 0.75,
        _ => 0.5,
    }
}

/// Metrics for a font covering printable ASCII on a `page`x`page` glyph page.
///
/// Letters and digits have images laid out on a 16 pixel grid; everything
/// else is invisible.
pub fn metrics_json(name: &str, page: u32) -> String {
    let glyphs: Vec<String> = (32u32..127)
        .map(|cp| {
            let visible = char::from_u32(cp).is_some_and(|c| c.is_ascii_alphanumeric());
            if !visible {
                return format!(r#"{{ "unicode": {cp}, "advance": {} }}"#, advance(cp));
            }
            let cell = cp - 32;
            let per_row = (page / 16).max(1);
            let (gx, gy) = ((cell % per_row) * 16 % page, (cell / per_row) * 16 % page);
            format!(
                r#"{{ "unicode": {cp}, "advance": {adv},
                     "planeBounds": {{ "left": 0.0, "bottom": -0.2, "right": {adv}, "top": 0.8 }},
                     "atlasBounds": {{ "left": {l}, "bottom": {b}, "right": {r}, "top": {t} }} }}"#,
                adv = advance(cp),
                l = gx,
                b = gy,
                r = gx + 16,
                t = gy + 16,
            )
        })
        .collect();
    format!(
        r#"{{
            "name": "{name}",
            "atlas": {{ "type": "msdf", "width": {page}, "height": {page}, "yOrigin": "bottom" }},
            "metrics": {{ "emSize": 1, "lineHeight": 1.25, "ascender": 0.9, "descender": -0.25,
                          "underlineY": -0.1, "underlineThickness": 0.05 }},
            "glyphs": [{}],
            "kerning": [
                {{ "unicode1": 65, "unicode2": 86, "advance": -0.1 }},
                {{ "unicode1": 84, "unicode2": 111, "advance": -0.05 }}
            ]
        }}"#,
        glyphs.join(",")
    )
}

/// Parsed [`metrics_json`].
pub fn metrics(name: &str, page: u32) -> FontMetrics {
    FontMetrics::from_json(&metrics_json(name, page)).unwrap()
}
