//! Loading fonts from `<base>.json` + `<base>.png` pairs on disk.

mod common;

use std::path::{Path, PathBuf};

use ctrlpad_render::{
    GlyphFont, QuadBatcher, RecordingBackend, RenderError, RendererConfig, TextureAtlas,
    TextureHandle,
};
use image::{Rgba, RgbaImage};
use tempfile::TempDir;

/// Write a font pair named `file` into `dir` and return its base path.
fn write_font(dir: &Path, file: &str, json: &str, page: u32) -> PathBuf {
    let base = dir.join(file);
    std::fs::write(base.with_extension("json"), json).unwrap();
    RgbaImage::from_pixel(page, page, Rgba([255, 255, 255, 255]))
        .save(base.with_extension("png"))
        .unwrap();
    base
}

fn atlas() -> TextureAtlas {
    TextureAtlas::new(TextureHandle::from_raw(1), (256, 256), 1024)
}

#[test]
fn test_load_font_pair() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let base = write_font(dir.path(), "sans", &common::metrics_json("Sans", 128), 128);

    let mut atlas = atlas();
    let font = GlyphFont::load(&base, &mut atlas).unwrap();
    assert_eq!(font.name(), "Sans");
    assert_eq!(font.glyph_count(), 95);
    assert_eq!(font.kerning_count(), 2);
    assert_eq!(font.line_height(), 1.25);
    assert!(font.glyph('A' as u32).has_image);
    assert!(atlas.front().len() > 1);
}

#[test]
fn test_load_ignores_extension() {
    let dir = TempDir::new().unwrap();
    let base = write_font(dir.path(), "sans", &common::metrics_json("Sans", 64), 64);

    let mut atlas = atlas();
    let font = GlyphFont::load(base.with_extension("json"), &mut atlas).unwrap();
    assert_eq!(font.name(), "Sans");
}

#[test]
fn test_name_falls_back_to_file_stem() {
    let dir = TempDir::new().unwrap();
    let json = r#"{ "metrics": { "lineHeight": 1.0 }, "glyphs": [ { "unicode": 32, "advance": 0.3 } ] }"#;
    let base = write_font(dir.path(), "Panel-Bold", json, 16);

    let mut atlas = atlas();
    let font = GlyphFont::load(&base, &mut atlas).unwrap();
    assert_eq!(font.name(), "Panel-Bold");
}

#[test]
fn test_missing_page_is_font_load_error() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("lonely");
    std::fs::write(base.with_extension("json"), common::metrics_json("Lonely", 64)).unwrap();

    let mut atlas = atlas();
    let err = GlyphFont::load(&base, &mut atlas).unwrap_err();
    match err {
        RenderError::FontLoad { path, .. } => assert_eq!(path, base.with_extension("png")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(atlas.front().len(), 1);
}

#[test]
fn test_malformed_metrics_keep_current_font() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let good = write_font(dir.path(), "good", &common::metrics_json("Good", 64), 64);
    let bad = write_font(dir.path(), "bad", "{ \"glyphs\": [ oops ] }", 64);

    let mut renderer = QuadBatcher::new(RecordingBackend::default());
    assert_eq!(renderer.add_font(&good).as_deref(), Some("Good"));
    assert_eq!(renderer.add_font(&bad), None);
    assert_eq!(renderer.font().name(), "Good");
    assert_eq!(renderer.set_font(None).name(), "Good");
}

#[test]
fn test_config_loads_fonts_in_order() {
    let dir = TempDir::new().unwrap();
    let first = write_font(dir.path(), "first", &common::metrics_json("First", 64), 64);
    let second = write_font(dir.path(), "second", &common::metrics_json("Second", 64), 64);
    let config = RendererConfig::default()
        .with_font(dir.path().join("missing"))
        .with_font(&first)
        .with_font(&second);

    let mut renderer = QuadBatcher::with_config(RecordingBackend::default(), &config);
    // The first font that loads is the default and is current after setup.
    assert_eq!(renderer.font().name(), "First");
    assert_eq!(renderer.set_font(Some("Second")).name(), "Second");
    assert_eq!(renderer.set_font(Some("Missing")).name(), "First");
}

#[test]
fn test_page_larger_than_atlas_limit() {
    let dir = TempDir::new().unwrap();
    let base = write_font(dir.path(), "huge", &common::metrics_json("Huge", 128), 128);
    let config = RendererConfig::default()
        .with_initial_atlas_size(64, 64)
        .with_max_atlas_size(64);

    let mut renderer = QuadBatcher::with_config(RecordingBackend::default(), &config);
    assert_eq!(renderer.add_font(&base), None);
    assert!(renderer.font().is_null());
    assert_eq!(renderer.atlas().size(), (64, 64));

    let mut atlas = TextureAtlas::new(TextureHandle::from_raw(1), (64, 64), 64);
    let err = GlyphFont::load(&base, &mut atlas).unwrap_err();
    assert!(matches!(err, RenderError::AtlasFull(_)));
}
