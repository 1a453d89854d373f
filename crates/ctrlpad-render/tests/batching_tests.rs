//! Batching behaviour of the quad batcher, observed through the recording backend.

mod common;

use ctrlpad_render::{
    BATCH_QUADS, BoxStyle, Color, GpuCommand, HorizontalAlign, QuadBatcher, RecordingBackend,
    Rect, RendererConfig, TextureHandle,
};
use image::RgbaImage;

fn renderer() -> QuadBatcher<RecordingBackend> {
    common::init_tracing();
    QuadBatcher::new(RecordingBackend::new(4096))
}

fn unit_box(r: &mut QuadBatcher<RecordingBackend>, i: usize) {
    let x = (i % 100) as f32;
    r.draw_box(Rect::new(x, 0.0, 1.0, 1.0), &BoxStyle::new(Color::WHITE));
}

#[test]
fn test_draw_calls_match_batch_capacity() {
    for quads in [0, 1, BATCH_QUADS - 1, BATCH_QUADS, BATCH_QUADS + 1, 2 * BATCH_QUADS, 1000] {
        let mut r = renderer();
        r.backend_mut().clear();
        r.begin_frame(320, 240).unwrap();
        for i in 0..quads {
            unit_box(&mut r, i);
        }
        let stats = r.end_frame();

        let expected = quads.div_ceil(BATCH_QUADS);
        assert_eq!(stats.batches, expected, "{quads} quads");
        assert_eq!(stats.quads, quads);
        assert_eq!(r.backend().draw_calls(), expected);
        assert_eq!(r.backend().quads_drawn(), quads);
        assert!(r.backend().draws().all(|v| v.len() <= BATCH_QUADS * 4 && v.len() % 4 == 0));
    }
}

#[test]
fn test_texture_change_flushes_first() {
    let mut r = renderer();
    let other = r.upload_image(&RgbaImage::new(8, 8));
    r.begin_frame(320, 240).unwrap();
    unit_box(&mut r, 0);
    unit_box(&mut r, 1);
    r.backend_mut().clear();

    r.set_texture(other.handle, 8, 8);
    let cmds = r.backend().commands();
    assert_eq!(cmds.len(), 2);
    assert!(matches!(&cmds[0], GpuCommand::Draw { vertices } if vertices.len() == 8));
    assert_eq!(
        cmds[1],
        GpuCommand::BindTexture {
            texture: other.handle,
            size: [8.0, 8.0],
        }
    );

    // Rebinding the same texture is free.
    r.set_texture(other.handle, 8, 8);
    assert_eq!(r.backend().commands().len(), 2);
    r.end_frame();
}

#[test]
fn test_same_handle_new_size_rebinds() {
    let mut r = renderer();
    let handle = TextureHandle::from_raw(42);
    r.set_texture(handle, 16, 16);
    r.backend_mut().clear();
    r.set_texture(handle, 32, 16);
    assert_eq!(
        r.backend().commands(),
        &[GpuCommand::BindTexture {
            texture: handle,
            size: [32.0, 16.0],
        }]
    );
}

#[test]
fn test_box_radius_clamps_to_circle() {
    let mut r = renderer();
    r.begin_frame(320, 240).unwrap();
    let color = r.color("f30");
    r.draw_box(
        Rect::from_ltrb(0.0, 0.0, 100.0, 100.0),
        &BoxStyle::new(color).with_radius(200.0),
    );
    r.end_frame();

    let quad = r.backend().draws().next().unwrap();
    for vertex in quad {
        assert_eq!(vertex.sdf_size, [50.0, 50.0, 50.0]);
        assert_eq!(vertex.color, [1.0, 0.2, 0.0, 1.0]);
    }
}

#[test]
fn test_batches_preserve_issue_order() {
    let mut r = renderer();
    r.begin_frame(320, 240).unwrap();
    let n = BATCH_QUADS + 10;
    for i in 0..n {
        r.draw_box(
            Rect::new(i as f32, 0.0, 1.0, 1.0),
            &BoxStyle::new(Color::new(i as f32 / n as f32, 0.0, 0.0, 1.0)),
        );
    }
    r.end_frame();

    let xs: Vec<f32> = r
        .backend()
        .draws()
        .flat_map(|v| v.chunks(4).map(|q| q[0].position[0]))
        .collect();
    assert_eq!(xs.len(), n);
    assert!(xs.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_atlas_growth_flushes_queued_text() {
    let config = RendererConfig::default().with_initial_atlas_size(64, 64);
    let mut r = QuadBatcher::with_config(RecordingBackend::new(4096), &config);
    r.add_font_from_parts(common::metrics("Small", 32), &RgbaImage::new(32, 32))
        .unwrap();

    r.begin_frame(320, 240).unwrap();
    r.text_line(0.0, 0.0, 16.0, "Hello", Color::WHITE, HorizontalAlign::Left);
    r.backend_mut().clear();

    // A second font page that does not fit forces the atlas to grow.
    r.add_font_from_parts(common::metrics("Large", 128), &RgbaImage::new(128, 128))
        .unwrap();
    let (w, h) = r.atlas().size();
    assert!(w > 64 || h > 64);

    let cmds = r.backend().commands();
    let draw = cmds.iter().position(|c| matches!(c, GpuCommand::Draw { .. }));
    let upload = cmds
        .iter()
        .position(|c| matches!(c, GpuCommand::UploadTexture { region: None, .. }));
    let bind = cmds.iter().position(|c| matches!(c, GpuCommand::BindTexture { .. }));
    assert!(draw.is_some(), "queued text was not drawn: {cmds:?}");
    assert!(draw < upload && upload < bind, "{cmds:?}");
    assert_eq!(
        cmds[bind.unwrap()],
        GpuCommand::BindTexture {
            texture: r.atlas().texture(),
            size: [w as f32, h as f32],
        }
    );
    r.end_frame();
}

#[test]
fn test_boxes_do_not_touch_texture_binding() {
    let mut r = renderer();
    r.begin_frame(320, 240).unwrap();
    r.backend_mut().clear();
    for i in 0..10 {
        unit_box(&mut r, i);
    }
    r.end_frame();
    assert!(
        r.backend()
            .commands()
            .iter()
            .all(|c| !matches!(c, GpuCommand::BindTexture { .. }))
    );
}
