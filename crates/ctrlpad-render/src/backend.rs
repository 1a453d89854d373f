//! The graphics capability the quad batcher draws through.
//!
//! [`GpuBackend`] is the seam between batching and the graphics API: the
//! batcher decides *what* to draw and when to flush, a backend turns that
//! into API calls. [`WgpuBackend`](crate::WgpuBackend) drives a real GPU;
//! [`RecordingBackend`] records the calls, which is what the tests and
//! headless tools use.

use image::RgbaImage;

use crate::atlas::{AtlasRect, FALLBACK_MAX_ATLAS_SIZE};
use crate::vertex::Vertex;

/// Opaque identifier of a texture owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(u32);

impl TextureHandle {
    /// Wrap a backend-specific texture id.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The backend-specific texture id.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Graphics operations required by the quad batcher.
///
/// All calls happen on the rendering thread, in issue order.
pub trait GpuBackend {
    /// Largest supported 2D texture dimension.
    fn max_texture_size(&self) -> u32;

    /// Create an empty RGBA8 texture.
    fn create_texture(&mut self) -> TextureHandle;

    /// Upload texture contents.
    ///
    /// With `region == None` the texture is (re)allocated at the size of
    /// `image` and filled completely; otherwise only `region` is copied
    /// from `image` into the existing texture.
    fn upload_texture(&mut self, texture: TextureHandle, image: &RgbaImage, region: Option<AtlasRect>);

    /// Set the `uArea` uniform (scale.xy, translate.xy).
    fn set_projection(&mut self, area: [f32; 4]);

    /// Bind `texture` for subsequent draws and set the `uTexSize` uniform.
    fn bind_texture(&mut self, texture: TextureHandle, size: [f32; 2]);

    /// Draw `vertices` (a whole number of quads) with one indexed draw call.
    fn draw_quads(&mut self, vertices: &[Vertex]);

    /// Called once all batches of a frame have been drawn.
    fn end_frame(&mut self) {}
}

/// A call recorded by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    /// A texture was created.
    CreateTexture(TextureHandle),
    /// Texture contents were uploaded.
    UploadTexture {
        texture: TextureHandle,
        size: (u32, u32),
        region: Option<AtlasRect>,
    },
    /// The projection uniform changed.
    SetProjection([f32; 4]),
    /// A texture was bound.
    BindTexture {
        texture: TextureHandle,
        size: [f32; 2],
    },
    /// One indexed draw call.
    Draw { vertices: Vec<Vertex> },
    /// A frame ended.
    EndFrame,
}

/// A backend that records every call instead of talking to a GPU.
#[derive(Debug, Clone)]
pub struct RecordingBackend {
    max_texture_size: u32,
    next_texture: u32,
    commands: Vec<GpuCommand>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new(FALLBACK_MAX_ATLAS_SIZE)
    }
}

impl RecordingBackend {
    /// Create a recorder reporting `max_texture_size` as the device limit.
    pub fn new(max_texture_size: u32) -> Self {
        Self {
            max_texture_size,
            next_texture: 1,
            commands: Vec::new(),
        }
    }

    /// Every recorded call, oldest first.
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Forget the recorded calls.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Vertex data of every draw call, oldest first.
    pub fn draws(&self) -> impl Iterator<Item = &[Vertex]> {
        self.commands.iter().filter_map(|c| match c {
            GpuCommand::Draw { vertices } => Some(vertices.as_slice()),
            _ => None,
        })
    }

    /// Number of draw calls recorded.
    pub fn draw_calls(&self) -> usize {
        self.draws().count()
    }

    /// Total number of quads drawn.
    pub fn quads_drawn(&self) -> usize {
        self.draws().map(|v| v.len() / 4).sum()
    }
}

impl GpuBackend for RecordingBackend {
    fn max_texture_size(&self) -> u32 {
        self.max_texture_size
    }

    fn create_texture(&mut self) -> TextureHandle {
        let handle = TextureHandle::from_raw(self.next_texture);
        self.next_texture += 1;
        self.commands.push(GpuCommand::CreateTexture(handle));
        handle
    }

    fn upload_texture(&mut self, texture: TextureHandle, image: &RgbaImage, region: Option<AtlasRect>) {
        self.commands.push(GpuCommand::UploadTexture {
            texture,
            size: image.dimensions(),
            region,
        });
    }

    fn set_projection(&mut self, area: [f32; 4]) {
        self.commands.push(GpuCommand::SetProjection(area));
    }

    fn bind_texture(&mut self, texture: TextureHandle, size: [f32; 2]) {
        self.commands.push(GpuCommand::BindTexture { texture, size });
    }

    fn draw_quads(&mut self, vertices: &[Vertex]) {
        self.commands.push(GpuCommand::Draw {
            vertices: vertices.to_vec(),
        });
    }

    fn end_frame(&mut self) {
        self.commands.push(GpuCommand::EndFrame);
    }
}

#[cfg(test)]
mod tests {
    use bytemuck::Zeroable;

    use super::*;

    #[test]
    fn test_recording_backend_hands_out_distinct_textures() {
        let mut backend = RecordingBackend::new(1024);
        let a = backend.create_texture();
        let b = backend.create_texture();
        assert_ne!(a, b);
        assert_eq!(backend.max_texture_size(), 1024);
        assert_eq!(backend.commands().len(), 2);
    }

    #[test]
    fn test_recording_backend_counts_quads() {
        let mut backend = RecordingBackend::default();
        let quad = [Vertex::zeroed(); 4];
        backend.draw_quads(&quad);
        backend.draw_quads(&[quad, quad].concat());
        assert_eq!(backend.draw_calls(), 2);
        assert_eq!(backend.quads_drawn(), 3);
        backend.clear();
        assert_eq!(backend.draw_calls(), 0);
    }
}
