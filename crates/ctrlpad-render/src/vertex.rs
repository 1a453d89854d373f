//! GPU vertex format and quad index pattern.

use bytemuck::{Pod, Zeroable};

/// Number of `f32` attributes per vertex.
pub const VERTEX_FLOATS: usize = 14;

/// Size of one vertex in bytes.
pub const VERTEX_SIZE: usize = VERTEX_FLOATS * 4;

/// Maximum number of quads per draw call.
///
/// A batch's vertices must fit into 64 KiB so that it can be addressed
/// with 16-bit indices.
pub const BATCH_QUADS: usize = 65536 / (VERTEX_SIZE * 4);

/// Index pattern of one quad, relative to its first vertex.
pub const QUAD_INDICES: [u16; 6] = [0, 2, 1, 1, 2, 3];

/// How the fragment shader treats a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VertexMode {
    /// Rounded box from a signed distance function; the texture is ignored.
    Box = 0,
    /// Multi-channel signed distance field text sampled from the atlas.
    MsdfText = 1,
    /// Plain textured quad.
    Texture = 2,
}

impl VertexMode {
    /// The value written into the vertex attribute.
    #[inline]
    pub fn as_f32(self) -> f32 {
        self as u8 as f32
    }
}

/// One vertex as consumed by the quad shader.
///
/// Layout (14 floats): position.xy, texcoord.xy, mode, sdf size.xyz
/// (half width, half height, radius), border/blur.xy (offset, sharpness),
/// color.rgba.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in pixels.
    pub position: [f32; 2],
    /// Box-local coordinates in box mode, atlas pixels otherwise.
    pub tex_coord: [f32; 2],
    /// A [`VertexMode`] as float.
    pub mode: f32,
    /// Box half extents and corner radius.
    pub sdf_size: [f32; 3],
    /// Edge offset and sharpness factor.
    pub border_blur: [f32; 2],
    /// Straight-alpha RGBA color.
    pub color: [f32; 4],
}

impl Vertex {
    pub(crate) const ATTRIBS: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
        0 => Float32x2, // position
        1 => Float32x2, // tex_coord
        2 => Float32,   // mode
        3 => Float32x3, // sdf_size
        4 => Float32x2, // border_blur
        5 => Float32x4, // color
    ];

    pub(crate) fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Index data for `quads` quads.
pub fn quad_indices(quads: usize) -> Vec<u16> {
    (0..quads)
        .flat_map(|q| QUAD_INDICES.map(|i| i + (q * 4) as u16))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        assert_eq!(std::mem::size_of::<Vertex>(), VERTEX_SIZE);
        assert_eq!(VERTEX_SIZE, 56);
    }

    #[test]
    fn test_batch_fits_16_bit_indices() {
        assert_eq!(BATCH_QUADS, 292);
        assert!(BATCH_QUADS * 4 * VERTEX_SIZE <= 65536);
        assert!(BATCH_QUADS * 4 <= u16::MAX as usize);
    }

    #[test]
    fn test_quad_indices_pattern() {
        let indices = quad_indices(2);
        assert_eq!(indices, vec![0, 2, 1, 1, 2, 3, 4, 6, 5, 5, 6, 7]);
        assert_eq!(*quad_indices(BATCH_QUADS).last().unwrap() as usize, BATCH_QUADS * 4 - 1);
    }

    #[test]
    fn test_attribute_offsets() {
        let offsets: Vec<u64> = Vertex::ATTRIBS.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 8, 16, 20, 32, 40]);
    }
}
