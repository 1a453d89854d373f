//! [`GpuBackend`] implementation on wgpu.
//!
//! Every flushed batch becomes one render pass with one indexed draw,
//! submitted right away so that uniform and vertex buffer writes between
//! batches apply in issue order. The first pass of a frame may clear the
//! target; all later passes load it.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

use crate::atlas::AtlasRect;
use crate::backend::{GpuBackend, TextureHandle};
use crate::context::{GpuResources, GraphicsContext};
use crate::error::{RenderError, RenderResult};
use crate::types::Color;
use crate::vertex::{BATCH_QUADS, QUAD_INDICES, VERTEX_SIZE, Vertex, quad_indices};

const VERTEX_SHADER: &str = include_str!("shaders/quad_vs.wgsl");
const FRAGMENT_SHADER: &str = include_str!("shaders/quad_fs.wgsl");

/// Format of every texture created by the backend.
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Uniform block shared by both shader stages.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
struct Uniforms {
    /// Pixel to clip space: scale.xy, translate.xy.
    area: [f32; 4],
    /// Pixel size of the bound texture.
    tex_size: [f32; 2],
    _padding: [f32; 2],
}

struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

/// Where the current frame is drawn.
struct FrameTarget {
    view: wgpu::TextureView,
    /// Clear color for the first pass, if any.
    clear: Option<wgpu::Color>,
}

/// Draws quad batches with wgpu onto a caller-supplied texture view.
///
/// ```no_run
/// use ctrlpad_render::{Color, GraphicsConfig, GraphicsContext, QuadBatcher, WgpuBackend, wgpu};
///
/// GraphicsContext::init(GraphicsConfig::default())?;
/// let backend = WgpuBackend::new(wgpu::TextureFormat::Bgra8UnormSrgb)?;
/// let mut renderer = QuadBatcher::new(backend);
///
/// # let view: wgpu::TextureView = unimplemented!();
/// renderer.backend_mut().set_target(view, Some(Color::BLACK));
/// renderer.begin_frame(800, 480)?;
/// // ... draw ...
/// renderer.end_frame();
/// # Ok::<(), ctrlpad_render::RenderError>(())
/// ```
pub struct WgpuBackend {
    gpu: Arc<GpuResources>,
    pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,

    /// Textures by handle; handle `n` is at index `n - 1`.
    textures: Vec<GpuTexture>,
    bound: Option<TextureHandle>,
    uniforms: Uniforms,
    target: Option<FrameTarget>,
}

impl WgpuBackend {
    /// Create a backend drawing into targets of `format`.
    ///
    /// Requires an initialized [`GraphicsContext`]. Fails with
    /// [`RenderError::ShaderCompile`] if a shader does not validate.
    pub fn new(format: wgpu::TextureFormat) -> RenderResult<Self> {
        let gpu = GraphicsContext::get()?.resources();
        let device = &gpu.device;

        let vs = compile_shader(device, "vertex", VERTEX_SHADER)?;
        let fs = compile_shader(device, "fragment", FRAGMENT_SHADER)?;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("quad_uniform_buffer"),
            size: std::mem::size_of::<Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quad_uniform_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quad_uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quad_texture_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("quad_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quad_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("quad_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vs,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fs,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RenderError::ShaderCompile {
                stage: "pipeline",
                diagnostic: err.to_string(),
                listing: format!(
                    "{}\n{}",
                    numbered_listing(VERTEX_SHADER),
                    numbered_listing(FRAGMENT_SHADER)
                ),
            });
        }

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("quad_vertex_buffer"),
            size: (BATCH_QUADS * 4 * VERTEX_SIZE) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_index_buffer"),
            contents: bytemuck::cast_slice(&quad_indices(BATCH_QUADS)),
            usage: wgpu::BufferUsages::INDEX,
        });

        debug!(
            target: "ctrlpad_render::wgpu_backend",
            format = ?format,
            batch_quads = BATCH_QUADS,
            max_texture_size = device.limits().max_texture_dimension_2d,
            "created wgpu backend"
        );

        Ok(Self {
            gpu,
            pipeline,
            texture_layout,
            sampler,
            uniform_buffer,
            uniform_bind_group,
            vertex_buffer,
            index_buffer,
            textures: Vec::new(),
            bound: None,
            uniforms: Uniforms::default(),
            target: None,
        })
    }

    /// Draw the next frame into `view`, clearing it first if `clear` is set.
    pub fn set_target(&mut self, view: wgpu::TextureView, clear: Option<Color>) {
        self.target = Some(FrameTarget {
            view,
            clear: clear.map(Color::to_wgpu),
        });
    }

    fn slot(&self, handle: TextureHandle) -> Option<usize> {
        (handle.raw() as usize)
            .checked_sub(1)
            .filter(|&i| i < self.textures.len())
    }

    fn allocate(&self, width: u32, height: u32) -> GpuTexture {
        let device = &self.gpu.device;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("quad_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quad_texture_bind_group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });
        GpuTexture { texture, bind_group }
    }

    fn write_uniforms(&self) {
        self.gpu
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));
    }

    /// Take the clear color of the first pass of the frame.
    fn load_op(&mut self) -> wgpu::LoadOp<wgpu::Color> {
        match self.target.as_mut().and_then(|t| t.clear.take()) {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        }
    }
}

impl GpuBackend for WgpuBackend {
    fn max_texture_size(&self) -> u32 {
        self.gpu.device.limits().max_texture_dimension_2d
    }

    fn create_texture(&mut self) -> TextureHandle {
        let texture = self.allocate(1, 1);
        self.textures.push(texture);
        TextureHandle::from_raw(self.textures.len() as u32)
    }

    fn upload_texture(&mut self, handle: TextureHandle, image: &RgbaImage, region: Option<AtlasRect>) {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let Some(index) = self.slot(handle) else {
            warn!(target: "ctrlpad_render::wgpu_backend", handle = handle.raw(), "upload to unknown texture");
            return;
        };

        let region = match region {
            Some(region) => region,
            None => {
                let size = self.textures[index].texture.size();
                if (size.width, size.height) != (width, height) {
                    self.textures[index] = self.allocate(width, height);
                    debug!(
                        target: "ctrlpad_render::wgpu_backend",
                        handle = handle.raw(), width, height,
                        "allocated texture"
                    );
                }
                AtlasRect::new(0, 0, width, height)
            }
        };

        let offset = 4 * (u64::from(region.y0) * u64::from(width) + u64::from(region.x0));
        self.gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.textures[index].texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: region.x0,
                    y: region.y0,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(region.height()),
            },
            wgpu::Extent3d {
                width: region.width(),
                height: region.height(),
                depth_or_array_layers: 1,
            },
        );
    }

    fn set_projection(&mut self, area: [f32; 4]) {
        self.uniforms.area = area;
        self.write_uniforms();
    }

    fn bind_texture(&mut self, texture: TextureHandle, size: [f32; 2]) {
        self.bound = Some(texture);
        self.uniforms.tex_size = size;
        self.write_uniforms();
    }

    fn draw_quads(&mut self, vertices: &[Vertex]) {
        let quads = vertices.len() / 4;
        if quads == 0 {
            return;
        }
        let load = self.load_op();
        let Some(target) = &self.target else {
            warn!(target: "ctrlpad_render::wgpu_backend", quads, "no render target set, dropping batch");
            return;
        };
        let Some(texture) = self.bound.and_then(|h| self.slot(h)).map(|i| &self.textures[i]) else {
            warn!(target: "ctrlpad_render::wgpu_backend", quads, "no texture bound, dropping batch");
            return;
        };

        let gpu = &self.gpu;
        gpu.queue
            .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices));

        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("quad_batch_encoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quad_batch_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_bind_group(1, &texture.bind_group, &[]);
            render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            render_pass.draw_indexed(0..(quads * QUAD_INDICES.len()) as u32, 0, 0..1);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    fn end_frame(&mut self) {
        // A frame without batches still owes its clear.
        if let wgpu::LoadOp::Clear(color) = self.load_op() {
            if let Some(target) = &self.target {
                let mut encoder = self
                    .gpu
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("quad_clear_encoder"),
                    });
                let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("quad_clear_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(color),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                drop(pass);
                self.gpu.queue.submit(std::iter::once(encoder.finish()));
            }
        }
        self.target = None;
    }
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("textures", &self.textures.len())
            .field("bound", &self.bound)
            .field("has_target", &self.target.is_some())
            .finish()
    }
}

/// Compile one WGSL module under a validation error scope.
fn compile_shader(device: &wgpu::Device, stage: &'static str, source: &str) -> RenderResult<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(stage),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(RenderError::ShaderCompile {
            stage,
            diagnostic: err.to_string(),
            listing: numbered_listing(source),
        }),
        None => Ok(module),
    }
}

/// `source` with 1-based line numbers.
fn numbered_listing(source: &str) -> String {
    source
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:4} | {line}\n", i + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphicsConfig;
    use crate::renderer::{BoxStyle, QuadBatcher};
    use crate::types::Rect;

    #[test]
    fn test_uniform_block_layout() {
        assert_eq!(std::mem::size_of::<Uniforms>(), 32);
    }

    #[test]
    fn test_numbered_listing() {
        let listing = numbered_listing("a\nb");
        assert_eq!(listing, "   1 | a\n   2 | b\n");
    }

    #[test]
    fn test_shaders_declare_entry_points() {
        assert!(VERTEX_SHADER.contains("fn vs_main"));
        assert!(FRAGMENT_SHADER.contains("fn fs_main"));
    }

    #[test]
    #[ignore = "requires GPU"]
    fn test_draws_into_offscreen_target() {
        let ctx = GraphicsContext::try_get()
            .map(Ok)
            .unwrap_or_else(|| GraphicsContext::init(GraphicsConfig::default()))
            .unwrap();
        let target = ctx.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("test_target"),
            size: wgpu::Extent3d {
                width: 64,
                height: 64,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let backend = WgpuBackend::new(TEXTURE_FORMAT).unwrap();
        let mut renderer = QuadBatcher::new(backend);
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        renderer.backend_mut().set_target(view, Some(Color::BLACK));
        renderer.begin_frame(64, 64).unwrap();
        renderer.draw_box(Rect::new(8.0, 8.0, 48.0, 48.0), &BoxStyle::new(Color::WHITE).with_radius(8.0));
        let stats = renderer.end_frame();
        assert_eq!(stats.batches, 1);
    }
}
