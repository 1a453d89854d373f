//! Graphics context managing shared GPU resources.
//!
//! The [`GraphicsContext`] owns the wgpu instance, adapter, device and
//! queue. A panel has one display, so there is one context per process;
//! [`WgpuBackend`](crate::WgpuBackend) takes its device from here.

use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use crate::config::GraphicsConfig;
use crate::error::{RenderError, RenderResult};

/// Global graphics context instance.
static GRAPHICS_CONTEXT: OnceLock<GraphicsContext> = OnceLock::new();

/// The wgpu objects shared by everything that renders.
#[derive(Debug)]
pub struct GpuResources {
    /// The wgpu instance for creating surfaces and requesting adapters.
    pub instance: wgpu::Instance,
    /// The graphics adapter (represents a physical GPU).
    pub adapter: wgpu::Adapter,
    /// The logical device for creating GPU resources.
    pub device: wgpu::Device,
    /// The command queue for submitting GPU work.
    pub queue: wgpu::Queue,
}

impl GpuResources {
    /// Create new GPU resources with the given configuration.
    pub fn new(config: &GraphicsConfig) -> RenderResult<Self> {
        let instance_flags = if config.debug_validation {
            wgpu::InstanceFlags::debugging()
        } else {
            wgpu::InstanceFlags::empty()
        };

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: config.backends,
            flags: instance_flags,
            ..Default::default()
        });

        debug!(
            target: "ctrlpad_render::context",
            backends = ?config.backends,
            "created wgpu instance"
        );

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.power_preference,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or(RenderError::NoAdapter)?;

        let adapter_info = adapter.get_info();
        info!(
            target: "ctrlpad_render::context",
            name = adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            max_texture_size = adapter.limits().max_texture_dimension_2d,
            "selected graphics adapter"
        );

        // The atlas may grow up to whatever the adapter supports.
        let required_limits = wgpu::Limits {
            max_texture_dimension_2d: adapter.limits().max_texture_dimension_2d,
            ..config.required_limits.clone()
        };

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("ctrlpad-device"),
                required_features: config.required_features,
                required_limits,
                memory_hints: wgpu::MemoryHints::MemoryUsage,
            },
            None,
        ))?;

        debug!(
            target: "ctrlpad_render::context",
            "created graphics device and queue"
        );

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

/// The process-wide graphics context.
///
/// # Example
///
/// ```no_run
/// use ctrlpad_render::{GraphicsConfig, GraphicsContext};
///
/// let ctx = GraphicsContext::init(GraphicsConfig::default()).unwrap();
/// assert!(ctx.device().limits().max_texture_dimension_2d >= 2048);
/// ```
pub struct GraphicsContext {
    /// The shared GPU resources.
    resources: Arc<GpuResources>,
    /// Configuration used to create this context.
    config: GraphicsConfig,
}

impl GraphicsContext {
    /// Initialize the global graphics context.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The context has already been initialized
    /// - No suitable graphics adapter was found
    /// - Device creation failed
    pub fn init(config: GraphicsConfig) -> RenderResult<&'static GraphicsContext> {
        if GRAPHICS_CONTEXT.get().is_some() {
            return Err(RenderError::AlreadyInitialized);
        }
        let resources = GpuResources::new(&config)?;

        let context = GraphicsContext {
            resources: Arc::new(resources),
            config,
        };

        GRAPHICS_CONTEXT
            .set(context)
            .map_err(|_| RenderError::AlreadyInitialized)?;

        Self::get()
    }

    /// Get the global graphics context, if it has been initialized.
    pub fn try_get() -> Option<&'static GraphicsContext> {
        GRAPHICS_CONTEXT.get()
    }

    /// Get the global graphics context.
    ///
    /// Fails with [`RenderError::NotInitialized`] before [`init`](Self::init).
    pub fn get() -> RenderResult<&'static GraphicsContext> {
        GRAPHICS_CONTEXT.get().ok_or(RenderError::NotInitialized)
    }

    /// Get the wgpu instance.
    pub fn instance(&self) -> &wgpu::Instance {
        &self.resources.instance
    }

    /// Get the graphics adapter.
    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.resources.adapter
    }

    /// Get the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.resources.device
    }

    /// Get the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.resources.queue
    }

    /// Get shared access to all GPU resources.
    pub fn resources(&self) -> Arc<GpuResources> {
        Arc::clone(&self.resources)
    }

    /// Get the configuration used to create this context.
    pub fn config(&self) -> &GraphicsConfig {
        &self.config
    }

    /// Get information about the graphics adapter.
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.resources.adapter.get_info()
    }
}

impl std::fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let info = self.adapter_info();
        f.debug_struct("GraphicsContext")
            .field("adapter", &info.name)
            .field("backend", &info.backend)
            .field("device_type", &info.device_type)
            .finish()
    }
}
