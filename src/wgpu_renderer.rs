// GPU rendering module
// Draws the image as a textured quad placed at the view transform's
// destination rectangle, straight onto the raw Wayland surface

use crate::geometry::Rect;
use crate::image_loader::ImageData;
use crate::renderer::surface_size;
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use raw_window_handle::{
    RawDisplayHandle, RawWindowHandle, WaylandDisplayHandle, WaylandWindowHandle,
};
use std::ptr::NonNull;

/// Destination rectangle in normalized device coordinates:
/// left, bottom, right, top
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
struct Uniforms {
    rect: [f32; 4],
}

impl Uniforms {
    /// Convert a top-left-origin pixel rect on a `width`x`height` surface
    fn from_dest_rect(dest: Rect, width: u32, height: u32) -> Self {
        let w = width.max(1) as f32;
        let h = height.max(1) as f32;
        Self {
            rect: [
                dest.x / w * 2.0 - 1.0,
                1.0 - dest.bottom() / h * 2.0,
                dest.right() / w * 2.0 - 1.0,
                1.0 - dest.y / h * 2.0,
            ],
        }
    }
}

/// The uploaded image: mip-chained texture plus its bind group
struct ImageTexture {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

pub struct WgpuRenderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    image: Option<ImageTexture>,
}

impl std::fmt::Debug for WgpuRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuRenderer")
            .field("width", &self.config.width)
            .field("height", &self.config.height)
            .field("has_image", &self.image.is_some())
            .finish()
    }
}

impl WgpuRenderer {
    /// Create a new WgpuRenderer from raw Wayland display and surface pointers
    ///
    /// The display and surface must outlive the renderer.
    pub fn new(
        display_ptr: *mut std::ffi::c_void,
        surface_ptr: *mut std::ffi::c_void,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        info!("Initializing wgpu renderer with size {}x{}", width, height);

        let display = NonNull::new(display_ptr).context("Display pointer is null")?;
        let window = NonNull::new(surface_ptr).context("Surface pointer is null")?;

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::VULKAN | wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: RawDisplayHandle::Wayland(WaylandDisplayHandle::new(display)),
                raw_window_handle: RawWindowHandle::Wayland(WaylandWindowHandle::new(window)),
            })?
        };

        pollster::block_on(Self::init_async(surface, instance, width, height))
    }

    async fn init_async(
        surface: wgpu::Surface<'static>,
        instance: wgpu::Instance,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("Failed to find an appropriate adapter")?;

        info!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: None,
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("Failed to create device")?;

        let config = surface_config(&surface.get_capabilities(&adapter), width, height)?;
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("image shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });

        // Bind group layouts are derived from the shader
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("image pipeline"),
            layout: None,
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("dest rect"),
            size: std::mem::size_of::<Uniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("dest rect"),
            layout: &pipeline.get_bind_group_layout(1),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        // Trilinear so zoomed-out views read from the mip chain
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipeline,
            sampler,
            uniform_buffer,
            uniform_bind_group,
            image: None,
        })
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        let (width, height) = surface_size(new_width, new_height);
        if width != self.config.width || height != self.config.height {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            debug!("Resized to {}x{}", width, height);
        }
    }

    /// Replace the displayed image; `None` drops the texture
    pub fn set_image(&mut self, image: Option<&ImageData>) -> Result<()> {
        self.image = match image {
            Some(image) => Some(self.upload(image)?),
            None => None,
        };
        Ok(())
    }

    fn upload(&self, image: &ImageData) -> Result<ImageTexture> {
        let max = self.device.limits().max_texture_dimension_2d;

        // Levels the device cannot hold are skipped; the rest of the chain
        // becomes the texture's mip levels
        let levels: Vec<_> = image
            .levels()
            .skip_while(|l| l.width > max || l.height > max)
            .collect();
        let Some(base) = levels.first().copied() else {
            bail!(
                "Image {}x{} exceeds max texture size {}",
                image.width,
                image.height,
                max
            );
        };

        debug!(
            "Uploading {}x{} texture with {} mip levels",
            base.width,
            base.height,
            levels.len()
        );

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("image"),
            size: wgpu::Extent3d {
                width: base.width,
                height: base.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: levels.len() as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            // Pixels are kept in BGRA order for the shm path
            format: wgpu::TextureFormat::Bgra8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (mip_level, level) in levels.iter().enumerate() {
            let extent = wgpu::Extent3d {
                width: level.width,
                height: level.height,
                depth_or_array_layers: 1,
            };
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: mip_level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                level.data,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * level.width),
                    rows_per_image: Some(level.height),
                },
                extent,
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("image"),
            layout: &self.pipeline.get_bind_group_layout(0),
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

        Ok(ImageTexture {
            _texture: texture,
            bind_group,
        })
    }

    /// Present a frame. Returns `Ok(false)` when the surface was not ready
    /// and nothing was shown.
    ///
    /// With no texture or no `dest` only the black background is drawn.
    pub fn render(&mut self, dest: Option<Rect>) -> Result<bool> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Timeout) => {
                debug!("Surface timeout, skipping frame");
                return Ok(false);
            }
            Err(e @ (wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost)) => {
                debug!("Surface {:?}, reconfiguring", e);
                self.surface.configure(&self.device, &self.config);
                return Ok(false);
            }
            Err(e) => {
                warn!("Surface error: {:?}", e);
                return Err(e.into());
            }
        };

        let quad = match (&self.image, dest) {
            (Some(image), Some(dest)) if !dest.is_empty() => {
                let uniforms = Uniforms::from_dest_rect(dest, self.config.width, self.config.height);
                self.queue
                    .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
                Some(&image.bind_group)
            }
            _ => None,
        };

        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let Some(bind_group) = quad {
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, bind_group, &[]);
                pass.set_bind_group(1, &self.uniform_bind_group, &[]);
                pass.draw(0..4, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        Ok(true)
    }
}

/// Pick an sRGB format and opaque compositing (the viewer always paints a
/// black background)
fn surface_config(
    caps: &wgpu::SurfaceCapabilities,
    width: u32,
    height: u32,
) -> Result<wgpu::SurfaceConfiguration> {
    debug!("Surface capabilities: {:?}", caps);

    let Some(&first_format) = caps.formats.first() else {
        bail!("Surface reports no supported formats");
    };
    let format = caps
        .formats
        .iter()
        .copied()
        .find(|f| f.is_srgb())
        .unwrap_or(first_format);

    let alpha_mode = if caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::Opaque) {
        wgpu::CompositeAlphaMode::Opaque
    } else {
        caps.alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto)
    };
    info!("Surface format {:?}, alpha mode {:?}", format, alpha_mode);

    let (width, height) = surface_size(width, height);
    Ok(wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width,
        height,
        present_mode: wgpu::PresentMode::Fifo,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    })
}
