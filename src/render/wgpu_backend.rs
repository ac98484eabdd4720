// SPDX-License-Identifier: GPL-3.0-only

//! wgpu presentation surface
//!
//! Each backend owns its own instance, surface, adapter and device, created
//! on the render thread when it starts. The surface is configured with a
//! premultiplied composite alpha mode where the platform offers one, so the
//! transparent clear and the blended quad show whatever lies behind the
//! window.

use super::backend::{RenderBackend, SurfaceProvider};
use crate::config::{PresentModePreference, RenderSettings};
use crate::constants::{packed, render as render_consts};
use crate::errors::{RenderError, RenderResult, ShaderError};
use crate::gpu::{self, GpuDeviceInfo};
use crate::media::PackedFrame;
use crate::shaders::{FRAGMENT_ENTRY, FULLSCREEN_QUAD, ShaderProgram, UniformBlock, VERTEX_ENTRY};
use std::sync::Arc;
use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;

/// Surface creation options
#[derive(Debug, Clone, Copy, Default)]
pub struct GpuOptions {
    pub prefer_low_power: bool,
    pub present_mode: PresentModePreference,
}

impl From<&RenderSettings> for GpuOptions {
    fn from(settings: &RenderSettings) -> Self {
        Self {
            prefer_low_power: settings.prefer_low_power,
            present_mode: settings.present_mode,
        }
    }
}

/// Native window the player draws into
#[derive(Clone)]
pub struct WgpuSurface {
    window: Arc<dyn wgpu::WindowHandle>,
    options: GpuOptions,
}

impl WgpuSurface {
    pub fn new(window: Arc<dyn wgpu::WindowHandle>, options: GpuOptions) -> Self {
        Self { window, options }
    }

    /// Surface using the adapter and pacing choices from `[render]`
    pub fn from_settings(window: Arc<dyn wgpu::WindowHandle>, settings: &RenderSettings) -> Self {
        Self::new(window, GpuOptions::from(settings))
    }
}

impl SurfaceProvider for WgpuSurface {
    fn create_backend(&self, width: u32, height: u32) -> RenderResult<Box<dyn RenderBackend>> {
        let backend = WgpuBackend::new(self.window.clone(), width, height, self.options)?;
        Ok(Box::new(backend))
    }
}

/// Pipeline objects built from the composite program
struct CompositePipeline {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
}

/// Packed-frame texture and the bind group that samples it
struct PackedTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// Frame between `begin_frame` and `present`
struct InFlight {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    info: GpuDeviceInfo,
    pipeline: Option<CompositePipeline>,
    texture: Option<PackedTexture>,
    frame: Option<InFlight>,
}

impl WgpuBackend {
    pub fn new(
        window: Arc<dyn wgpu::WindowHandle>,
        width: u32,
        height: u32,
        options: GpuOptions,
    ) -> RenderResult<Self> {
        let instance = gpu::create_instance();
        let surface = instance
            .create_surface(window)
            .map_err(|e| RenderError::SurfaceCreation(e.to_string()))?;

        let (adapter, device, queue, info) = pollster::block_on(gpu::create_device(
            &instance,
            Some(&surface),
            "alpha_player_surface",
            options.prefer_low_power,
        ))?;

        let caps = surface.get_capabilities(&adapter);
        let format = pick_format(&caps.formats).ok_or_else(|| {
            RenderError::SurfaceCreation("surface is not compatible with the adapter".into())
        })?;
        let alpha_mode = pick_alpha_mode(&caps.alpha_modes);
        let present_mode = pick_present_mode(&caps.present_modes, options.present_mode);

        if alpha_mode == wgpu::CompositeAlphaMode::Opaque {
            warn!("Surface only supports opaque composition, transparency will not show");
        }

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(render_consts::MIN_SURFACE_EXTENT),
            height: height.max(render_consts::MIN_SURFACE_EXTENT),
            present_mode,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        info!(
            adapter = %info.adapter_name,
            backend = ?info.backend,
            format = ?format,
            alpha_mode = ?alpha_mode,
            present_mode = ?present_mode,
            width = config.width,
            height = config.height,
            "GPU surface configured"
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            info,
            pipeline: None,
            texture: None,
            frame: None,
        })
    }

    pub fn device_info(&self) -> &GpuDeviceInfo {
        &self.info
    }

    fn build_pipeline(&self, program: &ShaderProgram) -> RenderResult<CompositePipeline> {
        let binding = program.uniform_binding();
        if binding != Some((0, 2)) {
            return Err(ShaderError::Link(format!(
                "grading uniform block expected at group 0 binding 2, found {:?}",
                binding
            ))
            .into());
        }
        let position = program
            .resolve_attribute("position")
            .ok_or_else(|| ShaderError::Link("vertex stage has no 'position' input".into()))?;
        let texcoord = program
            .resolve_attribute("texcoord")
            .ok_or_else(|| ShaderError::Link("vertex stage has no 'texcoord' input".into()))?;

        // Anything the driver rejects from here on is a link failure
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("composite_vertex"),
                source: wgpu::ShaderSource::Wgsl(program.vertex_source().into()),
            });
        let fragment_module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("composite_fragment"),
                source: wgpu::ShaderSource::Wgsl(program.fragment_source().into()),
            });

        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("composite_bind_group_layout"),
                    entries: &[
                        // Packed frame
                        wgpu::BindGroupLayoutEntry {
                            binding: 0,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Texture {
                                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                                view_dimension: wgpu::TextureViewDimension::D2,
                                multisampled: false,
                            },
                            count: None,
                        },
                        wgpu::BindGroupLayoutEntry {
                            binding: 1,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                            count: None,
                        },
                        // Grading uniforms
                        wgpu::BindGroupLayoutEntry {
                            binding: 2,
                            visibility: wgpu::ShaderStages::FRAGMENT,
                            ty: wgpu::BindingType::Buffer {
                                ty: wgpu::BufferBindingType::Uniform,
                                has_dynamic_offset: false,
                                min_binding_size: None,
                            },
                            count: None,
                        },
                    ],
                });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("composite_pipeline_layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let attributes = [
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 0,
                shader_location: position,
            },
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 8,
                shader_location: texcoord,
            },
        ];

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("composite_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex_module,
                    entry_point: Some(VERTEX_ENTRY),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<crate::shaders::QuadVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment_module,
                    entry_point: Some(FRAGMENT_ENTRY),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        // Blend state belongs to this pipeline only
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
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
                cache: None,
            });

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ShaderError::Link(err.to_string()).into());
        }

        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("packed_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grade_uniforms"),
            size: program.uniform_block().len() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("fullscreen_quad"),
                contents: bytemuck::cast_slice(&FULLSCREEN_QUAD),
                usage: wgpu::BufferUsages::VERTEX,
            });

        Ok(CompositePipeline {
            pipeline,
            bind_group_layout,
            sampler,
            uniform_buffer,
            vertex_buffer,
        })
    }

    fn create_texture(&self, pipeline: &CompositePipeline, width: u32, height: u32) -> PackedTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("packed_frame"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite_bind_group"),
            layout: &pipeline.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&pipeline.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: pipeline.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        debug!(width, height, "Packed frame texture created");
        PackedTexture {
            texture,
            bind_group,
            width,
            height,
        }
    }
}

impl RenderBackend for WgpuBackend {
    fn prepare(&mut self, program: &ShaderProgram) -> RenderResult<()> {
        self.pipeline = Some(self.build_pipeline(program)?);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(render_consts::MIN_SURFACE_EXTENT);
        let height = height.max(render_consts::MIN_SURFACE_EXTENT);
        if self.config.width == width && self.config.height == height {
            return;
        }
        // A stale frame holds the old swapchain image
        self.frame = None;
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        debug!(width, height, "Surface reconfigured");
    }

    fn upload(&mut self, frame: &PackedFrame) -> RenderResult<()> {
        let Some(pipeline) = self.pipeline.as_ref() else {
            return Err(RenderError::InvalidState("upload before prepare"));
        };
        if frame.width < packed::HALVES || frame.height == 0 {
            return Err(RenderError::Upload(format!(
                "packed frame {}x{} is too small",
                frame.width, frame.height
            )));
        }

        let needs_creation = self
            .texture
            .as_ref()
            .is_none_or(|t| t.width != frame.width || t.height != frame.height);
        if needs_creation {
            self.texture = Some(self.create_texture(pipeline, frame.width, frame.height));
        }
        let Some(target) = self.texture.as_ref() else {
            return Err(RenderError::Upload("texture unavailable".into()));
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &frame.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(frame.stride),
                rows_per_image: Some(frame.height),
            },
            wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn discard_texture(&mut self) {
        if self.texture.take().is_some() {
            debug!("Packed frame texture dropped");
        }
    }

    fn begin_frame(&mut self) -> RenderResult<()> {
        self.frame = None;

        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.surface.configure(&self.device, &self.config);
                return Err(RenderError::SurfaceLost(e.to_string()));
            }
            Err(e) => return Err(RenderError::SurfaceLost(e.to_string())),
        };

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("composite_encoder"),
            });

        {
            let _clear = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("transparent_clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }

        self.frame = Some(InFlight {
            surface_texture,
            view,
            encoder,
        });
        Ok(())
    }

    fn draw_composite(&mut self, uniforms: &UniformBlock) -> RenderResult<bool> {
        let (Some(pipeline), Some(texture)) = (self.pipeline.as_ref(), self.texture.as_ref())
        else {
            return Ok(false);
        };
        let Some(frame) = self.frame.as_mut() else {
            return Err(RenderError::InvalidState("draw_composite without begin_frame"));
        };

        self.queue
            .write_buffer(&pipeline.uniform_buffer, 0, uniforms.as_bytes());

        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("composite_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&pipeline.pipeline);
        pass.set_bind_group(0, &texture.bind_group, &[]);
        pass.set_vertex_buffer(0, pipeline.vertex_buffer.slice(..));
        pass.draw(0..FULLSCREEN_QUAD.len() as u32, 0..1);
        Ok(true)
    }

    fn present(&mut self) -> RenderResult<()> {
        let Some(frame) = self.frame.take() else {
            return Err(RenderError::InvalidState("present without begin_frame"));
        };
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        frame.surface_texture.present();
        Ok(())
    }

    fn release(&mut self) {
        self.frame = None;
        self.texture = None;
        self.pipeline = None;
    }

    fn name(&self) -> &'static str {
        "wgpu"
    }
}

/// Non-sRGB first: the fragment stage already works in display space
fn pick_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .copied()
        .find(|f| !f.is_srgb())
        .or_else(|| formats.first().copied())
}

fn pick_alpha_mode(modes: &[wgpu::CompositeAlphaMode]) -> wgpu::CompositeAlphaMode {
    [
        wgpu::CompositeAlphaMode::PreMultiplied,
        wgpu::CompositeAlphaMode::PostMultiplied,
        wgpu::CompositeAlphaMode::Inherit,
    ]
    .into_iter()
    .find(|m| modes.contains(m))
    .or_else(|| modes.first().copied())
    .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

fn pick_present_mode(
    modes: &[wgpu::PresentMode],
    preference: PresentModePreference,
) -> wgpu::PresentMode {
    let wanted = match preference {
        PresentModePreference::Fifo => wgpu::PresentMode::Fifo,
        PresentModePreference::Mailbox => wgpu::PresentMode::Mailbox,
        PresentModePreference::Immediate => wgpu::PresentMode::Immediate,
    };
    if modes.contains(&wanted) {
        wanted
    } else {
        wgpu::PresentMode::Fifo
    }
}
