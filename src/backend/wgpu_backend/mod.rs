//! wgpu implementation of [`RenderBackend`].
//!
//! The trait's GL-flavored bind model (uniform ranges, texture units) is
//! tracked as plain state; a complete bind group is materialized and cached
//! the moment a draw is issued. Pass commands are buffered and replayed
//! into a real `wgpu::RenderPass` when the pass ends, and each pass submits
//! its own command buffer so per-pass uniform arena rewrites land in order.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use glam::Vec4;

use crate::backend::traits::*;
use crate::backend::types::*;

/// Uniform-block slot of the backend-owned clip plane block.
const CLIP_PARAMS_SLOT: u32 = 2;

/// Accept-everything plane used while clip distance is disabled.
const CLIP_ACCEPT_ALL: Vec4 = Vec4::new(0.0, -1.0, 0.0, 1.0e6);

struct StoredTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    desc: TextureDescriptor,
}

struct StoredProgram {
    vertex_module: wgpu::ShaderModule,
    fragment_module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    desc: ProgramDescriptor,
}

struct StoredBinding {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: u64,
    index_buffer: u64,
    vertex_base_offset: u64,
    index_format: wgpu::IndexFormat,
}

/// One buffered draw with everything needed to replay it.
struct DrawCall {
    binding: u64,
    bind_group: u64,
    index_count: u32,
    first_index: u32,
}

struct PendingPass {
    target: PassTarget,
    clear: ClearConfig,
    draws: Vec<DrawCall>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct BindGroupKey {
    program: u64,
    ranges: Vec<(u32, u64, u64, u64)>,
    textures: Vec<(u32, u64)>,
}

pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    current_texture: Option<wgpu::SurfaceTexture>,
    backbuffer_depth: Option<StoredTexture>,

    info: DeviceInfo,
    limits: DeviceLimits,

    next_id: u64,
    buffers: HashMap<u64, wgpu::Buffer>,
    textures: HashMap<u64, StoredTexture>,
    programs: HashMap<u64, StoredProgram>,
    bindings: HashMap<u64, StoredBinding>,
    targets: HashMap<u64, RenderTargetDescriptor>,
    bind_groups: HashMap<u64, wgpu::BindGroup>,
    bind_group_cache: HashMap<BindGroupKey, u64>,

    clip_buffer: wgpu::Buffer,

    pending_pass: Option<PendingPass>,
    current_program: Option<u64>,
    current_binding: Option<u64>,
    bound_ranges: HashMap<u32, (u64, u64, u64)>,
    bound_textures: HashMap<u32, u64>,
}

impl WgpuBackend {
    pub fn new(window: Arc<winit::window::Window>) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(window))
    }

    async fn new_async(window: Arc<winit::window::Window>) -> BackendResult<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("no compatible adapter".into()))?;

        let adapter_info = adapter.get_info();
        log::info!("adapter: {} ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("waterline device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let device_limits = device.limits();
        let limits = DeviceLimits {
            max_uniform_block_size: device_limits.max_uniform_buffer_binding_size as u64,
            uniform_offset_alignment: device_limits.min_uniform_buffer_offset_alignment as u64,
        };
        let info = DeviceInfo {
            backend_name: "wgpu".into(),
            version: format!("{} ({:?})", adapter_info.name, adapter_info.backend),
        };

        let clip_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("clip plane"),
            size: 16,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&clip_buffer, 0, bytemuck::bytes_of(&CLIP_ACCEPT_ALL.to_array()));

        let mut backend = Self {
            surface,
            device,
            queue,
            surface_config,
            current_texture: None,
            backbuffer_depth: None,
            info,
            limits,
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            bindings: HashMap::new(),
            targets: HashMap::new(),
            bind_groups: HashMap::new(),
            bind_group_cache: HashMap::new(),
            clip_buffer,
            pending_pass: None,
            current_program: None,
            current_binding: None,
            bound_ranges: HashMap::new(),
            bound_textures: HashMap::new(),
        };
        backend.recreate_backbuffer_depth();
        Ok(backend)
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn recreate_backbuffer_depth(&mut self) {
        let desc = TextureDescriptor {
            label: Some("backbuffer depth".into()),
            width: self.surface_config.width,
            height: self.surface_config.height,
            format: TextureFormat::Depth24Plus,
            usage: TextureUsage::RENDER_ATTACHMENT,
            filter: FilterMode::Nearest,
            address: AddressMode::ClampToEdge,
        };
        self.backbuffer_depth = Some(self.make_texture(&desc));
    }

    fn make_texture(&self, desc: &TextureDescriptor) -> StoredTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: convert_format(desc.format),
            usage: convert_texture_usage(desc.usage, desc.format),
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let filter = match desc.filter {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        };
        let address = match desc.address {
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
        };
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: desc.label.as_deref(),
            address_mode_u: address,
            address_mode_v: address,
            address_mode_w: address,
            mag_filter: filter,
            min_filter: filter,
            ..Default::default()
        });
        StoredTexture {
            texture,
            view,
            sampler,
            desc: desc.clone(),
        }
    }

    fn color_format_of(&self, slot: &Option<TextureFormat>) -> wgpu::TextureFormat {
        match slot {
            None => self.surface_config.format,
            Some(format) => convert_format(*format),
        }
    }

    /// Build the complete group-0 bind group for the current bind state,
    /// reusing a cached one when the state repeats.
    fn materialize_bind_group(&mut self, program_id: u64) -> BackendResult<u64> {
        let program = self
            .programs
            .get(&program_id)
            .ok_or_else(|| BackendError::ResourceNotFound(format!("program #{program_id}")))?;

        let mut ranges: Vec<(u32, u64, u64, u64)> = self
            .bound_ranges
            .iter()
            .map(|(slot, (buffer, offset, size))| (*slot, *buffer, *offset, *size))
            .collect();
        ranges.sort_by_key(|r| r.0);
        let mut textures: Vec<(u32, u64)> =
            self.bound_textures.iter().map(|(unit, tex)| (*unit, *tex)).collect();
        textures.sort_by_key(|t| t.0);

        let key = BindGroupKey { program: program_id, ranges, textures };
        if let Some(existing) = self.bind_group_cache.get(&key) {
            return Ok(*existing);
        }

        let mut entries: Vec<wgpu::BindGroupEntry> = Vec::new();
        for block in &program.desc.bindings.uniform_blocks {
            let (buffer, offset, size) = if block.slot == CLIP_PARAMS_SLOT {
                (&self.clip_buffer, 0u64, 16u64)
            } else {
                let (buffer_id, offset, size) =
                    self.bound_ranges.get(&block.slot).ok_or_else(|| {
                        BackendError::InvalidOperation(format!(
                            "no uniform range bound to slot {} for program '{}'",
                            block.slot, program.desc.name
                        ))
                    })?;
                let buffer = self.buffers.get(buffer_id).ok_or_else(|| {
                    BackendError::ResourceNotFound(format!("buffer #{buffer_id}"))
                })?;
                // The shader-visible block may be larger than the written
                // range (light array tail); extend within the buffer.
                let size = (*size).max(block.min_size).min(buffer.size() - offset);
                (buffer, *offset, size)
            };
            entries.push(wgpu::BindGroupEntry {
                binding: block.resource.binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset,
                    size: NonZeroU64::new(size),
                }),
            });
        }
        for (unit, slot) in program.desc.bindings.textures.iter().enumerate() {
            let tex_id = self.bound_textures.get(&(unit as u32)).ok_or_else(|| {
                BackendError::InvalidOperation(format!(
                    "no texture bound to unit {} for program '{}'",
                    unit, program.desc.name
                ))
            })?;
            let texture = self
                .textures
                .get(tex_id)
                .ok_or_else(|| BackendError::ResourceNotFound(format!("texture #{tex_id}")))?;
            entries.push(wgpu::BindGroupEntry {
                binding: slot.binding,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
        }
        for (unit, slot) in program.desc.bindings.samplers.iter().enumerate() {
            // Pair sampler N with texture unit N, falling back to the last
            // bound unit when a program has fewer units than samplers.
            let unit = (unit as u32).min(program.desc.bindings.textures.len().saturating_sub(1) as u32);
            let tex_id = self.bound_textures.get(&unit).ok_or_else(|| {
                BackendError::InvalidOperation(format!(
                    "no texture bound to unit {} for program '{}'",
                    unit, program.desc.name
                ))
            })?;
            let texture = self
                .textures
                .get(tex_id)
                .ok_or_else(|| BackendError::ResourceNotFound(format!("texture #{tex_id}")))?;
            entries.push(wgpu::BindGroupEntry {
                binding: slot.binding,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            });
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&program.desc.name),
            layout: &program.bind_group_layout,
            entries: &entries,
        });

        let id = self.next_id();
        self.bind_groups.insert(id, bind_group);
        self.bind_group_cache.insert(key, id);
        Ok(id)
    }

    fn flush_pass(&mut self, pass: PendingPass) -> BackendResult<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("pass") });

        let swapchain_view = match pass.target {
            PassTarget::Backbuffer => Some(
                self.current_texture
                    .as_ref()
                    .ok_or_else(|| {
                        BackendError::InvalidOperation("backbuffer pass outside a frame".into())
                    })?
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default()),
            ),
            PassTarget::Offscreen(_) => None,
        };

        let color_load = |clear: &ClearConfig| match clear.color {
            Some(c) => wgpu::LoadOp::Clear(wgpu::Color { r: c.r, g: c.g, b: c.b, a: c.a }),
            None => wgpu::LoadOp::Load,
        };

        let mut color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = Vec::new();
        let mut depth_view: Option<&wgpu::TextureView> = None;
        match pass.target {
            PassTarget::Backbuffer => {
                color_attachments.push(Some(wgpu::RenderPassColorAttachment {
                    view: swapchain_view.as_ref().ok_or_else(|| {
                        BackendError::InvalidOperation("missing swapchain view".into())
                    })?,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load(&pass.clear),
                        store: wgpu::StoreOp::Store,
                    },
                }));
                if pass.clear.depth.is_some() {
                    depth_view = self.backbuffer_depth.as_ref().map(|t| &t.view);
                }
            }
            PassTarget::Offscreen(handle) => {
                let desc = self
                    .targets
                    .get(&handle.0)
                    .ok_or_else(|| BackendError::ResourceNotFound(format!("target {handle:?}")))?;
                for color in &desc.color {
                    let texture = self.textures.get(&color.0).ok_or_else(|| {
                        BackendError::ResourceNotFound(format!("texture {color:?}"))
                    })?;
                    color_attachments.push(Some(wgpu::RenderPassColorAttachment {
                        view: &texture.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: color_load(&pass.clear),
                            store: wgpu::StoreOp::Store,
                        },
                    }));
                }
                if let Some(depth) = &desc.depth {
                    let texture = self.textures.get(&depth.0).ok_or_else(|| {
                        BackendError::ResourceNotFound(format!("texture {depth:?}"))
                    })?;
                    depth_view = Some(&texture.view);
                }
            }
        }

        let depth_attachment = depth_view.map(|view| wgpu::RenderPassDepthStencilAttachment {
            view,
            depth_ops: Some(wgpu::Operations {
                load: match pass.clear.depth {
                    Some(value) => wgpu::LoadOp::Clear(value),
                    None => wgpu::LoadOp::Load,
                },
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: None,
                color_attachments: &color_attachments,
                depth_stencil_attachment: depth_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for draw in &pass.draws {
                let binding = self.bindings.get(&draw.binding).ok_or_else(|| {
                    BackendError::ResourceNotFound(format!("binding #{}", draw.binding))
                })?;
                let vertex_buffer = self.buffers.get(&binding.vertex_buffer).ok_or_else(|| {
                    BackendError::ResourceNotFound(format!("buffer #{}", binding.vertex_buffer))
                })?;
                let index_buffer = self.buffers.get(&binding.index_buffer).ok_or_else(|| {
                    BackendError::ResourceNotFound(format!("buffer #{}", binding.index_buffer))
                })?;
                let bind_group = self.bind_groups.get(&draw.bind_group).ok_or_else(|| {
                    BackendError::ResourceNotFound(format!("bind group #{}", draw.bind_group))
                })?;

                render_pass.set_pipeline(&binding.pipeline);
                render_pass.set_bind_group(0, bind_group, &[]);
                render_pass
                    .set_vertex_buffer(0, vertex_buffer.slice(binding.vertex_base_offset..));
                render_pass.set_index_buffer(index_buffer.slice(..), binding.index_format);
                render_pass.draw_indexed(
                    draw.first_index..draw.first_index + draw.index_count,
                    0,
                    0..1,
                );
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

impl RenderBackend for WgpuBackend {
    fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
        self.recreate_backbuffer_depth();
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.as_deref(),
            size: desc.size,
            usage: convert_buffer_usage(desc.usage),
            mapped_at_creation: false,
        });
        let id = self.next_id();
        self.buffers.insert(id, buffer);
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let handle = self.create_buffer(desc)?;
        self.write_buffer(handle, 0, data)?;
        Ok(handle)
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> BackendResult<()> {
        let buf = self
            .buffers
            .get(&buffer.0)
            .ok_or_else(|| BackendError::ResourceNotFound(format!("buffer {buffer:?}")))?;
        self.queue.write_buffer(buf, offset, data);
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> BackendResult<()> {
        self.buffers
            .remove(&buffer.0)
            .map(|b| b.destroy())
            .ok_or_else(|| BackendError::ResourceNotFound(format!("buffer {buffer:?}")))
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let stored = self.make_texture(desc);
        let id = self.next_id();
        self.textures.insert(id, stored);
        Ok(TextureHandle(id))
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]) -> BackendResult<()> {
        let stored = self
            .textures
            .get(&texture.0)
            .ok_or_else(|| BackendError::ResourceNotFound(format!("texture {texture:?}")))?;
        let bytes_per_row = stored.desc.width * stored.desc.format.bytes_per_pixel();
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &stored.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(stored.desc.height),
            },
            wgpu::Extent3d {
                width: stored.desc.width,
                height: stored.desc.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) -> BackendResult<()> {
        self.textures
            .remove(&texture.0)
            .map(|t| t.texture.destroy())
            .ok_or_else(|| BackendError::ResourceNotFound(format!("texture {texture:?}")))
    }

    fn create_render_target(
        &mut self,
        desc: &RenderTargetDescriptor,
    ) -> BackendResult<RenderTargetHandle> {
        for handle in desc.color.iter().chain(desc.depth.iter()) {
            let stored = self
                .textures
                .get(&handle.0)
                .ok_or_else(|| BackendError::ResourceNotFound(format!("texture {handle:?}")))?;
            if (stored.desc.width, stored.desc.height) != (desc.width, desc.height) {
                return Err(BackendError::IncompleteRenderTarget(format!(
                    "attachment is {}x{}, target is {}x{}",
                    stored.desc.width, stored.desc.height, desc.width, desc.height
                )));
            }
        }
        let id = self.next_id();
        self.targets.insert(id, desc.clone());
        Ok(RenderTargetHandle(id))
    }

    fn destroy_render_target(&mut self, target: RenderTargetHandle) -> BackendResult<()> {
        self.targets
            .remove(&target.0)
            .map(|_| ())
            .ok_or_else(|| BackendError::ResourceNotFound(format!("target {target:?}")))
    }

    fn create_program(&mut self, desc: &ProgramDescriptor) -> BackendResult<ProgramHandle> {
        let vertex_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{} vertex", desc.name)),
            source: wgpu::ShaderSource::Wgsl(desc.vertex_wgsl.clone().into()),
        });
        let fragment_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{} fragment", desc.name)),
            source: wgpu::ShaderSource::Wgsl(desc.fragment_wgsl.clone().into()),
        });

        let mut entries: Vec<wgpu::BindGroupLayoutEntry> = Vec::new();
        for block in &desc.bindings.uniform_blocks {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: block.resource.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            });
        }
        for slot in &desc.bindings.textures {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: slot.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        for slot in &desc.bindings.samplers {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: slot.binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        let bind_group_layout =
            self.device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&desc.name),
                    entries: &entries,
                });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&desc.name),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

        let id = self.next_id();
        self.programs.insert(
            id,
            StoredProgram {
                vertex_module,
                fragment_module,
                bind_group_layout,
                pipeline_layout,
                desc: desc.clone(),
            },
        );
        Ok(ProgramHandle(id))
    }

    fn create_binding(&mut self, desc: &BindingDescriptor) -> BackendResult<BindingHandle> {
        let program = self
            .programs
            .get(&desc.program.0)
            .ok_or_else(|| BackendError::ResourceNotFound(format!("program {:?}", desc.program)))?;

        let attributes: Vec<wgpu::VertexAttribute> = desc
            .attributes
            .iter()
            .map(|attr| wgpu::VertexAttribute {
                format: match attr.component_count {
                    1 => wgpu::VertexFormat::Float32,
                    2 => wgpu::VertexFormat::Float32x2,
                    3 => wgpu::VertexFormat::Float32x3,
                    _ => wgpu::VertexFormat::Float32x4,
                },
                offset: attr.byte_offset as u64,
                shader_location: attr.location,
            })
            .collect();
        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: desc.stride as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        };

        let color_targets: Vec<Option<wgpu::ColorTargetState>> = program
            .desc
            .color_formats
            .iter()
            .map(|slot| {
                Some(wgpu::ColorTargetState {
                    format: self.color_format_of(slot),
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();
        let depth_stencil = program.desc.depth_format.map(|format| wgpu::DepthStencilState {
            format: convert_format(format),
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&program.desc.name),
                layout: Some(&program.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &program.vertex_module,
                    entry_point: "main",
                    compilation_options: Default::default(),
                    buffers: &[vertex_layout],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.fragment_module,
                    entry_point: "main",
                    compilation_options: Default::default(),
                    targets: &color_targets,
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

        let id = self.next_id();
        self.bindings.insert(
            id,
            StoredBinding {
                pipeline,
                vertex_buffer: desc.vertex_buffer.0,
                index_buffer: desc.index_buffer.0,
                vertex_base_offset: desc.vertex_base_offset,
                index_format: match desc.index_format {
                    IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
                    IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
                },
            },
        );
        Ok(BindingHandle(id))
    }

    fn begin_frame(&mut self) -> BackendResult<()> {
        let texture = self
            .surface
            .get_current_texture()
            .map_err(|e| BackendError::InvalidOperation(format!("surface acquire: {e}")))?;
        self.current_texture = Some(texture);
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if let Some(texture) = self.current_texture.take() {
            texture.present();
        }
        Ok(())
    }

    fn begin_pass(&mut self, target: PassTarget, clear: &ClearConfig) -> BackendResult<()> {
        if self.pending_pass.is_some() {
            return Err(BackendError::InvalidOperation("nested render pass".into()));
        }
        self.pending_pass = Some(PendingPass {
            target,
            clear: *clear,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn end_pass(&mut self) -> BackendResult<()> {
        let pass = self
            .pending_pass
            .take()
            .ok_or_else(|| BackendError::InvalidOperation("end_pass without begin".into()))?;
        self.flush_pass(pass)
    }

    fn bind_program(&mut self, program: ProgramHandle) -> BackendResult<()> {
        if !self.programs.contains_key(&program.0) {
            return Err(BackendError::ResourceNotFound(format!("program {program:?}")));
        }
        self.current_program = Some(program.0);
        Ok(())
    }

    fn bind_uniform_range(
        &mut self,
        slot: u32,
        buffer: BufferHandle,
        offset: u64,
        size: u64,
    ) -> BackendResult<()> {
        if offset % self.limits.uniform_offset_alignment != 0 {
            return Err(BackendError::InvalidOperation(format!(
                "uniform range offset {} not aligned to {}",
                offset, self.limits.uniform_offset_alignment
            )));
        }
        self.bound_ranges.insert(slot, (buffer.0, offset, size));
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> BackendResult<()> {
        if !self.textures.contains_key(&texture.0) {
            return Err(BackendError::ResourceNotFound(format!("texture {texture:?}")));
        }
        self.bound_textures.insert(unit, texture.0);
        Ok(())
    }

    fn bind_geometry(&mut self, binding: BindingHandle) -> BackendResult<()> {
        if !self.bindings.contains_key(&binding.0) {
            return Err(BackendError::ResourceNotFound(format!("binding {binding:?}")));
        }
        self.current_binding = Some(binding.0);
        Ok(())
    }

    fn set_clip_distance(&mut self, enabled: bool) -> BackendResult<()> {
        if !enabled {
            self.queue.write_buffer(
                &self.clip_buffer,
                0,
                bytemuck::bytes_of(&CLIP_ACCEPT_ALL.to_array()),
            );
        }
        Ok(())
    }

    fn set_clip_plane(&mut self, plane: Vec4) -> BackendResult<()> {
        self.queue
            .write_buffer(&self.clip_buffer, 0, bytemuck::bytes_of(&plane.to_array()));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) -> BackendResult<()> {
        let program = self
            .current_program
            .ok_or_else(|| BackendError::InvalidOperation("draw without a program".into()))?;
        let binding = self
            .current_binding
            .ok_or_else(|| BackendError::InvalidOperation("draw without geometry".into()))?;
        let bind_group = self.materialize_bind_group(program)?;
        let pass = self
            .pending_pass
            .as_mut()
            .ok_or_else(|| BackendError::InvalidOperation("draw outside a pass".into()))?;
        pass.draws.push(DrawCall {
            binding,
            bind_group,
            index_count,
            first_index,
        });
        Ok(())
    }
}

fn convert_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
        TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Depth24Plus => wgpu::TextureFormat::Depth24Plus,
        TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
    }
}

fn convert_texture_usage(usage: TextureUsage, format: TextureFormat) -> wgpu::TextureUsages {
    let mut result = wgpu::TextureUsages::empty();
    if usage.contains(TextureUsage::TEXTURE_BINDING) && !format.is_depth() {
        result |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    if usage.contains(TextureUsage::RENDER_ATTACHMENT) {
        result |= wgpu::TextureUsages::RENDER_ATTACHMENT;
    }
    if usage.contains(TextureUsage::COPY_DST) {
        result |= wgpu::TextureUsages::COPY_DST;
    }
    result
}

fn convert_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
    let mut result = wgpu::BufferUsages::empty();
    if usage.contains(BufferUsage::VERTEX) {
        result |= wgpu::BufferUsages::VERTEX;
    }
    if usage.contains(BufferUsage::INDEX) {
        result |= wgpu::BufferUsages::INDEX;
    }
    if usage.contains(BufferUsage::UNIFORM) {
        result |= wgpu::BufferUsages::UNIFORM;
    }
    if usage.contains(BufferUsage::COPY_DST) {
        result |= wgpu::BufferUsages::COPY_DST;
    }
    result
}
