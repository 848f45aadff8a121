//! Headless recording backend.
//!
//! Allocates handles, retains descriptors, and journals every frame command
//! so tests can assert pass ordering, bound uniform ranges, and draw calls
//! without a GPU. Every call is also logged at `trace` level.

use std::collections::HashMap;

use glam::Vec4;

use crate::backend::traits::*;
use crate::backend::types::*;

/// One recorded frame command.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    BeginFrame,
    EndFrame,
    BeginPass { target: PassTarget },
    EndPass,
    BindProgram(ProgramHandle),
    BindUniformRange { slot: u32, buffer: BufferHandle, offset: u64, size: u64 },
    BindTexture { unit: u32, texture: TextureHandle },
    BindGeometry(BindingHandle),
    SetClipDistance(bool),
    SetClipPlane(Vec4),
    DrawIndexed { index_count: u32, first_index: u32 },
    WriteBuffer { buffer: BufferHandle, offset: u64, len: u64 },
}

pub struct HeadlessBackend {
    info: DeviceInfo,
    limits: DeviceLimits,
    width: u32,
    height: u32,
    next_id: u64,
    buffers: HashMap<u64, BufferDescriptor>,
    textures: HashMap<u64, TextureDescriptor>,
    programs: HashMap<u64, ProgramDescriptor>,
    bindings: HashMap<u64, BindingDescriptor>,
    targets: HashMap<u64, RenderTargetDescriptor>,
    commands: Vec<GpuCommand>,
    in_pass: bool,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            info: DeviceInfo {
                backend_name: "headless".into(),
                version: "recording 1.0".into(),
            },
            limits: DeviceLimits {
                max_uniform_block_size: 16384,
                uniform_offset_alignment: 256,
            },
            width,
            height,
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            bindings: HashMap::new(),
            targets: HashMap::new(),
            commands: Vec::new(),
            in_pass: false,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Frame journal since the last [`Self::clear_commands`].
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn binding_descriptor(&self, binding: BindingHandle) -> Option<&BindingDescriptor> {
        self.bindings.get(&binding.0)
    }

    pub fn target_descriptor(&self, target: RenderTargetHandle) -> Option<&RenderTargetDescriptor> {
        self.targets.get(&target.0)
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    pub fn program_descriptor(&self, program: ProgramHandle) -> Option<&ProgramDescriptor> {
        self.programs.get(&program.0)
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl RenderBackend for HeadlessBackend {
    fn device_info(&self) -> &DeviceInfo {
        &self.info
    }

    fn limits(&self) -> DeviceLimits {
        self.limits
    }

    fn resize(&mut self, width: u32, height: u32) {
        log::trace!("headless: resize {}x{}", width, height);
        self.width = width;
        self.height = height;
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let id = self.next_id();
        log::trace!("headless: create_buffer #{} ({} bytes)", id, desc.size);
        self.buffers.insert(id, desc.clone());
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        if data.len() as u64 > desc.size {
            return Err(BackendError::ResourceCreationFailed(format!(
                "initial data ({} bytes) exceeds buffer size ({})",
                data.len(),
                desc.size
            )));
        }
        self.create_buffer(desc)
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> BackendResult<()> {
        let desc = self
            .buffers
            .get(&buffer.0)
            .ok_or_else(|| BackendError::ResourceNotFound(format!("buffer {:?}", buffer)))?;
        if offset + data.len() as u64 > desc.size {
            return Err(BackendError::InvalidOperation(format!(
                "write of {} bytes at {} overruns buffer of {}",
                data.len(),
                offset,
                desc.size
            )));
        }
        log::trace!("headless: write_buffer {:?} +{} ({} bytes)", buffer, offset, data.len());
        self.commands.push(GpuCommand::WriteBuffer {
            buffer,
            offset,
            len: data.len() as u64,
        });
        Ok(())
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) -> BackendResult<()> {
        self.buffers
            .remove(&buffer.0)
            .map(|_| ())
            .ok_or_else(|| BackendError::ResourceNotFound(format!("buffer {:?}", buffer)))
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let id = self.next_id();
        log::trace!(
            "headless: create_texture #{} {}x{} {:?}",
            id,
            desc.width,
            desc.height,
            desc.format
        );
        self.textures.insert(id, desc.clone());
        Ok(TextureHandle(id))
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]) -> BackendResult<()> {
        let desc = self
            .textures
            .get(&texture.0)
            .ok_or_else(|| BackendError::ResourceNotFound(format!("texture {:?}", texture)))?;
        let expected = (desc.width * desc.height * desc.format.bytes_per_pixel()) as usize;
        if data.len() != expected {
            return Err(BackendError::InvalidOperation(format!(
                "texture upload of {} bytes, expected {}",
                data.len(),
                expected
            )));
        }
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureHandle) -> BackendResult<()> {
        self.textures
            .remove(&texture.0)
            .map(|_| ())
            .ok_or_else(|| BackendError::ResourceNotFound(format!("texture {:?}", texture)))
    }

    fn create_render_target(
        &mut self,
        desc: &RenderTargetDescriptor,
    ) -> BackendResult<RenderTargetHandle> {
        if desc.color.is_empty() && desc.depth.is_none() {
            return Err(BackendError::IncompleteRenderTarget(
                "no attachments".into(),
            ));
        }
        for handle in &desc.color {
            let tex = self
                .textures
                .get(&handle.0)
                .ok_or_else(|| BackendError::ResourceNotFound(format!("texture {:?}", handle)))?;
            if tex.format.is_depth() {
                return Err(BackendError::IncompleteRenderTarget(format!(
                    "depth format {:?} used as color attachment",
                    tex.format
                )));
            }
            if (tex.width, tex.height) != (desc.width, desc.height) {
                return Err(BackendError::IncompleteRenderTarget(format!(
                    "attachment is {}x{}, target is {}x{}",
                    tex.width, tex.height, desc.width, desc.height
                )));
            }
        }
        if let Some(depth) = &desc.depth {
            let tex = self
                .textures
                .get(&depth.0)
                .ok_or_else(|| BackendError::ResourceNotFound(format!("texture {:?}", depth)))?;
            if !tex.format.is_depth() {
                return Err(BackendError::IncompleteRenderTarget(format!(
                    "color format {:?} used as depth attachment",
                    tex.format
                )));
            }
        }
        let id = self.next_id();
        log::trace!("headless: create_render_target #{} ({} color)", id, desc.color.len());
        self.targets.insert(id, desc.clone());
        Ok(RenderTargetHandle(id))
    }

    fn destroy_render_target(&mut self, target: RenderTargetHandle) -> BackendResult<()> {
        self.targets
            .remove(&target.0)
            .map(|_| ())
            .ok_or_else(|| BackendError::ResourceNotFound(format!("target {:?}", target)))
    }

    fn create_program(&mut self, desc: &ProgramDescriptor) -> BackendResult<ProgramHandle> {
        let id = self.next_id();
        log::trace!("headless: create_program #{} '{}'", id, desc.name);
        self.programs.insert(id, desc.clone());
        Ok(ProgramHandle(id))
    }

    fn create_binding(&mut self, desc: &BindingDescriptor) -> BackendResult<BindingHandle> {
        if !self.programs.contains_key(&desc.program.0) {
            return Err(BackendError::ResourceNotFound(format!(
                "program {:?}",
                desc.program
            )));
        }
        let id = self.next_id();
        log::trace!(
            "headless: create_binding #{} (program {:?}, {} attributes)",
            id,
            desc.program,
            desc.attributes.len()
        );
        self.bindings.insert(id, desc.clone());
        Ok(BindingHandle(id))
    }

    fn begin_frame(&mut self) -> BackendResult<()> {
        self.commands.push(GpuCommand::BeginFrame);
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if self.in_pass {
            return Err(BackendError::InvalidOperation(
                "end_frame inside an open pass".into(),
            ));
        }
        self.commands.push(GpuCommand::EndFrame);
        Ok(())
    }

    fn begin_pass(&mut self, target: PassTarget, _clear: &ClearConfig) -> BackendResult<()> {
        if self.in_pass {
            return Err(BackendError::InvalidOperation("nested render pass".into()));
        }
        if let PassTarget::Offscreen(handle) = target {
            if !self.targets.contains_key(&handle.0) {
                return Err(BackendError::ResourceNotFound(format!("target {:?}", handle)));
            }
        }
        log::trace!("headless: begin_pass {:?}", target);
        self.in_pass = true;
        self.commands.push(GpuCommand::BeginPass { target });
        Ok(())
    }

    fn end_pass(&mut self) -> BackendResult<()> {
        if !self.in_pass {
            return Err(BackendError::InvalidOperation("end_pass without begin".into()));
        }
        self.in_pass = false;
        self.commands.push(GpuCommand::EndPass);
        Ok(())
    }

    fn bind_program(&mut self, program: ProgramHandle) -> BackendResult<()> {
        if !self.programs.contains_key(&program.0) {
            return Err(BackendError::ResourceNotFound(format!("program {:?}", program)));
        }
        self.commands.push(GpuCommand::BindProgram(program));
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
        self.commands.push(GpuCommand::BindUniformRange { slot, buffer, offset, size });
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> BackendResult<()> {
        if !self.textures.contains_key(&texture.0) {
            return Err(BackendError::ResourceNotFound(format!("texture {:?}", texture)));
        }
        self.commands.push(GpuCommand::BindTexture { unit, texture });
        Ok(())
    }

    fn bind_geometry(&mut self, binding: BindingHandle) -> BackendResult<()> {
        if !self.bindings.contains_key(&binding.0) {
            return Err(BackendError::ResourceNotFound(format!("binding {:?}", binding)));
        }
        self.commands.push(GpuCommand::BindGeometry(binding));
        Ok(())
    }

    fn set_clip_distance(&mut self, enabled: bool) -> BackendResult<()> {
        self.commands.push(GpuCommand::SetClipDistance(enabled));
        Ok(())
    }

    fn set_clip_plane(&mut self, plane: Vec4) -> BackendResult<()> {
        self.commands.push(GpuCommand::SetClipPlane(plane));
        Ok(())
    }

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) -> BackendResult<()> {
        if !self.in_pass {
            return Err(BackendError::InvalidOperation("draw outside a pass".into()));
        }
        self.commands.push(GpuCommand::DrawIndexed { index_count, first_index });
        Ok(())
    }
}
