//! Backend abstraction trait and resource handles.
//!
//! The renderer never talks to a graphics API directly; every GPU-facing
//! operation goes through [`RenderBackend`]. Handles are opaque u64 newtypes
//! so the frontend cannot confuse resource kinds.

use glam::Vec4;
use thiserror::Error;

use crate::backend::types::*;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend initialization failed: {0}")]
    InitializationFailed(String),

    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("render target incomplete: {0}")]
    IncompleteRenderTarget(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u64);

/// A program/submesh pairing: vertex fetch state plus the pipeline that
/// consumes it (the vertex-array-object analog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingHandle(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetHandle(pub(crate) u64);

/// A reflected shader resource binding (group/binding pair in the emitted
/// WGSL).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceSlot {
    pub group: u32,
    pub binding: u32,
}

/// Uniform-block slot as declared in the GLSL source (`layout(binding = n)`),
/// mapped to its reflected location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformBlockSlot {
    /// Declared GLSL binding; the frontend binds ranges by this number.
    pub slot: u32,
    pub resource: ResourceSlot,
    /// Minimum byte size of the block per its std140 layout.
    pub min_size: u64,
}

/// Reflection tables produced at program compilation. Texture units map to
/// `textures[unit]` / `samplers[unit]` in shader declaration order.
#[derive(Debug, Clone, Default)]
pub struct ProgramBindings {
    pub uniform_blocks: Vec<UniformBlockSlot>,
    pub textures: Vec<ResourceSlot>,
    pub samplers: Vec<ResourceSlot>,
}

/// Everything a backend needs to instantiate a program.
#[derive(Debug, Clone)]
pub struct ProgramDescriptor {
    pub name: String,
    pub vertex_wgsl: String,
    pub fragment_wgsl: String,
    pub bindings: ProgramBindings,
    /// Color target formats of the pass family this program renders into.
    /// `None` entries mean the presentation surface format.
    pub color_formats: Vec<Option<TextureFormat>>,
    pub depth_format: Option<TextureFormat>,
}

#[derive(Debug, Clone)]
pub struct RenderTargetDescriptor {
    pub label: Option<String>,
    pub color: Vec<TextureHandle>,
    pub depth: Option<TextureHandle>,
    pub width: u32,
    pub height: u32,
}

/// Vertex fetch state for one submesh under one program.
#[derive(Debug, Clone)]
pub struct BindingDescriptor {
    pub program: ProgramHandle,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    /// Byte offset of the submesh's first vertex in the shared buffer.
    pub vertex_base_offset: u64,
    pub stride: u32,
    pub attributes: Vec<VertexBufferAttribute>,
    pub index_format: IndexFormat,
}

/// Where a render pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    Backbuffer,
    Offscreen(RenderTargetHandle),
}

/// Abstract GPU interface. One implementation records commands for tests
/// ([`HeadlessBackend`](crate::backend::headless::HeadlessBackend)); the
/// other drives wgpu.
pub trait RenderBackend {
    fn device_info(&self) -> &DeviceInfo;
    fn limits(&self) -> DeviceLimits;
    fn resize(&mut self, width: u32, height: u32);

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;
    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle>;
    /// Upload bytes into an existing buffer. For the uniform arena this is
    /// the unmap flush and acts as the frame's synchronization point.
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8])
        -> BackendResult<()>;
    fn destroy_buffer(&mut self, buffer: BufferHandle) -> BackendResult<()>;

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;
    fn write_texture(&mut self, texture: TextureHandle, data: &[u8]) -> BackendResult<()>;
    fn destroy_texture(&mut self, texture: TextureHandle) -> BackendResult<()>;

    /// Assemble color/depth attachments into a render target, validating
    /// completeness (matching dimensions, color vs. depth formats). An
    /// invalid combination is an error, never a partially usable target.
    fn create_render_target(
        &mut self,
        desc: &RenderTargetDescriptor,
    ) -> BackendResult<RenderTargetHandle>;
    fn destroy_render_target(&mut self, target: RenderTargetHandle) -> BackendResult<()>;

    fn create_program(&mut self, desc: &ProgramDescriptor) -> BackendResult<ProgramHandle>;
    fn create_binding(&mut self, desc: &BindingDescriptor) -> BackendResult<BindingHandle>;

    fn begin_frame(&mut self) -> BackendResult<()>;
    fn end_frame(&mut self) -> BackendResult<()>;

    fn begin_pass(&mut self, target: PassTarget, clear: &ClearConfig) -> BackendResult<()>;
    fn end_pass(&mut self) -> BackendResult<()>;

    fn bind_program(&mut self, program: ProgramHandle) -> BackendResult<()>;
    /// Bind a sub-range of `buffer` to uniform-block slot `slot`
    /// (glBindBufferRange semantics). `offset` must honor
    /// [`DeviceLimits::uniform_offset_alignment`].
    fn bind_uniform_range(
        &mut self,
        slot: u32,
        buffer: BufferHandle,
        offset: u64,
        size: u64,
    ) -> BackendResult<()>;
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> BackendResult<()>;
    fn bind_geometry(&mut self, binding: BindingHandle) -> BackendResult<()>;

    fn set_clip_distance(&mut self, enabled: bool) -> BackendResult<()>;
    fn set_clip_plane(&mut self, plane: Vec4) -> BackendResult<()>;

    fn draw_indexed(&mut self, index_count: u32, first_index: u32) -> BackendResult<()>;
}
