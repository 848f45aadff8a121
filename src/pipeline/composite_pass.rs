//! Composite pass: resolve the G-buffer to the backbuffer.

use crate::backend::traits::{BufferHandle, PassTarget, RenderBackend};
use crate::backend::types::{ClearColor, ClearConfig};
use crate::error::{RenderError, RenderResult};
use crate::pipeline::GLOBAL_PARAMS_SLOT;
use crate::resources::binding::find_binding;
use crate::resources::program::ProgramRegistry;
use crate::resources::targets::GBuffer;
use crate::resources::uniforms::UniformRange;
use crate::resources::AssetStore;

/// Full-screen lighting resolve. Binds the four G-buffer attachments to
/// texture units 0 through 3 (albedo, normals, positions, view directions)
/// and draws the six-index screen quad.
#[allow(clippy::too_many_arguments)]
pub(crate) fn render_composite<B: RenderBackend>(
    backend: &mut B,
    registry: &ProgramRegistry,
    assets: &mut AssetStore,
    gbuffer: &GBuffer,
    quad_mesh_index: usize,
    program_index: usize,
    global: UniformRange,
    arena_buffer: BufferHandle,
    clear_color: ClearColor,
) -> RenderResult<()> {
    let program = registry.get(program_index)?;

    backend.begin_pass(
        PassTarget::Backbuffer,
        &ClearConfig { color: Some(clear_color), depth: None },
    )?;
    backend.bind_program(program.handle)?;
    backend.bind_uniform_range(GLOBAL_PARAMS_SLOT, arena_buffer, global.offset, global.size)?;
    for (unit, attachment) in gbuffer.color_attachments().into_iter().enumerate() {
        backend.bind_texture(unit as u32, attachment)?;
    }

    let mesh = assets
        .meshes
        .get_mut(quad_mesh_index)
        .ok_or(RenderError::InvalidIndex { table: "mesh", index: quad_mesh_index })?;
    let binding = find_binding(backend, mesh, 0, program)?;
    let submesh = &mesh.submeshes[0];
    let (index_count, first_index) = (submesh.index_count, submesh.first_index);

    backend.bind_geometry(binding)?;
    backend.draw_indexed(index_count, first_index)?;
    backend.end_pass()?;
    Ok(())
}
