//! Shared per-pass uniform update and entity draw loop.

use glam::Mat4;

use crate::backend::traits::{BufferHandle, RenderBackend, TextureHandle};
use crate::error::{RenderError, RenderResult};
use crate::pipeline::{GLOBAL_PARAMS_SLOT, LOCAL_PARAMS_SLOT};
use crate::resources::binding::find_binding;
use crate::resources::program::ProgramRegistry;
use crate::resources::uniforms::{UniformArena, UniformRange};
use crate::resources::AssetStore;
use crate::scene::{Camera, Scene};

/// Arena ranges written by one pass update.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameUniforms {
    pub global: UniformRange,
    pub water: Option<UniformRange>,
}

/// Rewind the arena and write this pass's view of the frame: global block,
/// one local block per entity (recorded on the entity), and the water block
/// when requested. Flushes before returning, so every handed-out range is
/// consumable by draws.
pub(crate) fn write_frame_uniforms<B: RenderBackend>(
    backend: &mut B,
    arena: &mut UniformArena,
    scene: &mut Scene,
    camera: &Camera,
    aspect: f32,
    include_water: bool,
) -> RenderResult<FrameUniforms> {
    let view = camera.view_matrix();
    let projection = camera.projection_matrix(aspect);
    let view_projection = projection * view;

    arena.begin();
    let global = arena.push_global_block(camera.position, &scene.lights)?;
    for entity in &mut scene.entities {
        let wvp: Mat4 = view_projection * entity.world;
        entity.uniform_range = Some(arena.push_entity_block(entity.world, wvp)?);
    }
    let water = match (&scene.water, include_water) {
        (Some(plane), true) => Some(arena.push_water_block(view, projection, plane.world)?),
        _ => None,
    };
    arena.finish(backend)?;

    Ok(FrameUniforms { global, water })
}

/// Draw every entity with `program_index`: bind the program and the global
/// range once, then per submesh resolve the binding through the layout
/// matcher, bind the material albedo and the entity's local range, and
/// issue the indexed draw.
pub(crate) fn draw_entities<B: RenderBackend>(
    backend: &mut B,
    registry: &ProgramRegistry,
    assets: &mut AssetStore,
    scene: &Scene,
    program_index: usize,
    global: UniformRange,
    arena_buffer: BufferHandle,
    fallback_texture: TextureHandle,
) -> RenderResult<()> {
    let program = registry.get(program_index)?;
    backend.bind_program(program.handle)?;
    backend.bind_uniform_range(GLOBAL_PARAMS_SLOT, arena_buffer, global.offset, global.size)?;

    for entity in &scene.entities {
        let Some(local) = entity.uniform_range else {
            continue;
        };
        let model = assets.model(entity.model_index)?.clone();
        let submesh_count = assets
            .meshes
            .get(model.mesh_index)
            .ok_or(RenderError::InvalidIndex { table: "mesh", index: model.mesh_index })?
            .submeshes
            .len();

        for submesh_index in 0..submesh_count {
            let albedo = model
                .material_indices
                .get(submesh_index)
                .and_then(|&m| assets.materials.get(m))
                .and_then(|mat| assets.textures.get(mat.albedo_texture))
                .map(|tex| tex.handle)
                .unwrap_or(fallback_texture);

            let mesh = &mut assets.meshes[model.mesh_index];
            let binding = find_binding(backend, mesh, submesh_index, program)?;
            let submesh = &mesh.submeshes[submesh_index];
            let (index_count, first_index) = (submesh.index_count, submesh.first_index);

            backend.bind_texture(0, albedo)?;
            backend.bind_uniform_range(LOCAL_PARAMS_SLOT, arena_buffer, local.offset, local.size)?;
            backend.bind_geometry(binding)?;
            backend.draw_indexed(index_count, first_index)?;
        }
    }
    Ok(())
}
