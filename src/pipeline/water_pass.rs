//! Water passes: reflection/refraction captures and the surface draw.

use crate::backend::traits::{BufferHandle, PassTarget, RenderBackend, TextureHandle};
use crate::backend::types::{ClearColor, ClearConfig};
use crate::error::{RenderError, RenderResult};
use crate::pipeline::geometry::{draw_entities, write_frame_uniforms};
use crate::pipeline::WATER_PARAMS_SLOT;
use crate::resources::binding::find_binding;
use crate::resources::program::ProgramRegistry;
use crate::resources::targets::WaterCapture;
use crate::resources::uniforms::{UniformArena, UniformRange};
use crate::resources::AssetStore;
use crate::scene::{Camera, Scene};

/// Render the scene into a capture target with the given camera and clip
/// plane. Used for both the mirrored reflection pass and the refraction
/// pass; neither applies input.
#[allow(clippy::too_many_arguments)]
pub(crate) fn render_capture<B: RenderBackend>(
    backend: &mut B,
    registry: &ProgramRegistry,
    assets: &mut AssetStore,
    arena: &mut UniformArena,
    scene: &mut Scene,
    capture: &WaterCapture,
    camera: &Camera,
    clip_plane: glam::Vec4,
    program_index: usize,
    aspect: f32,
    fallback_texture: TextureHandle,
) -> RenderResult<()> {
    let uniforms = write_frame_uniforms(backend, arena, scene, camera, aspect, false)?;

    backend.begin_pass(
        PassTarget::Offscreen(capture.target),
        &ClearConfig::color_and_depth(ClearColor::TRANSPARENT),
    )?;
    backend.set_clip_plane(clip_plane)?;
    draw_entities(
        backend,
        registry,
        assets,
        scene,
        program_index,
        uniforms.global,
        arena.buffer(),
        fallback_texture,
    )?;
    backend.end_pass()?;
    Ok(())
}

/// Draw the water quad into the currently open G-buffer pass, sampling the
/// reflection and refraction captures on units 0 and 1.
#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_water<B: RenderBackend>(
    backend: &mut B,
    registry: &ProgramRegistry,
    assets: &mut AssetStore,
    water_mesh_index: usize,
    program_index: usize,
    water_range: UniformRange,
    arena_buffer: BufferHandle,
    reflection: TextureHandle,
    refraction: TextureHandle,
) -> RenderResult<()> {
    let program = registry.get(program_index)?;
    backend.bind_program(program.handle)?;
    backend.bind_uniform_range(
        WATER_PARAMS_SLOT,
        arena_buffer,
        water_range.offset,
        water_range.size,
    )?;
    backend.bind_texture(0, reflection)?;
    backend.bind_texture(1, refraction)?;

    let mesh = assets
        .meshes
        .get_mut(water_mesh_index)
        .ok_or(RenderError::InvalidIndex { table: "mesh", index: water_mesh_index })?;
    let binding = find_binding(backend, mesh, 0, program)?;
    let submesh = &mesh.submeshes[0];
    let (index_count, first_index) = (submesh.index_count, submesh.first_index);

    backend.bind_geometry(binding)?;
    backend.draw_indexed(index_count, first_index)?;
    Ok(())
}
