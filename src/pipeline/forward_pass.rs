//! Forward pass: lit geometry straight to the backbuffer.

use crate::backend::traits::{PassTarget, RenderBackend, TextureHandle};
use crate::backend::types::{ClearColor, ClearConfig};
use crate::error::RenderResult;
use crate::pipeline::geometry::{draw_entities, write_frame_uniforms};
use crate::pipeline::CLIP_DISABLED;
use crate::resources::program::ProgramRegistry;
use crate::resources::uniforms::UniformArena;
use crate::resources::AssetStore;
use crate::scene::Scene;

#[allow(clippy::too_many_arguments)]
pub(crate) fn render_forward<B: RenderBackend>(
    backend: &mut B,
    registry: &ProgramRegistry,
    assets: &mut AssetStore,
    arena: &mut UniformArena,
    scene: &mut Scene,
    program_index: usize,
    aspect: f32,
    clear_color: ClearColor,
    fallback_texture: TextureHandle,
) -> RenderResult<()> {
    let camera = scene.camera;
    let uniforms = write_frame_uniforms(backend, arena, scene, &camera, aspect, false)?;

    backend.begin_pass(PassTarget::Backbuffer, &ClearConfig::color_and_depth(clear_color))?;
    backend.set_clip_plane(CLIP_DISABLED)?;
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
