//! Engine: owns the backend and all render state, sequences the frame.

use crate::backend::traits::{PassTarget, RenderBackend, TextureHandle};
use crate::backend::types::{ClearColor, ClearConfig};
use crate::error::RenderResult;
use crate::pipeline::composite_pass::render_composite;
use crate::pipeline::forward_pass::render_forward;
use crate::pipeline::geometry::{draw_entities, write_frame_uniforms};
use crate::pipeline::water_pass::{draw_water, render_capture};
use crate::pipeline::{
    reflection_clip_plane, refraction_clip_plane, RenderMode, CLIP_DISABLED,
};
use crate::resources::mesh::{self, MeshData};
use crate::resources::program::{ProgramRegistry, ProgramTarget};
use crate::resources::targets::{GBuffer, WaterCapture};
use crate::resources::uniforms::UniformArena;
use crate::resources::AssetStore;
use crate::scene::{CameraInput, Scene, WaterPlane};
use crate::shader::ShaderSource;

const FORWARD_SOURCE: &str = include_str!("../shaders/forward.glsl");
const GEOMETRY_SOURCE: &str = include_str!("../shaders/geometry.glsl");
const WATER_SOURCE: &str = include_str!("../shaders/water.glsl");
const COMPOSITE_SOURCE: &str = include_str!("../shaders/composite.glsl");

#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    pub mode: RenderMode,
    pub clear_color: ClearColor,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            mode: RenderMode::Deferred,
            clear_color: ClearColor::new(0.1, 0.1, 0.1, 1.0),
        }
    }
}

/// Registry indices of the engine-owned programs.
#[derive(Debug, Clone, Copy)]
struct BuiltinPrograms {
    forward: usize,
    geometry: usize,
    water: usize,
    composite: usize,
}

pub struct Engine<B: RenderBackend> {
    backend: B,
    config: RendererConfig,
    registry: ProgramRegistry,
    assets: AssetStore,
    pub scene: Scene,
    arena: UniformArena,
    gbuffer: GBuffer,
    reflection: WaterCapture,
    refraction: WaterCapture,
    programs: BuiltinPrograms,
    screen_quad_mesh: usize,
    water_mesh: usize,
    fallback_texture: TextureHandle,
    debug_info: String,
}

impl<B: RenderBackend> Engine<B> {
    pub fn new(mut backend: B, config: RendererConfig) -> RenderResult<Self> {
        let info = backend.device_info().clone();
        let debug_info = format!("{} ({})", info.backend_name, info.version);
        log::info!("engine starting on {}", debug_info);

        let mut registry = ProgramRegistry::new();
        let programs = BuiltinPrograms {
            forward: registry.load(
                &mut backend,
                &ShaderSource::new("FORWARD", FORWARD_SOURCE),
                &ProgramTarget::backbuffer(),
            )?,
            geometry: registry.load(
                &mut backend,
                &ShaderSource::new("GEOMETRY", GEOMETRY_SOURCE),
                &ProgramTarget::gbuffer(),
            )?,
            water: registry.load(
                &mut backend,
                &ShaderSource::new("WATER", WATER_SOURCE),
                &ProgramTarget::gbuffer(),
            )?,
            composite: registry.load(
                &mut backend,
                &ShaderSource::new("COMPOSITE", COMPOSITE_SOURCE),
                &ProgramTarget::composite(),
            )?,
        };

        let arena = UniformArena::new(&mut backend)?;
        let gbuffer = GBuffer::new(&mut backend, config.width, config.height)?;
        let reflection = WaterCapture::new(&mut backend, "reflection", config.width, config.height)?;
        let refraction = WaterCapture::new(&mut backend, "refraction", config.width, config.height)?;

        let mut assets = AssetStore::new();
        let screen_quad_mesh = assets.add_mesh(&mut backend, &mesh::screen_quad())?;
        let water_mesh = assets.add_mesh(&mut backend, &mesh::water_quad())?;
        let white = assets.add_texture_rgba8(&mut backend, "white", 1, 1, &[255; 4])?;
        let fallback_texture = assets.texture(white)?.handle;

        let mut scene = Scene::new();
        scene.water = Some(WaterPlane::new(water_mesh));

        Ok(Self {
            backend,
            config,
            registry,
            assets,
            scene,
            arena,
            gbuffer,
            reflection,
            refraction,
            programs,
            screen_quad_mesh,
            water_mesh,
            fallback_texture,
            debug_info,
        })
    }

    /// Advance scene state. Input is consumed here, exactly once per frame;
    /// render passes never look at it.
    pub fn update(&mut self, input: &CameraInput, dt: f32) {
        self.scene.camera.apply_input(input, dt);
    }

    pub fn render(&mut self) -> RenderResult<()> {
        match self.config.mode {
            RenderMode::Forward => self.render_forward_frame(),
            RenderMode::Deferred => self.render_deferred_frame(),
        }
    }

    fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }

    fn render_forward_frame(&mut self) -> RenderResult<()> {
        let aspect = self.aspect();
        let clear = self.config.clear_color;
        let Self { backend, registry, assets, arena, scene, programs, fallback_texture, .. } = self;

        backend.begin_frame()?;
        render_forward(
            backend,
            registry,
            assets,
            arena,
            scene,
            programs.forward,
            aspect,
            clear,
            *fallback_texture,
        )?;
        backend.end_frame()?;
        Ok(())
    }

    /// The deferred frame, in fixed order: reflection capture (mirrored
    /// camera), refraction capture, G-buffer fill plus the water draw, then
    /// the composite resolve.
    fn render_deferred_frame(&mut self) -> RenderResult<()> {
        let aspect = self.aspect();
        let clear = self.config.clear_color;
        let Self {
            backend,
            registry,
            assets,
            arena,
            scene,
            gbuffer,
            reflection,
            refraction,
            programs,
            screen_quad_mesh,
            water_mesh,
            fallback_texture,
            ..
        } = self;

        let water = scene.water.clone();
        backend.begin_frame()?;

        if let Some(water) = &water {
            let height = water.height();
            backend.set_clip_distance(true)?;

            let mirrored = scene.camera.mirrored_across(height);
            render_capture(
                backend,
                registry,
                assets,
                arena,
                scene,
                reflection,
                &mirrored,
                reflection_clip_plane(height),
                programs.geometry,
                aspect,
                *fallback_texture,
            )?;

            let canonical = scene.camera;
            render_capture(
                backend,
                registry,
                assets,
                arena,
                scene,
                refraction,
                &canonical,
                refraction_clip_plane(height),
                programs.geometry,
                aspect,
                *fallback_texture,
            )?;

            backend.set_clip_distance(false)?;
        }

        // G-buffer pass with the canonical camera.
        let camera = scene.camera;
        let uniforms =
            write_frame_uniforms(backend, arena, scene, &camera, aspect, water.is_some())?;
        backend.begin_pass(
            PassTarget::Offscreen(gbuffer.target),
            &ClearConfig::color_and_depth(ClearColor::TRANSPARENT),
        )?;
        backend.set_clip_plane(CLIP_DISABLED)?;
        draw_entities(
            backend,
            registry,
            assets,
            scene,
            programs.geometry,
            uniforms.global,
            arena.buffer(),
            *fallback_texture,
        )?;
        if let Some(water_range) = uniforms.water {
            draw_water(
                backend,
                registry,
                assets,
                *water_mesh,
                programs.water,
                water_range,
                arena.buffer(),
                reflection.color,
                refraction.color,
            )?;
        }
        backend.end_pass()?;

        render_composite(
            backend,
            registry,
            assets,
            gbuffer,
            *screen_quad_mesh,
            programs.composite,
            uniforms.global,
            arena.buffer(),
            clear,
        )?;

        backend.end_frame()?;
        Ok(())
    }

    /// Recreate the surface-sized targets. Binding caches are unaffected.
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.config.width = width;
        self.config.height = height;
        self.backend.resize(width, height);

        self.gbuffer.destroy(&mut self.backend)?;
        self.reflection.destroy(&mut self.backend)?;
        self.refraction.destroy(&mut self.backend)?;
        self.gbuffer = GBuffer::new(&mut self.backend, width, height)?;
        self.reflection = WaterCapture::new(&mut self.backend, "reflection", width, height)?;
        self.refraction = WaterCapture::new(&mut self.backend, "refraction", width, height)?;
        Ok(())
    }

    pub fn set_mode(&mut self, mode: RenderMode) {
        self.config.mode = mode;
    }

    pub fn mode(&self) -> RenderMode {
        self.config.mode
    }

    /// Backend/driver identification string, captured at startup.
    pub fn debug_info(&self) -> &str {
        &self.debug_info
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    pub fn reflection_capture(&self) -> &WaterCapture {
        &self.reflection
    }

    pub fn refraction_capture(&self) -> &WaterCapture {
        &self.refraction
    }

    pub fn water_mesh_index(&self) -> usize {
        self.water_mesh
    }

    // Asset pass-throughs; the backend and the tables live together here.

    pub fn add_mesh(&mut self, data: &MeshData) -> RenderResult<usize> {
        self.assets.add_mesh(&mut self.backend, data)
    }

    pub fn add_texture_rgba8(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        texels: &[u8],
    ) -> RenderResult<usize> {
        self.assets.add_texture_rgba8(&mut self.backend, label, width, height, texels)
    }

    pub fn add_material(&mut self, material: crate::resources::mesh::Material) -> usize {
        self.assets.add_material(material)
    }

    pub fn add_model(&mut self, model: crate::resources::mesh::Model) -> usize {
        self.assets.add_model(model)
    }

    /// Load a host-supplied program through the shared registry path.
    pub fn load_program(
        &mut self,
        source: &ShaderSource,
        target: &ProgramTarget,
    ) -> RenderResult<usize> {
        self.registry.load(&mut self.backend, source, target)
    }

    pub fn programs(&self) -> &ProgramRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader;

    #[test]
    fn builtin_shaders_compile() {
        let sources = [
            ("FORWARD", FORWARD_SOURCE),
            ("GEOMETRY", GEOMETRY_SOURCE),
            ("WATER", WATER_SOURCE),
            ("COMPOSITE", COMPOSITE_SOURCE),
        ];
        for (name, text) in sources {
            let compiled = match shader::compile(&ShaderSource::new(name, text)) {
                Ok(compiled) => compiled,
                Err(err) => panic!("{name} failed to compile: {err}"),
            };
            assert!(!compiled.vertex_wgsl.is_empty(), "{name} produced no vertex WGSL");
            assert!(!compiled.fragment_wgsl.is_empty(), "{name} produced no fragment WGSL");
        }
    }

    #[test]
    fn builtin_shaders_reflect_expected_resources() {
        let geometry = shader::compile(&ShaderSource::new("GEOMETRY", GEOMETRY_SOURCE)).unwrap();
        assert_eq!(geometry.vertex_layout.attributes.len(), 3);
        assert_eq!(geometry.bindings.textures.len(), 1);
        assert_eq!(geometry.bindings.samplers.len(), 1);

        let water = shader::compile(&ShaderSource::new("WATER", WATER_SOURCE)).unwrap();
        assert_eq!(water.vertex_layout.attributes.len(), 2);
        assert_eq!(water.bindings.textures.len(), 2);
        assert_eq!(water.bindings.samplers.len(), 2);

        let composite = shader::compile(&ShaderSource::new("COMPOSITE", COMPOSITE_SOURCE)).unwrap();
        assert_eq!(composite.vertex_layout.attributes.len(), 2);
        assert_eq!(composite.bindings.textures.len(), 4);
        assert_eq!(composite.bindings.samplers.len(), 4);
    }
}
