//! Frame-level tests driving [`Engine`] over the recording backend and
//! asserting on the journaled command stream.

use glam::Vec3;
use waterline::backend::headless::GpuCommand;
use waterline::backend::traits::PassTarget;
use waterline::pipeline::{
    reflection_clip_plane, refraction_clip_plane, CLIP_DISABLED, LOCAL_PARAMS_SLOT,
};
use waterline::resources::mesh::{self, Material, Model};
use waterline::{CameraInput, Engine, HeadlessBackend, RenderMode, RendererConfig};

/// Engine with a showcase scene: cubes, lights with marker entities, and
/// the default water plane.
fn showcase_engine() -> Engine<HeadlessBackend> {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = HeadlessBackend::new(256, 256);
    let config = RendererConfig { width: 256, height: 256, ..Default::default() };
    let mut engine = Engine::new(backend, config).unwrap();

    let cube = engine.add_mesh(&mesh::cube()).unwrap();
    let texture = engine.add_texture_rgba8("gray", 1, 1, &[128, 128, 128, 255]).unwrap();
    let material = engine.add_material(Material {
        name: "gray".into(),
        albedo_texture: texture,
    });
    let model = engine.add_model(Model {
        name: "cube".into(),
        mesh_index: cube,
        material_indices: vec![material],
    });
    engine.scene.populate_showcase(model, model);

    engine.backend_mut().clear_commands();
    engine
}

/// Targets of the `BeginPass` commands, in order.
fn pass_targets(commands: &[GpuCommand]) -> Vec<PassTarget> {
    commands
        .iter()
        .filter_map(|c| match c {
            GpuCommand::BeginPass { target } => Some(*target),
            _ => None,
        })
        .collect()
}

/// Commands recorded between a pass's `BeginPass` and its `EndPass`.
fn pass_slice(commands: &[GpuCommand], target: PassTarget) -> &[GpuCommand] {
    let begin = commands
        .iter()
        .position(|c| matches!(c, GpuCommand::BeginPass { target: t } if *t == target))
        .unwrap();
    let end = commands[begin..]
        .iter()
        .position(|c| matches!(c, GpuCommand::EndPass))
        .unwrap();
    &commands[begin..begin + end]
}

/// A deferred frame runs its passes in fixed order: reflection capture,
/// refraction capture, G-buffer fill, composite to the backbuffer.
#[test]
fn deferred_frame_pass_order() {
    let mut engine = showcase_engine();
    let reflection = engine.reflection_capture().target;
    let refraction = engine.refraction_capture().target;
    let gbuffer = engine.gbuffer().target;

    engine.render().unwrap();

    let targets = pass_targets(engine.backend().commands());
    assert_eq!(
        targets,
        vec![
            PassTarget::Offscreen(reflection),
            PassTarget::Offscreen(refraction),
            PassTarget::Offscreen(gbuffer),
            PassTarget::Backbuffer,
        ]
    );
}

/// Clip distance is enabled for exactly the two capture passes, and each
/// pass sets its own plane: reflection keeps what is above the surface,
/// refraction what is below, and the G-buffer pass parks the plane on the
/// accept-everything constant.
#[test]
fn clip_state_brackets_the_captures() {
    let mut engine = showcase_engine();
    let height = engine.scene.water.as_ref().unwrap().height();
    engine.render().unwrap();

    let commands = engine.backend().commands();
    let relevant: Vec<&GpuCommand> = commands
        .iter()
        .filter(|c| {
            matches!(
                c,
                GpuCommand::SetClipDistance(_)
                    | GpuCommand::SetClipPlane(_)
                    | GpuCommand::BeginPass { .. }
            )
        })
        .collect();

    assert_eq!(*relevant[0], GpuCommand::SetClipDistance(true));
    assert!(matches!(relevant[1], GpuCommand::BeginPass { .. }));
    assert_eq!(*relevant[2], GpuCommand::SetClipPlane(reflection_clip_plane(height)));
    assert!(matches!(relevant[3], GpuCommand::BeginPass { .. }));
    assert_eq!(*relevant[4], GpuCommand::SetClipPlane(refraction_clip_plane(height)));
    assert_eq!(*relevant[5], GpuCommand::SetClipDistance(false));
    assert!(matches!(relevant[6], GpuCommand::BeginPass { .. }));
    assert_eq!(*relevant[7], GpuCommand::SetClipPlane(CLIP_DISABLED));
    assert!(matches!(relevant[8], GpuCommand::BeginPass { .. }));
    assert_eq!(relevant.len(), 9);
}

/// The water quad is drawn inside the G-buffer pass with the two capture
/// colors on texture units 0 and 1.
#[test]
fn water_draws_inside_gbuffer_pass() {
    let mut engine = showcase_engine();
    let reflection_color = engine.reflection_capture().color;
    let refraction_color = engine.refraction_capture().color;
    let gbuffer = engine.gbuffer().target;

    engine.render().unwrap();

    let slice = pass_slice(engine.backend().commands(), PassTarget::Offscreen(gbuffer));
    assert!(slice.contains(&GpuCommand::BindTexture { unit: 0, texture: reflection_color }));
    assert!(slice.contains(&GpuCommand::BindTexture { unit: 1, texture: refraction_color }));
    // The water quad is the last draw of the pass and has six indices.
    assert_eq!(
        slice.iter().rev().find_map(|c| match c {
            GpuCommand::DrawIndexed { index_count, .. } => Some(*index_count),
            _ => None,
        }),
        Some(6)
    );
}

/// Without a water plane the captures are skipped entirely and no clip
/// state is touched.
#[test]
fn no_water_skips_captures() {
    let mut engine = showcase_engine();
    let gbuffer = engine.gbuffer().target;
    engine.scene.water = None;

    engine.render().unwrap();

    let commands = engine.backend().commands();
    assert_eq!(
        pass_targets(commands),
        vec![PassTarget::Offscreen(gbuffer), PassTarget::Backbuffer]
    );
    assert!(!commands.iter().any(|c| matches!(c, GpuCommand::SetClipDistance(_))));
}

/// Forward mode is a single backbuffer pass with clipping parked.
#[test]
fn forward_mode_single_pass() {
    let mut engine = showcase_engine();
    engine.set_mode(RenderMode::Forward);

    engine.render().unwrap();

    let commands = engine.backend().commands();
    assert_eq!(pass_targets(commands), vec![PassTarget::Backbuffer]);
    assert!(!commands.iter().any(|c| matches!(c, GpuCommand::SetClipDistance(_))));
    assert!(commands.contains(&GpuCommand::SetClipPlane(CLIP_DISABLED)));
}

/// Each entity gets its own aligned slot in the uniform arena; no two
/// entities in a pass share an offset.
#[test]
fn entity_uniform_ranges_are_distinct() {
    let mut engine = showcase_engine();
    let gbuffer = engine.gbuffer().target;
    // No water: its parameter block shares the per-entity slot.
    engine.scene.water = None;
    let entity_count = engine.scene.entities.len();

    engine.render().unwrap();

    let slice = pass_slice(engine.backend().commands(), PassTarget::Offscreen(gbuffer));
    let mut offsets: Vec<u64> = slice
        .iter()
        .filter_map(|c| match c {
            GpuCommand::BindUniformRange { slot, offset, .. } if *slot == LOCAL_PARAMS_SLOT => {
                Some(*offset)
            }
            _ => None,
        })
        .collect();
    assert_eq!(offsets.len(), entity_count);
    for offset in &offsets {
        assert_eq!(offset % 256, 0);
    }
    offsets.sort_unstable();
    offsets.dedup();
    assert_eq!(offsets.len(), entity_count);
}

/// Bindings are created on first use and reused afterwards; a second
/// identical frame creates nothing new.
#[test]
fn binding_cache_is_stable_across_frames() {
    let mut engine = showcase_engine();

    engine.render().unwrap();
    let after_first = engine.backend().binding_count();

    engine.backend_mut().clear_commands();
    engine.render().unwrap();
    let after_second = engine.backend().binding_count();

    assert_eq!(after_first, after_second);
}

/// Camera input moves the camera in `update` and only there; rendering
/// leaves the camera untouched.
#[test]
fn input_is_consumed_only_by_update() {
    let mut engine = showcase_engine();
    let start = engine.scene.camera.position;

    let input = CameraInput { forward: true, ..Default::default() };
    engine.update(&input, 0.5);
    let moved = engine.scene.camera.position;
    assert_ne!(moved, start);

    engine.render().unwrap();
    engine.render().unwrap();
    assert_eq!(engine.scene.camera.position, moved);

    engine.update(&CameraInput::default(), 0.5);
    assert_eq!(engine.scene.camera.position, moved);
}

/// Resizing recreates the offscreen targets at the new size; the next
/// frame renders into the new handles.
#[test]
fn resize_recreates_targets() {
    let mut engine = showcase_engine();
    let old_gbuffer = engine.gbuffer().target;

    engine.resize(512, 512).unwrap();
    let new_gbuffer = engine.gbuffer().target;
    assert_ne!(old_gbuffer, new_gbuffer);
    assert_eq!(engine.gbuffer().width, 512);

    engine.backend_mut().clear_commands();
    engine.render().unwrap();
    let targets = pass_targets(engine.backend().commands());
    assert!(targets.contains(&PassTarget::Offscreen(new_gbuffer)));
    assert!(!targets.contains(&PassTarget::Offscreen(old_gbuffer)));
}

/// The mirrored capture camera never leaks into the scene: the canonical
/// camera is bit-for-bit identical after a deferred frame.
#[test]
fn deferred_frame_preserves_camera() {
    let mut engine = showcase_engine();
    engine.scene.camera.position = Vec3::new(1.5, 3.0, 8.0);
    engine.scene.camera.pitch = -0.3;
    let before = engine.scene.camera;

    engine.render().unwrap();

    let after = engine.scene.camera;
    assert_eq!(before.position.to_array().map(f32::to_bits), after.position.to_array().map(f32::to_bits));
    assert_eq!(before.pitch.to_bits(), after.pitch.to_bits());
    assert_eq!(before.yaw.to_bits(), after.yaw.to_bits());
}
