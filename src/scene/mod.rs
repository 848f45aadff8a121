//! Scene state: camera, entities, lights and the water plane.

pub mod camera;
pub mod light;

pub use camera::{Camera, CameraInput};
pub use light::{Light, LightKind};

use glam::{Mat4, Quat, Vec3};

use crate::resources::uniforms::UniformRange;

/// One renderable instance of a model.
#[derive(Debug, Clone)]
pub struct Entity {
    pub world: Mat4,
    pub model_index: usize,
    /// Arena slice written for this entity by the current pass update.
    pub uniform_range: Option<UniformRange>,
}

impl Entity {
    pub fn new(world: Mat4, model_index: usize) -> Self {
        Self {
            world,
            model_index,
            uniform_range: None,
        }
    }

    pub fn at(position: Vec3, model_index: usize) -> Self {
        Self::new(Mat4::from_translation(position), model_index)
    }
}

/// The reflective water surface.
#[derive(Debug, Clone)]
pub struct WaterPlane {
    pub world: Mat4,
    pub mesh_index: usize,
}

impl WaterPlane {
    /// Quad at y = -2, scaled by 20, flipped to face up.
    pub fn new(mesh_index: usize) -> Self {
        let world = Mat4::from_scale_rotation_translation(
            Vec3::splat(20.0),
            Quat::from_rotation_x(std::f32::consts::PI),
            Vec3::new(0.0, -2.0, 0.0),
        );
        Self { world, mesh_index }
    }

    pub fn with_world(world: Mat4, mesh_index: usize) -> Self {
        Self { world, mesh_index }
    }

    /// Water height is the plane's world-space translation along Y.
    pub fn height(&self) -> f32 {
        self.world.w_axis.y
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub camera: Camera,
    pub entities: Vec<Entity>,
    pub lights: Vec<Light>,
    pub water: Option<WaterPlane>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    /// Populate a showcase scene: a row of model entities, two directional
    /// lights, and three point lights each accompanied by a small marker
    /// entity so the light positions are visible.
    pub fn populate_showcase(&mut self, model_index: usize, marker_model_index: usize) {
        for (i, x) in [-4.0f32, 0.0, 4.0].iter().enumerate() {
            self.add_entity(Entity::at(Vec3::new(*x, 0.0, -2.0 * i as f32), model_index));
        }

        self.add_light(Light::directional(
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(1.0, -1.0, 1.0),
        ));
        self.add_light(Light::directional(
            Vec3::new(0.4, 0.4, 0.6),
            Vec3::new(-1.0, -1.0, 0.0),
        ));

        let points = [
            (Vec3::new(1.0, 0.2, 0.2), Vec3::new(3.0, 1.0, 2.0)),
            (Vec3::new(0.2, 1.0, 0.2), Vec3::new(-3.0, 1.0, 2.0)),
            (Vec3::new(0.2, 0.2, 1.0), Vec3::new(0.0, 1.0, -4.0)),
        ];
        for (color, position) in points {
            self.add_light(Light::point(color, position));
            self.add_entity(Entity::new(
                Mat4::from_scale_rotation_translation(
                    Vec3::splat(0.2),
                    Quat::IDENTITY,
                    position,
                ),
                marker_model_index,
            ));
        }
    }
}
