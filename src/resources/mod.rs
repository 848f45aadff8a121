//! GPU resource tables.
//!
//! Everything is index-addressed and append-only; indices are stable for
//! the process lifetime.

pub mod binding;
pub mod mesh;
pub mod program;
pub mod targets;
pub mod texture;
pub mod uniforms;

use crate::backend::traits::RenderBackend;
use crate::error::{RenderError, RenderResult};
use mesh::{Material, Mesh, MeshData, Model};
use texture::Texture;

/// The asset tables: meshes, models, materials and textures.
#[derive(Default)]
pub struct AssetStore {
    pub meshes: Vec<Mesh>,
    pub models: Vec<Model>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
}

impl AssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        data: &MeshData,
    ) -> RenderResult<usize> {
        let mesh = Mesh::upload(backend, data)?;
        self.meshes.push(mesh);
        Ok(self.meshes.len() - 1)
    }

    pub fn add_texture_rgba8<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        label: &str,
        width: u32,
        height: u32,
        texels: &[u8],
    ) -> RenderResult<usize> {
        let texture = Texture::from_rgba8(backend, label, width, height, texels)?;
        self.textures.push(texture);
        Ok(self.textures.len() - 1)
    }

    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_model(&mut self, model: Model) -> usize {
        self.models.push(model);
        self.models.len() - 1
    }

    pub fn model(&self, index: usize) -> RenderResult<&Model> {
        self.models.get(index).ok_or(RenderError::InvalidIndex { table: "model", index })
    }

    pub fn material(&self, index: usize) -> RenderResult<&Material> {
        self.materials.get(index).ok_or(RenderError::InvalidIndex { table: "material", index })
    }

    pub fn texture(&self, index: usize) -> RenderResult<&Texture> {
        self.textures.get(index).ok_or(RenderError::InvalidIndex { table: "texture", index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessBackend;
    use crate::resources::mesh::cube;

    #[test]
    fn tables_hand_out_sequential_indices() {
        let mut backend = HeadlessBackend::new(8, 8);
        let mut assets = AssetStore::new();
        let mesh = assets.add_mesh(&mut backend, &cube()).unwrap();
        let tex = assets
            .add_texture_rgba8(&mut backend, "t", 1, 1, &[0, 0, 0, 255])
            .unwrap();
        let mat = assets.add_material(Material { name: "m".into(), albedo_texture: tex });
        let model = assets.add_model(Model {
            name: "cube".into(),
            mesh_index: mesh,
            material_indices: vec![mat],
        });
        assert_eq!((mesh, tex, mat, model), (0, 0, 0, 0));
        assert!(assets.model(1).is_err());
    }
}
