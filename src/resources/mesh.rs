//! Mesh, submesh and model resources.
//!
//! CPU-side [`MeshData`] is what an external loader produces: raw vertex and
//! index bytes plus per-submesh layout descriptions. Uploading yields a
//! [`Mesh`] whose submeshes carry their binding caches.

use bytemuck::{Pod, Zeroable};

use crate::backend::traits::{BindingHandle, BufferHandle, ProgramHandle, RenderBackend};
use crate::backend::types::{
    BufferDescriptor, BufferUsage, IndexFormat, VertexBufferAttribute,
};
use crate::error::{RenderError, RenderResult};

/// Interleaved vertex layout description for one submesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexBufferLayout {
    pub attributes: Vec<VertexBufferAttribute>,
    pub stride: u32,
}

impl VertexBufferLayout {
    /// position vec3 (0), normal vec3 (1), texcoord vec2 (2); stride 32.
    pub fn position_normal_uv() -> Self {
        Self {
            attributes: vec![
                VertexBufferAttribute { location: 0, component_count: 3, byte_offset: 0 },
                VertexBufferAttribute { location: 1, component_count: 3, byte_offset: 12 },
                VertexBufferAttribute { location: 2, component_count: 2, byte_offset: 24 },
            ],
            stride: 32,
        }
    }

    /// position vec3 (0), texcoord vec2 (1); stride 20. Used by the water
    /// and screen quads.
    pub fn position_uv() -> Self {
        Self {
            attributes: vec![
                VertexBufferAttribute { location: 0, component_count: 3, byte_offset: 0 },
                VertexBufferAttribute { location: 1, component_count: 2, byte_offset: 12 },
            ],
            stride: 20,
        }
    }

    pub fn attribute_at_location(&self, location: u32) -> Option<&VertexBufferAttribute> {
        self.attributes.iter().find(|a| a.location == location)
    }

    /// Every attribute must fit inside the stride.
    pub fn validate(&self) -> RenderResult<()> {
        for attr in &self.attributes {
            let end = attr.byte_offset + attr.component_count as u32 * 4;
            if end > self.stride {
                return Err(RenderError::InvalidIndex {
                    table: "vertex attribute exceeds stride",
                    index: attr.location as usize,
                });
            }
        }
        Ok(())
    }
}

/// Loader-facing submesh description. `vertex_base_offset` is a byte offset
/// into the mesh's shared vertex buffer; `first_index` and `index_count`
/// count index elements, not bytes.
#[derive(Debug, Clone)]
pub struct SubMeshData {
    pub layout: VertexBufferLayout,
    pub vertex_base_offset: u64,
    pub first_index: u32,
    pub index_count: u32,
}

/// Loader-facing mesh: raw buffer bytes plus submesh table.
#[derive(Debug, Clone)]
pub struct MeshData {
    pub name: String,
    pub vertex_bytes: Vec<u8>,
    pub index_bytes: Vec<u8>,
    pub index_format: IndexFormat,
    pub submeshes: Vec<SubMeshData>,
}

/// One cached program/binding pair on a submesh.
#[derive(Debug, Clone, Copy)]
pub struct MeshBinding {
    pub program: ProgramHandle,
    pub binding: BindingHandle,
}

/// Uploaded submesh with its binding cache.
#[derive(Debug, Clone)]
pub struct SubMesh {
    pub layout: VertexBufferLayout,
    pub vertex_base_offset: u64,
    pub first_index: u32,
    pub index_count: u32,
    pub bindings: Vec<MeshBinding>,
}

/// Uploaded mesh.
#[derive(Debug)]
pub struct Mesh {
    pub name: String,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    pub index_format: IndexFormat,
    pub submeshes: Vec<SubMesh>,
}

impl Mesh {
    pub fn upload<B: RenderBackend>(backend: &mut B, data: &MeshData) -> RenderResult<Self> {
        for submesh in &data.submeshes {
            submesh.layout.validate()?;
        }
        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} vertices", data.name)),
                size: data.vertex_bytes.len() as u64,
                usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            },
            &data.vertex_bytes,
        )?;
        let index_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} indices", data.name)),
                size: data.index_bytes.len() as u64,
                usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
            },
            &data.index_bytes,
        )?;
        Ok(Self {
            name: data.name.clone(),
            vertex_buffer,
            index_buffer,
            index_format: data.index_format,
            submeshes: data
                .submeshes
                .iter()
                .map(|s| SubMesh {
                    layout: s.layout.clone(),
                    vertex_base_offset: s.vertex_base_offset,
                    first_index: s.first_index,
                    index_count: s.index_count,
                    bindings: Vec::new(),
                })
                .collect(),
        })
    }
}

/// A drawable: one mesh plus a material per submesh.
#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub mesh_index: usize,
    pub material_indices: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub albedo_texture: usize,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

/// Unit quad in the XY plane, position + texcoord, six u16 indices. The
/// composite pass draws this across the whole screen.
pub fn screen_quad() -> MeshData {
    let vertices = [
        QuadVertex { position: [-1.0, -1.0, 0.0], uv: [0.0, 0.0] },
        QuadVertex { position: [1.0, -1.0, 0.0], uv: [1.0, 0.0] },
        QuadVertex { position: [1.0, 1.0, 0.0], uv: [1.0, 1.0] },
        QuadVertex { position: [-1.0, 1.0, 0.0], uv: [0.0, 1.0] },
    ];
    let indices: [u16; 6] = [0, 1, 2, 2, 3, 0];
    MeshData {
        name: "screen quad".into(),
        vertex_bytes: bytemuck::cast_slice(&vertices).to_vec(),
        index_bytes: bytemuck::cast_slice(&indices).to_vec(),
        index_format: IndexFormat::Uint16,
        submeshes: vec![SubMeshData {
            layout: VertexBufferLayout::position_uv(),
            vertex_base_offset: 0,
            first_index: 0,
            index_count: 6,
        }],
    }
}

/// Unit quad in the XZ plane for the water surface, six u32 indices.
pub fn water_quad() -> MeshData {
    let vertices = [
        QuadVertex { position: [-1.0, 0.0, -1.0], uv: [0.0, 0.0] },
        QuadVertex { position: [1.0, 0.0, -1.0], uv: [1.0, 0.0] },
        QuadVertex { position: [1.0, 0.0, 1.0], uv: [1.0, 1.0] },
        QuadVertex { position: [-1.0, 0.0, 1.0], uv: [0.0, 1.0] },
    ];
    let indices: [u32; 6] = [0, 1, 2, 2, 3, 0];
    MeshData {
        name: "water quad".into(),
        vertex_bytes: bytemuck::cast_slice(&vertices).to_vec(),
        index_bytes: bytemuck::cast_slice(&indices).to_vec(),
        index_format: IndexFormat::Uint32,
        submeshes: vec![SubMeshData {
            layout: VertexBufferLayout::position_uv(),
            vertex_base_offset: 0,
            first_index: 0,
            index_count: 6,
        }],
    }
}

/// Unit cube with per-face normals, 24 vertices / 36 indices.
pub fn cube() -> MeshData {
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];
    let mut vertices = Vec::with_capacity(24);
    let mut indices: Vec<u32> = Vec::with_capacity(36);
    for (normal, tangent, bitangent) in faces {
        let n = glam::Vec3::from(normal);
        let t = glam::Vec3::from(tangent);
        let b = glam::Vec3::from(bitangent);
        let base = vertices.len() as u32;
        for (u, v) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            let p = n * 0.5 + t * u + b * v;
            vertices.push(Vertex {
                position: p.to_array(),
                normal,
                uv: [u + 0.5, v + 0.5],
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    MeshData {
        name: "cube".into(),
        vertex_bytes: bytemuck::cast_slice(&vertices).to_vec(),
        index_bytes: bytemuck::cast_slice(&indices).to_vec(),
        index_format: IndexFormat::Uint32,
        submeshes: vec![SubMeshData {
            layout: VertexBufferLayout::position_normal_uv(),
            vertex_base_offset: 0,
            first_index: 0,
            index_count: 36,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessBackend;

    #[test]
    fn quad_layout_matches_stride() {
        let layout = VertexBufferLayout::position_uv();
        assert_eq!(layout.stride, 20);
        assert_eq!(std::mem::size_of::<QuadVertex>(), 20);
        layout.validate().unwrap();
    }

    #[test]
    fn attribute_past_stride_is_invalid() {
        let layout = VertexBufferLayout {
            attributes: vec![VertexBufferAttribute {
                location: 0,
                component_count: 4,
                byte_offset: 8,
            }],
            stride: 20,
        };
        assert!(layout.validate().is_err());
    }

    #[test]
    fn quads_have_six_indices() {
        assert_eq!(screen_quad().submeshes[0].index_count, 6);
        assert_eq!(water_quad().submeshes[0].index_count, 6);
        assert_eq!(screen_quad().index_format, IndexFormat::Uint16);
        assert_eq!(water_quad().index_format, IndexFormat::Uint32);
    }

    #[test]
    fn submesh_offsets_use_distinct_units() {
        let quad = water_quad();
        let data = MeshData {
            name: "two quads".into(),
            vertex_bytes: quad.vertex_bytes.repeat(2),
            index_bytes: quad.index_bytes.repeat(2),
            index_format: IndexFormat::Uint32,
            submeshes: vec![
                quad.submeshes[0].clone(),
                SubMeshData {
                    layout: VertexBufferLayout::position_uv(),
                    // Bytes into the vertex buffer, elements into the index
                    // buffer.
                    vertex_base_offset: quad.vertex_bytes.len() as u64,
                    first_index: 6,
                    index_count: 6,
                },
            ],
        };
        let mut backend = HeadlessBackend::new(64, 64);
        let mesh = Mesh::upload(&mut backend, &data).unwrap();
        assert_eq!(mesh.submeshes[1].vertex_base_offset, 80);
        assert_eq!(mesh.submeshes[1].first_index, 6);
    }

    #[test]
    fn cube_uploads() {
        let mut backend = HeadlessBackend::new(64, 64);
        let mesh = Mesh::upload(&mut backend, &cube()).unwrap();
        assert_eq!(mesh.submeshes.len(), 1);
        assert_eq!(mesh.submeshes[0].index_count, 36);
        assert!(mesh.submeshes[0].bindings.is_empty());
    }
}
