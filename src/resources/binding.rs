//! Vertex layout matcher and per-submesh binding cache.
//!
//! A binding pairs one submesh's vertex fetch state with one program. The
//! cache lives on the submesh and is searched linearly by program handle;
//! programs and mesh layouts are immutable, so entries are never
//! invalidated.

use crate::backend::traits::{BindingDescriptor, BindingHandle, RenderBackend};
use crate::error::{RenderError, RenderResult};
use crate::resources::mesh::{Mesh, MeshBinding};
use crate::resources::program::Program;

/// Return the binding for `(submesh, program)`, creating and caching it on
/// first use.
///
/// Every attribute the program's vertex stage reads must exist in the
/// submesh layout at the same location; a missing location is a fatal
/// [`RenderError::LayoutMismatch`]. A component-count disagreement is only
/// logged, matching driver behavior of padding or truncating.
pub fn find_binding<B: RenderBackend>(
    backend: &mut B,
    mesh: &mut Mesh,
    submesh_index: usize,
    program: &Program,
) -> RenderResult<BindingHandle> {
    let index_format = mesh.index_format;
    let vertex_buffer = mesh.vertex_buffer;
    let index_buffer = mesh.index_buffer;
    let submesh = mesh
        .submeshes
        .get_mut(submesh_index)
        .ok_or(RenderError::InvalidIndex { table: "submesh", index: submesh_index })?;

    if let Some(cached) = submesh
        .bindings
        .iter()
        .find(|b| b.program == program.handle)
    {
        return Ok(cached.binding);
    }

    let mut attributes = Vec::with_capacity(program.vertex_layout.attributes.len());
    for shader_attr in &program.vertex_layout.attributes {
        let buffer_attr = submesh
            .layout
            .attribute_at_location(shader_attr.location)
            .ok_or_else(|| RenderError::LayoutMismatch {
                program: program.name.clone(),
                location: shader_attr.location,
            })?;
        if buffer_attr.component_count != shader_attr.component_count {
            log::warn!(
                "program '{}' location {}: shader reads {} components, buffer provides {}",
                program.name,
                shader_attr.location,
                shader_attr.component_count,
                buffer_attr.component_count
            );
        }
        attributes.push(*buffer_attr);
    }

    let binding = backend.create_binding(&BindingDescriptor {
        program: program.handle,
        vertex_buffer,
        index_buffer,
        vertex_base_offset: submesh.vertex_base_offset,
        stride: submesh.layout.stride,
        attributes,
        index_format,
    })?;
    submesh.bindings.push(MeshBinding {
        program: program.handle,
        binding,
    });
    Ok(binding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessBackend;
    use crate::resources::mesh::{cube, screen_quad, Mesh};
    use crate::resources::program::{ProgramRegistry, ProgramTarget};
    use crate::shader::ShaderSource;

    const GEOMETRY_STYLE: &str = r#"
#ifdef VERTEX
layout(location = 0) in vec3 aPosition;
layout(location = 1) in vec3 aNormal;
layout(location = 2) in vec2 aTexCoord;
layout(location = 0) out vec2 vTexCoord;
void main() {
    vTexCoord = aTexCoord;
    gl_Position = vec4(aPosition + aNormal * 0.0, 1.0);
}
#endif
#ifdef FRAGMENT
layout(location = 0) in vec2 vTexCoord;
layout(location = 0) out vec4 oColor;
void main() { oColor = vec4(vTexCoord, 0.0, 1.0); }
#endif
"#;

    const POSITION_ONLY: &str = r#"
#ifdef VERTEX
layout(location = 0) in vec3 aPosition;
void main() { gl_Position = vec4(aPosition, 1.0); }
#endif
#ifdef FRAGMENT
layout(location = 0) out vec4 oColor;
void main() { oColor = vec4(1.0); }
#endif
"#;

    fn setup() -> (HeadlessBackend, ProgramRegistry, Mesh) {
        let mut backend = HeadlessBackend::new(32, 32);
        let registry = ProgramRegistry::new();
        let mesh = Mesh::upload(&mut backend, &cube()).unwrap();
        (backend, registry, mesh)
    }

    #[test]
    fn repeated_lookup_returns_cached_binding() {
        let (mut backend, mut registry, mut mesh) = setup();
        let index = registry
            .load(
                &mut backend,
                &ShaderSource::new("GEOM", GEOMETRY_STYLE),
                &ProgramTarget::gbuffer(),
            )
            .unwrap();
        let program = registry.get(index).unwrap().clone();

        let first = find_binding(&mut backend, &mut mesh, 0, &program).unwrap();
        let created = backend.binding_count();
        let second = find_binding(&mut backend, &mut mesh, 0, &program).unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.binding_count(), created);
        assert_eq!(mesh.submeshes[0].bindings.len(), 1);
    }

    #[test]
    fn distinct_programs_get_distinct_cache_entries() {
        let (mut backend, mut registry, mut mesh) = setup();
        let a = registry
            .load(
                &mut backend,
                &ShaderSource::new("A", GEOMETRY_STYLE),
                &ProgramTarget::gbuffer(),
            )
            .unwrap();
        let b = registry
            .load(
                &mut backend,
                &ShaderSource::new("B", POSITION_ONLY),
                &ProgramTarget::backbuffer(),
            )
            .unwrap();
        let prog_a = registry.get(a).unwrap().clone();
        let prog_b = registry.get(b).unwrap().clone();

        let binding_a = find_binding(&mut backend, &mut mesh, 0, &prog_a).unwrap();
        let binding_b = find_binding(&mut backend, &mut mesh, 0, &prog_b).unwrap();

        assert_ne!(binding_a, binding_b);
        assert_eq!(mesh.submeshes[0].bindings.len(), 2);
    }

    #[test]
    fn missing_location_is_fatal() {
        let mut backend = HeadlessBackend::new(32, 32);
        let mut registry = ProgramRegistry::new();
        // Quad layout has locations 0 and 1 only; the geometry-style
        // program wants a normal at location 1 with 3 components and a
        // texcoord at 2, which the quad lacks.
        let mut mesh = Mesh::upload(&mut backend, &screen_quad()).unwrap();
        let index = registry
            .load(
                &mut backend,
                &ShaderSource::new("GEOM", GEOMETRY_STYLE),
                &ProgramTarget::gbuffer(),
            )
            .unwrap();
        let program = registry.get(index).unwrap().clone();

        let err = find_binding(&mut backend, &mut mesh, 0, &program).unwrap_err();
        match err {
            RenderError::LayoutMismatch { program, location } => {
                assert_eq!(program, "GEOM");
                assert_eq!(location, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(mesh.submeshes[0].bindings.is_empty());
    }

    #[test]
    fn binding_records_submesh_fetch_state() {
        let (mut backend, mut registry, mut mesh) = setup();
        let index = registry
            .load(
                &mut backend,
                &ShaderSource::new("GEOM", GEOMETRY_STYLE),
                &ProgramTarget::gbuffer(),
            )
            .unwrap();
        let program = registry.get(index).unwrap().clone();
        let binding = find_binding(&mut backend, &mut mesh, 0, &program).unwrap();
        let desc = backend.binding_descriptor(binding).unwrap();
        assert_eq!(desc.stride, 32);
        assert_eq!(desc.attributes.len(), 3);
        assert_eq!(desc.vertex_base_offset, 0);
        assert_eq!(desc.program, program.handle);
    }
}
