//! GLSL program compilation.
//!
//! A program is a single GLSL source file holding both stages behind
//! `#ifdef VERTEX` / `#ifdef FRAGMENT` guards. Each stage is assembled by
//! prepending a fixed textual preamble, parsed with naga's GLSL frontend,
//! validated, reflected, and translated to WGSL for the backend.
//!
//! The preamble contract, in order:
//!
//! ```text
//! #version 440
//! #define <PROGRAM_NAME>
//! #define VERTEX        (or FRAGMENT)
//! <shared source text>
//! ```

use std::path::PathBuf;
use std::time::SystemTime;

use crate::backend::traits::{ProgramBindings, ResourceSlot, UniformBlockSlot};
use crate::error::RenderError;

/// Shader stages a program is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn define(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "VERTEX",
            ShaderStage::Fragment => "FRAGMENT",
        }
    }

    fn naga_stage(&self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

/// Raw program text handed in by the host's file loader, plus the metadata
/// a hot-reload loop needs to detect stale programs.
#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub name: String,
    pub text: String,
    pub path: Option<PathBuf>,
    pub last_modified: Option<SystemTime>,
}

impl ShaderSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            path: None,
            last_modified: None,
        }
    }
}

/// One active vertex-stage input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexShaderAttribute {
    pub location: u32,
    pub component_count: u8,
}

/// Active vertex inputs of a compiled program, sorted by location.
#[derive(Debug, Clone, Default)]
pub struct VertexShaderLayout {
    pub attributes: Vec<VertexShaderAttribute>,
}

/// Output of [`compile`]: per-stage WGSL plus reflection tables.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub vertex_wgsl: String,
    pub fragment_wgsl: String,
    pub vertex_layout: VertexShaderLayout,
    pub bindings: ProgramBindings,
}

/// Assemble the final source text for one stage per the preamble contract.
pub fn assemble_stage_source(name: &str, text: &str, stage: ShaderStage) -> String {
    format!("#version 440\n#define {}\n#define {}\n{}", name, stage.define(), text)
}

/// Compile both stages of a program.
///
/// On failure the full front-end diagnostic is logged at `error` level,
/// tagged with the program name, and a [`RenderError::ShaderCompilation`]
/// is returned.
pub fn compile(source: &ShaderSource) -> Result<CompiledProgram, RenderError> {
    let mut bindings = ProgramBindings::default();

    let mut vertex_module = parse_stage(&source.name, &source.text, ShaderStage::Vertex)?;
    remap_resource_bindings(&mut vertex_module, &mut bindings);
    let vertex_layout = introspect_vertex_layout(&vertex_module);
    let vertex_wgsl = emit_wgsl(&source.name, &vertex_module)?;

    let mut fragment_module = parse_stage(&source.name, &source.text, ShaderStage::Fragment)?;
    remap_resource_bindings(&mut fragment_module, &mut bindings);
    let fragment_wgsl = emit_wgsl(&source.name, &fragment_module)?;

    log::debug!(
        "compiled program '{}': {} vertex attributes, {} uniform blocks, {} textures",
        source.name,
        vertex_layout.attributes.len(),
        bindings.uniform_blocks.len(),
        bindings.textures.len()
    );

    Ok(CompiledProgram {
        vertex_wgsl,
        fragment_wgsl,
        vertex_layout,
        bindings,
    })
}

fn parse_stage(name: &str, text: &str, stage: ShaderStage) -> Result<naga::Module, RenderError> {
    let assembled = assemble_stage_source(name, text, stage);

    let options = naga::front::glsl::Options {
        stage: stage.naga_stage(),
        defines: naga::FastHashMap::default(),
    };
    let mut frontend = naga::front::glsl::Frontend::default();
    frontend.parse(&options, &assembled).map_err(|errors| {
        let message = format!("{} stage parse error:\n{errors}", stage.define());
        log::error!("program '{}': {}", name, message);
        RenderError::ShaderCompilation {
            name: name.to_string(),
            message,
        }
    })
}

fn emit_wgsl(name: &str, module: &naga::Module) -> Result<String, RenderError> {
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    let info = validator.validate(module).map_err(|e| {
        let message = format!("validation error: {e}");
        log::error!("program '{}': {}", name, message);
        RenderError::ShaderCompilation {
            name: name.to_string(),
            message,
        }
    })?;

    naga::back::wgsl::write_string(module, &info, naga::back::wgsl::WriterFlags::empty()).map_err(
        |e| {
            let message = format!("WGSL generation error: {e}");
            log::error!("program '{}': {}", name, message);
            RenderError::ShaderCompilation {
                name: name.to_string(),
                message,
            }
        },
    )
}

/// Base WGSL binding index for texture resources after remapping.
const TEXTURE_BINDING_BASE: u32 = 16;
/// Base WGSL binding index for sampler resources after remapping.
const SAMPLER_BINDING_BASE: u32 = 32;

/// Rewrite resource bindings into one collision-free scheme shared by both
/// stages, accumulating the reflection tables.
///
/// Uniform blocks keep their declared GLSL binding as the frontend-visible
/// slot. Image globals (`texture2D` and friends) move to
/// `TEXTURE_BINDING_BASE + unit` and `sampler` globals to
/// `SAMPLER_BINDING_BASE + unit`, where `unit` is declaration order. The
/// scheme is deterministic, so a block declared in both stages lands on the
/// same group/binding in each.
fn remap_resource_bindings(module: &mut naga::Module, bindings: &mut ProgramBindings) {
    let mut texture_unit = 0u32;
    let mut sampler_unit = 0u32;
    let mut block_fallback = 0u32;

    let gctx = module.to_ctx();

    let mut new_bindings: Vec<(naga::Handle<naga::GlobalVariable>, naga::ResourceBinding)> =
        Vec::new();
    let mut block_sizes: Vec<(u32, u64)> = Vec::new();

    for (handle, var) in module.global_variables.iter() {
        match &module.types[var.ty].inner {
            naga::TypeInner::Image { .. } => {
                let binding = naga::ResourceBinding {
                    group: 0,
                    binding: TEXTURE_BINDING_BASE + texture_unit,
                };
                let slot = ResourceSlot { group: binding.group, binding: binding.binding };
                if !bindings.textures.contains(&slot) {
                    bindings.textures.push(slot);
                }
                new_bindings.push((handle, binding));
                texture_unit += 1;
            }
            naga::TypeInner::Sampler { .. } => {
                let binding = naga::ResourceBinding {
                    group: 0,
                    binding: SAMPLER_BINDING_BASE + sampler_unit,
                };
                let slot = ResourceSlot { group: binding.group, binding: binding.binding };
                if !bindings.samplers.contains(&slot) {
                    bindings.samplers.push(slot);
                }
                new_bindings.push((handle, binding));
                sampler_unit += 1;
            }
            inner if var.space == naga::AddressSpace::Uniform => {
                let declared = var
                    .binding
                    .as_ref()
                    .map(|b| b.binding)
                    .unwrap_or_else(|| {
                        let slot = block_fallback;
                        block_fallback += 1;
                        slot
                    });
                let binding = naga::ResourceBinding { group: 0, binding: declared };
                let size = inner.size(gctx) as u64;
                new_bindings.push((handle, binding));
                block_sizes.push((declared, size));
            }
            _ => {}
        }
    }

    for (handle, binding) in new_bindings {
        module.global_variables[handle].binding = Some(binding);
    }

    for (slot, min_size) in block_sizes {
        let resource = ResourceSlot { group: 0, binding: slot };
        match bindings.uniform_blocks.iter_mut().find(|b| b.slot == slot) {
            Some(existing) => existing.min_size = existing.min_size.max(min_size),
            None => bindings.uniform_blocks.push(UniformBlockSlot {
                slot,
                resource,
                min_size,
            }),
        }
    }
    bindings.uniform_blocks.sort_by_key(|b| b.slot);
}

/// Collect the vertex entry point's location-bound inputs, the analog of
/// the driver's active-attribute list.
fn introspect_vertex_layout(module: &naga::Module) -> VertexShaderLayout {
    let mut attributes = Vec::new();
    for entry in &module.entry_points {
        if entry.stage != naga::ShaderStage::Vertex {
            continue;
        }
        for arg in &entry.function.arguments {
            if let Some(naga::Binding::Location { location, .. }) = arg.binding {
                attributes.push(VertexShaderAttribute {
                    location,
                    component_count: component_count(module, arg.ty),
                });
            }
        }
    }
    attributes.sort_by_key(|a| a.location);
    VertexShaderLayout { attributes }
}

fn component_count(module: &naga::Module, ty: naga::Handle<naga::Type>) -> u8 {
    match module.types[ty].inner {
        naga::TypeInner::Scalar(_) => 1,
        naga::TypeInner::Vector { size, .. } => match size {
            naga::VectorSize::Bi => 2,
            naga::VectorSize::Tri => 3,
            naga::VectorSize::Quad => 4,
        },
        naga::TypeInner::Matrix { columns, rows, .. } => columns as u8 * rows as u8,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIT_QUAD: &str = r#"
#ifdef VERTEX
layout(location = 0) in vec3 aPosition;
layout(location = 1) in vec3 aNormal;
layout(location = 2) in vec2 aTexCoord;

layout(binding = 1, std140) uniform LocalParams {
    mat4 uWorldMatrix;
    mat4 uWorldViewProjectionMatrix;
};

layout(location = 0) out vec3 vNormal;
layout(location = 1) out vec2 vTexCoord;

void main() {
    vNormal = mat3(uWorldMatrix) * aNormal;
    vTexCoord = aTexCoord;
    gl_Position = uWorldViewProjectionMatrix * vec4(aPosition, 1.0);
}
#endif

#ifdef FRAGMENT
layout(binding = 0) uniform texture2D uAlbedoMap;
layout(binding = 0) uniform sampler uAlbedoSampler;

layout(location = 0) in vec3 vNormal;
layout(location = 1) in vec2 vTexCoord;

layout(location = 0) out vec4 oColor;

void main() {
    float shade = max(dot(normalize(vNormal), vec3(0.0, 1.0, 0.0)), 0.2);
    oColor = vec4(texture(sampler2D(uAlbedoMap, uAlbedoSampler), vTexCoord).rgb * shade, 1.0);
}
#endif
"#;

    #[test]
    fn preamble_follows_contract() {
        let assembled = assemble_stage_source("LIT_QUAD", "void main() {}\n", ShaderStage::Vertex);
        assert!(assembled.starts_with(
            "#version 440\n#define LIT_QUAD\n#define VERTEX\nvoid main() {}\n"
        ));
        let fragment =
            assemble_stage_source("LIT_QUAD", "void main() {}\n", ShaderStage::Fragment);
        assert!(fragment.contains("#define FRAGMENT\n"));
    }

    #[test]
    fn compiles_both_stages() {
        let source = ShaderSource::new("LIT_QUAD", LIT_QUAD);
        let compiled = compile(&source).unwrap();
        assert!(!compiled.vertex_wgsl.is_empty());
        assert!(!compiled.fragment_wgsl.is_empty());
    }

    #[test]
    fn introspects_active_attributes() {
        let compiled = compile(&ShaderSource::new("LIT_QUAD", LIT_QUAD)).unwrap();
        let attrs = &compiled.vertex_layout.attributes;
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs[0], VertexShaderAttribute { location: 0, component_count: 3 });
        assert_eq!(attrs[1], VertexShaderAttribute { location: 1, component_count: 3 });
        assert_eq!(attrs[2], VertexShaderAttribute { location: 2, component_count: 2 });
    }

    #[test]
    fn reflects_blocks_and_textures() {
        let compiled = compile(&ShaderSource::new("LIT_QUAD", LIT_QUAD)).unwrap();
        let blocks = &compiled.bindings.uniform_blocks;
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].slot, 1);
        assert_eq!(blocks[0].min_size, 128);
        assert_eq!(compiled.bindings.textures.len(), 1);
        assert_eq!(compiled.bindings.textures[0].binding, TEXTURE_BINDING_BASE);
        assert_eq!(compiled.bindings.samplers.len(), 1);
        assert_eq!(compiled.bindings.samplers[0].binding, SAMPLER_BINDING_BASE);
    }

    #[test]
    fn parse_failure_reports_program_name() {
        let source = ShaderSource::new("BROKEN", "#ifdef VERTEX\nthis is not glsl\n#endif\n");
        let err = compile(&source).unwrap_err();
        match err {
            RenderError::ShaderCompilation { name, .. } => assert_eq!(name, "BROKEN"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
