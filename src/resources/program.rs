//! Index-addressed program registry.

use std::path::PathBuf;
use std::time::SystemTime;

use crate::backend::traits::{ProgramBindings, ProgramDescriptor, ProgramHandle, RenderBackend};
use crate::backend::types::TextureFormat;
use crate::error::{RenderError, RenderResult};
use crate::shader::{self, ShaderSource, VertexShaderLayout};

/// Color/depth formats of the pass family a program renders into. `None`
/// color entries mean the presentation surface.
#[derive(Debug, Clone)]
pub struct ProgramTarget {
    pub color_formats: Vec<Option<TextureFormat>>,
    pub depth_format: Option<TextureFormat>,
}

impl ProgramTarget {
    /// Single color output to the backbuffer with depth.
    pub fn backbuffer() -> Self {
        Self {
            color_formats: vec![None],
            depth_format: Some(TextureFormat::Depth24Plus),
        }
    }

    /// The four G-buffer attachments with depth.
    pub fn gbuffer() -> Self {
        Self {
            color_formats: vec![
                Some(TextureFormat::Rgba8Unorm),
                Some(TextureFormat::Rgba16Float),
                Some(TextureFormat::Rgba16Float),
                Some(TextureFormat::Rgba16Float),
            ],
            depth_format: Some(TextureFormat::Depth24Plus),
        }
    }

    /// One capture color attachment with depth.
    pub fn capture() -> Self {
        Self {
            color_formats: vec![Some(TextureFormat::Rgba8Unorm)],
            depth_format: Some(TextureFormat::Depth24Plus),
        }
    }

    /// Backbuffer composite draw, no depth.
    pub fn composite() -> Self {
        Self {
            color_formats: vec![None],
            depth_format: None,
        }
    }
}

/// A loaded program: backend handle plus reflection data and the source
/// metadata a hot-reload loop compares against.
#[derive(Debug, Clone)]
pub struct Program {
    pub handle: ProgramHandle,
    pub name: String,
    pub source_path: Option<PathBuf>,
    pub last_modified: Option<SystemTime>,
    pub vertex_layout: VertexShaderLayout,
    pub bindings: ProgramBindings,
}

/// Append-only program list; indices stay valid for the process lifetime.
#[derive(Default)]
pub struct ProgramRegistry {
    programs: Vec<Program>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register a program. Compilation failures are logged with
    /// the full diagnostic and surface as an error; nothing is registered
    /// in that case.
    pub fn load<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        source: &ShaderSource,
        target: &ProgramTarget,
    ) -> RenderResult<usize> {
        let compiled = shader::compile(source)?;
        let handle = backend.create_program(&ProgramDescriptor {
            name: source.name.clone(),
            vertex_wgsl: compiled.vertex_wgsl,
            fragment_wgsl: compiled.fragment_wgsl,
            bindings: compiled.bindings.clone(),
            color_formats: target.color_formats.clone(),
            depth_format: target.depth_format,
        })?;
        self.programs.push(Program {
            handle,
            name: source.name.clone(),
            source_path: source.path.clone(),
            last_modified: source.last_modified,
            vertex_layout: compiled.vertex_layout,
            bindings: compiled.bindings,
        });
        log::info!("loaded program '{}' (index {})", source.name, self.programs.len() - 1);
        Ok(self.programs.len() - 1)
    }

    pub fn get(&self, index: usize) -> RenderResult<&Program> {
        self.programs.get(index).ok_or(RenderError::InvalidIndex {
            table: "program",
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// True when the on-disk source is newer than what was compiled.
    pub fn is_stale(&self, index: usize, current_modified: SystemTime) -> bool {
        match self.programs.get(index).and_then(|p| p.last_modified) {
            Some(loaded) => current_modified > loaded,
            None => false,
        }
    }
}
