//! Crate-level error type.

use thiserror::Error;

use crate::backend::traits::BackendError;

/// Errors surfaced by the renderer.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A shader stage failed to parse, validate or translate. The full
    /// driver/front-end diagnostic has already been logged, tagged with the
    /// program name.
    #[error("shader compilation failed for program '{name}': {message}")]
    ShaderCompilation { name: String, message: String },

    /// A shader consumes a vertex attribute location the bound submesh does
    /// not provide.
    #[error("program '{program}' reads vertex attribute location {location} that the mesh layout does not provide")]
    LayoutMismatch { program: String, location: u32 },

    /// The per-frame uniform arena ran out of space. The arena is sized to
    /// the device's maximum uniform block size, so this is a configuration
    /// error (too many entities or lights for the device).
    #[error("uniform arena overflow: frame needs {required} bytes, capacity is {capacity}")]
    UniformOverflow { required: u64, capacity: u64 },

    /// An index into one of the asset tables was out of range.
    #[error("invalid {table} index {index}")]
    InvalidIndex { table: &'static str, index: usize },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type RenderResult<T> = Result<T, RenderError>;
