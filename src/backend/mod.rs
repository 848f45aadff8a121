//! GPU backend abstraction.

pub mod headless;
pub mod traits;
pub mod types;

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

pub use headless::HeadlessBackend;
pub use traits::{BackendError, BackendResult, RenderBackend};
