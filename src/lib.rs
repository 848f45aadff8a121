//! waterline: a deferred rendering core with planar water reflections.
//!
//! The engine renders a scene of textured models around a reflective water
//! plane. A deferred frame captures the mirrored reflection and the
//! refraction into offscreen targets, fills a four-attachment G-buffer,
//! draws the water quad from the captures, and resolves lighting in a
//! full-screen composite. A forward mode draws lit geometry straight to
//! the backbuffer.
//!
//! The GPU is reached only through [`backend::RenderBackend`];
//! [`backend::HeadlessBackend`] records frames for tests, and the
//! `wgpu-backend` feature provides the real implementation.

pub mod backend;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod resources;
pub mod scene;
pub mod shader;

pub use backend::{HeadlessBackend, RenderBackend};
pub use engine::{Engine, RendererConfig};
pub use error::{RenderError, RenderResult};
pub use pipeline::RenderMode;
pub use scene::{Camera, CameraInput, Light, LightKind, Scene, WaterPlane};
pub use shader::ShaderSource;

#[cfg(feature = "wgpu-backend")]
pub use backend::wgpu_backend::WgpuBackend;
