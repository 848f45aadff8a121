//! Offscreen render target construction.
//!
//! All attachment textures use nearest filtering and clamp-to-edge, and are
//! created render-attachment + sampleable so later passes can read them.

use crate::backend::traits::{RenderBackend, RenderTargetDescriptor, RenderTargetHandle, TextureHandle};
use crate::backend::types::{
    AddressMode, FilterMode, TextureDescriptor, TextureFormat, TextureUsage,
};
use crate::error::RenderResult;

fn attachment<B: RenderBackend>(
    backend: &mut B,
    label: &str,
    width: u32,
    height: u32,
    format: TextureFormat,
) -> RenderResult<TextureHandle> {
    Ok(backend.create_texture(&TextureDescriptor {
        label: Some(label.into()),
        width,
        height,
        format,
        usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        filter: FilterMode::Nearest,
        address: AddressMode::ClampToEdge,
    })?)
}

/// Geometry buffer: albedo (RGBA8), normals, world positions and view
/// directions (RGBA16F), plus 24-bit depth.
#[derive(Debug, Clone)]
pub struct GBuffer {
    pub target: RenderTargetHandle,
    pub albedo: TextureHandle,
    pub normals: TextureHandle,
    pub positions: TextureHandle,
    pub view_dirs: TextureHandle,
    pub depth: TextureHandle,
    pub width: u32,
    pub height: u32,
}

impl GBuffer {
    pub fn new<B: RenderBackend>(backend: &mut B, width: u32, height: u32) -> RenderResult<Self> {
        let albedo = attachment(backend, "gbuffer albedo", width, height, TextureFormat::Rgba8Unorm)?;
        let normals =
            attachment(backend, "gbuffer normals", width, height, TextureFormat::Rgba16Float)?;
        let positions =
            attachment(backend, "gbuffer positions", width, height, TextureFormat::Rgba16Float)?;
        let view_dirs =
            attachment(backend, "gbuffer view dirs", width, height, TextureFormat::Rgba16Float)?;
        let depth = attachment(backend, "gbuffer depth", width, height, TextureFormat::Depth24Plus)?;
        let target = backend.create_render_target(&RenderTargetDescriptor {
            label: Some("gbuffer".into()),
            color: vec![albedo, normals, positions, view_dirs],
            depth: Some(depth),
            width,
            height,
        })?;
        Ok(Self { target, albedo, normals, positions, view_dirs, depth, width, height })
    }

    /// Attachments in composite texture-unit order.
    pub fn color_attachments(&self) -> [TextureHandle; 4] {
        [self.albedo, self.normals, self.positions, self.view_dirs]
    }

    pub fn destroy<B: RenderBackend>(&self, backend: &mut B) -> RenderResult<()> {
        backend.destroy_render_target(self.target)?;
        for tex in [self.albedo, self.normals, self.positions, self.view_dirs, self.depth] {
            backend.destroy_texture(tex)?;
        }
        Ok(())
    }
}

/// Water capture target (reflection or refraction): one RGBA8 color plus
/// 24-bit depth. Both handles stay exposed; hosts sample the color and may
/// inspect the depth.
#[derive(Debug, Clone)]
pub struct WaterCapture {
    pub target: RenderTargetHandle,
    pub color: TextureHandle,
    pub depth: TextureHandle,
    pub width: u32,
    pub height: u32,
}

impl WaterCapture {
    pub fn new<B: RenderBackend>(
        backend: &mut B,
        label: &str,
        width: u32,
        height: u32,
    ) -> RenderResult<Self> {
        let color = attachment(
            backend,
            &format!("{label} color"),
            width,
            height,
            TextureFormat::Rgba8Unorm,
        )?;
        let depth = attachment(
            backend,
            &format!("{label} depth"),
            width,
            height,
            TextureFormat::Depth24Plus,
        )?;
        let target = backend.create_render_target(&RenderTargetDescriptor {
            label: Some(label.into()),
            color: vec![color],
            depth: Some(depth),
            width,
            height,
        })?;
        Ok(Self { target, color, depth, width, height })
    }

    pub fn destroy<B: RenderBackend>(&self, backend: &mut B) -> RenderResult<()> {
        backend.destroy_render_target(self.target)?;
        backend.destroy_texture(self.color)?;
        backend.destroy_texture(self.depth)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessBackend;

    #[test]
    fn gbuffer_has_expected_attachment_formats() {
        let mut backend = HeadlessBackend::new(128, 64);
        let gbuffer = GBuffer::new(&mut backend, 128, 64).unwrap();
        let desc = backend.target_descriptor(gbuffer.target).unwrap();
        assert_eq!(desc.color.len(), 4);
        assert!(desc.depth.is_some());

        let formats: Vec<_> = gbuffer
            .color_attachments()
            .iter()
            .map(|t| backend.texture_descriptor(*t).unwrap().format)
            .collect();
        assert_eq!(
            formats,
            vec![
                TextureFormat::Rgba8Unorm,
                TextureFormat::Rgba16Float,
                TextureFormat::Rgba16Float,
                TextureFormat::Rgba16Float,
            ]
        );
        assert_eq!(
            backend.texture_descriptor(gbuffer.depth).unwrap().format,
            TextureFormat::Depth24Plus
        );
    }

    #[test]
    fn capture_target_is_single_color_plus_depth() {
        let mut backend = HeadlessBackend::new(64, 64);
        let capture = WaterCapture::new(&mut backend, "reflection", 64, 64).unwrap();
        let desc = backend.target_descriptor(capture.target).unwrap();
        assert_eq!(desc.color.len(), 1);
        assert_eq!(
            backend.texture_descriptor(capture.color).unwrap().format,
            TextureFormat::Rgba8Unorm
        );
    }

    #[test]
    fn destroy_releases_resources() {
        let mut backend = HeadlessBackend::new(64, 64);
        let capture = WaterCapture::new(&mut backend, "refraction", 64, 64).unwrap();
        capture.destroy(&mut backend).unwrap();
        assert!(backend.target_descriptor(capture.target).is_none());
    }
}
