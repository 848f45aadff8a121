//! Texture table entries.

use crate::backend::traits::{RenderBackend, TextureHandle};
use crate::backend::types::{
    AddressMode, FilterMode, TextureDescriptor, TextureFormat, TextureUsage,
};
use crate::error::RenderResult;

#[derive(Debug, Clone)]
pub struct Texture {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    /// Upload a tightly packed RGBA8 texel blob.
    pub fn from_rgba8<B: RenderBackend>(
        backend: &mut B,
        label: &str,
        width: u32,
        height: u32,
        texels: &[u8],
    ) -> RenderResult<Self> {
        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(label.into()),
            width,
            height,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            filter: FilterMode::Linear,
            address: AddressMode::Repeat,
        })?;
        backend.write_texture(handle, texels)?;
        Ok(Self { handle, width, height })
    }

    /// 1x1 opaque white, the fallback albedo.
    pub fn white<B: RenderBackend>(backend: &mut B) -> RenderResult<Self> {
        Self::from_rgba8(backend, "white", 1, 1, &[255, 255, 255, 255])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessBackend;

    #[test]
    fn rejects_short_texel_blob() {
        let mut backend = HeadlessBackend::new(8, 8);
        assert!(Texture::from_rgba8(&mut backend, "bad", 2, 2, &[0u8; 4]).is_err());
    }

    #[test]
    fn white_fallback_uploads() {
        let mut backend = HeadlessBackend::new(8, 8);
        let tex = Texture::white(&mut backend).unwrap();
        assert_eq!((tex.width, tex.height), (1, 1));
    }
}
