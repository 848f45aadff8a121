//! Shared backend types: formats, descriptors, limits.

use std::ops::BitOr;

/// Texture formats used by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Standard 8-bit RGBA (albedo, capture targets)
    Rgba8Unorm,
    /// sRGB variant for the presentation surface
    Bgra8UnormSrgb,
    /// 16-bit float RGBA (normals, positions, view directions)
    Rgba16Float,
    /// 24-bit depth
    Depth24Plus,
    /// 32-bit float depth
    Depth32Float,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth24Plus | TextureFormat::Depth32Float)
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm | TextureFormat::Bgra8UnormSrgb => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Depth24Plus | TextureFormat::Depth32Float => 4,
        }
    }
}

/// Texture usage flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureUsage(pub u32);

impl TextureUsage {
    pub const TEXTURE_BINDING: Self = Self(1 << 0);
    pub const RENDER_ATTACHMENT: Self = Self(1 << 1);
    pub const COPY_DST: Self = Self(1 << 2);

    pub fn contains(&self, other: TextureUsage) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl BitOr for TextureUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Buffer usage flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferUsage(pub u32);

impl BufferUsage {
    pub const VERTEX: Self = Self(1 << 0);
    pub const INDEX: Self = Self(1 << 1);
    pub const UNIFORM: Self = Self(1 << 2);
    pub const COPY_DST: Self = Self(1 << 3);

    pub fn contains(&self, other: BufferUsage) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl BitOr for BufferUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Sampler filtering for a texture's default sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    Nearest,
    Linear,
}

/// Sampler addressing for a texture's default sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
}

#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub filter: FilterMode,
    pub address: AddressMode,
}

#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
}

/// Index element width of a mesh's index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

impl IndexFormat {
    pub fn byte_size(&self) -> u64 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// One vertex attribute as laid out in a vertex buffer.
///
/// Components are always 32-bit floats; `byte_offset` is relative to the
/// start of a vertex. Invariant: `byte_offset + component_count * 4` must
/// not exceed the layout stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferAttribute {
    pub location: u32,
    pub component_count: u8,
    pub byte_offset: u32,
}

/// RGBA clear color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl ClearColor {
    pub const TRANSPARENT: Self = Self { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };

    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }
}

/// What to clear when a pass begins.
#[derive(Debug, Clone, Copy)]
pub struct ClearConfig {
    pub color: Option<ClearColor>,
    pub depth: Option<f32>,
}

impl ClearConfig {
    pub const fn color_and_depth(color: ClearColor) -> Self {
        Self { color: Some(color), depth: Some(1.0) }
    }
}

/// Device limits the renderer sizes itself against.
#[derive(Debug, Clone, Copy)]
pub struct DeviceLimits {
    /// Largest uniform block the device accepts; also the uniform arena's
    /// capacity.
    pub max_uniform_block_size: u64,
    /// Required alignment for uniform range offsets.
    pub uniform_offset_alignment: u64,
}

/// Static device/driver identification, captured at backend creation.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub backend_name: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_formats_are_depth() {
        assert!(TextureFormat::Depth24Plus.is_depth());
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(!TextureFormat::Rgba8Unorm.is_depth());
        assert!(!TextureFormat::Rgba16Float.is_depth());
    }

    #[test]
    fn usage_flags_combine() {
        let usage = TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING;
        assert!(usage.contains(TextureUsage::RENDER_ATTACHMENT));
        assert!(usage.contains(TextureUsage::TEXTURE_BINDING));
        assert!(!usage.contains(TextureUsage::COPY_DST));
    }
}
