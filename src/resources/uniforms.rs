//! Per-frame uniform bump arena.
//!
//! One persistent GPU buffer sized to the device's maximum uniform block
//! size. Each pass rewinds the head, writes the global block and the
//! per-entity blocks into CPU staging, and flushes the written prefix in a
//! single upload. Ranges handed out are valid until the next [`begin`].
//!
//! [`begin`]: UniformArena::begin

use glam::{Mat4, Vec3};

use crate::backend::traits::{BufferHandle, RenderBackend};
use crate::backend::types::{BufferDescriptor, BufferUsage};
use crate::error::{RenderError, RenderResult};
use crate::scene::light::Light;

/// std140 alignment for vec3/vec4 members and light records.
const STD140_ALIGN: u64 = 16;

pub const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// A slice of the arena, as bound with glBindBufferRange semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformRange {
    pub offset: u64,
    pub size: u64,
}

pub struct UniformArena {
    buffer: BufferHandle,
    staging: Vec<u8>,
    capacity: u64,
    /// Device uniform-offset alignment; every bound block starts on it.
    block_alignment: u64,
    head: u64,
    mapped: bool,
}

impl UniformArena {
    pub fn new<B: RenderBackend>(backend: &mut B) -> RenderResult<Self> {
        let limits = backend.limits();
        let capacity = limits.max_uniform_block_size;
        let buffer = backend.create_buffer(&BufferDescriptor {
            label: Some("uniform arena".into()),
            size: capacity,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;
        log::debug!(
            "uniform arena: {} bytes, block alignment {}",
            capacity,
            limits.uniform_offset_alignment
        );
        Ok(Self {
            buffer,
            staging: vec![0; capacity as usize],
            capacity,
            block_alignment: limits.uniform_offset_alignment,
            head: 0,
            mapped: false,
        })
    }

    pub fn buffer(&self) -> BufferHandle {
        self.buffer
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn head(&self) -> u64 {
        self.head
    }

    /// Rewind the head and open the write bracket. No range handed out
    /// before this call may be consumed by a draw afterwards.
    pub fn begin(&mut self) {
        self.head = 0;
        self.mapped = true;
    }

    /// Close the bracket and flush everything written since [`Self::begin`].
    pub fn finish<B: RenderBackend>(&mut self, backend: &mut B) -> RenderResult<()> {
        debug_assert!(self.mapped, "finish without begin");
        self.mapped = false;
        if self.head > 0 {
            backend.write_buffer(self.buffer, 0, &self.staging[..self.head as usize])?;
        }
        Ok(())
    }

    fn reserve(&mut self, bytes: u64) -> RenderResult<u64> {
        debug_assert!(self.mapped, "write outside begin/finish bracket");
        let offset = self.head;
        let required = offset + bytes;
        if required > self.capacity {
            return Err(RenderError::UniformOverflow {
                required,
                capacity: self.capacity,
            });
        }
        self.head = required;
        Ok(offset)
    }

    pub fn align_to(&mut self, alignment: u64) {
        self.head = align_up(self.head, alignment);
    }

    pub fn push_bytes(&mut self, data: &[u8]) -> RenderResult<u64> {
        let offset = self.reserve(data.len() as u64)?;
        self.staging[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        Ok(offset)
    }

    /// vec3 per std140: aligned to 16, occupies 12 bytes.
    pub fn push_vec3(&mut self, v: Vec3) -> RenderResult<u64> {
        self.align_to(STD140_ALIGN);
        self.push_bytes(bytemuck::bytes_of(&v.to_array()))
    }

    pub fn push_u32(&mut self, v: u32) -> RenderResult<u64> {
        self.align_to(4);
        self.push_bytes(bytemuck::bytes_of(&v))
    }

    pub fn push_mat4(&mut self, m: Mat4) -> RenderResult<u64> {
        self.push_bytes(bytemuck::bytes_of(&m.to_cols_array()))
    }

    /// Global parameter block: camera position, light count, then one
    /// 64-byte std140 record per light.
    pub fn push_global_block(
        &mut self,
        camera_position: Vec3,
        lights: &[Light],
    ) -> RenderResult<UniformRange> {
        self.align_to(self.block_alignment);
        let offset = self.head;
        self.push_vec3(camera_position)?;
        self.push_u32(lights.len() as u32)?;
        for light in lights {
            self.align_to(STD140_ALIGN);
            self.push_u32(light.kind as u32)?;
            self.push_vec3(light.color)?;
            self.push_vec3(light.direction)?;
            self.push_vec3(light.position)?;
            self.align_to(STD140_ALIGN);
        }
        Ok(UniformRange { offset, size: self.head - offset })
    }

    /// Per-entity block: world matrix plus world-view-projection matrix.
    pub fn push_entity_block(&mut self, world: Mat4, wvp: Mat4) -> RenderResult<UniformRange> {
        self.align_to(self.block_alignment);
        let offset = self.head;
        self.push_mat4(world)?;
        self.push_mat4(wvp)?;
        Ok(UniformRange { offset, size: self.head - offset })
    }

    /// Water block: view, projection and water-plane model matrices.
    pub fn push_water_block(
        &mut self,
        view: Mat4,
        projection: Mat4,
        model: Mat4,
    ) -> RenderResult<UniformRange> {
        self.align_to(self.block_alignment);
        let offset = self.head;
        self.push_mat4(view)?;
        self.push_mat4(projection)?;
        self.push_mat4(model)?;
        Ok(UniformRange { offset, size: self.head - offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessBackend;
    use crate::scene::light::Light;

    fn arena() -> (HeadlessBackend, UniformArena) {
        let mut backend = HeadlessBackend::new(64, 64);
        let arena = UniformArena::new(&mut backend).unwrap();
        (backend, arena)
    }

    #[test]
    fn align_up_rounds_to_boundary() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(17, 256), 256);
        assert_eq!(align_up(256, 256), 256);
    }

    #[test]
    fn blocks_are_disjoint_and_aligned() {
        let (_, mut arena) = arena();
        arena.begin();
        let a = arena
            .push_entity_block(Mat4::IDENTITY, Mat4::IDENTITY)
            .unwrap();
        let b = arena
            .push_entity_block(Mat4::IDENTITY, Mat4::IDENTITY)
            .unwrap();
        assert_eq!(a.size, 128);
        assert_eq!(b.size, 128);
        assert_eq!(a.offset % 256, 0);
        assert_eq!(b.offset % 256, 0);
        assert!(b.offset >= a.offset + a.size);
    }

    #[test]
    fn global_block_is_byte_exact() {
        let (_, mut arena) = arena();
        let lights = [
            Light::directional(Vec3::ONE, Vec3::NEG_Y),
            Light::point(Vec3::ONE, Vec3::ZERO),
        ];
        arena.begin();
        let range = arena.push_global_block(Vec3::ZERO, &lights).unwrap();
        // vec3 (12) + uint (4) + two 64-byte light records
        assert_eq!(range.size, 12 + 4 + 2 * 64);
    }

    #[test]
    fn global_block_without_lights() {
        let (_, mut arena) = arena();
        arena.begin();
        let range = arena.push_global_block(Vec3::ZERO, &[]).unwrap();
        assert_eq!(range.size, 16);
    }

    #[test]
    fn rewind_reuses_space() {
        let (_, mut arena) = arena();
        arena.begin();
        let first = arena
            .push_entity_block(Mat4::IDENTITY, Mat4::IDENTITY)
            .unwrap();
        arena.begin();
        let second = arena
            .push_entity_block(Mat4::IDENTITY, Mat4::IDENTITY)
            .unwrap();
        assert_eq!(first.offset, second.offset);
    }

    #[test]
    fn overflow_is_fatal() {
        let (_, mut arena) = arena();
        arena.begin();
        let mut result = Ok(UniformRange { offset: 0, size: 0 });
        for _ in 0..1024 {
            result = arena.push_entity_block(Mat4::IDENTITY, Mat4::IDENTITY);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(
            result,
            Err(RenderError::UniformOverflow { .. })
        ));
    }

    #[test]
    fn finish_flushes_written_prefix() {
        let (mut backend, mut arena) = arena();
        arena.begin();
        arena
            .push_entity_block(Mat4::IDENTITY, Mat4::IDENTITY)
            .unwrap();
        arena.finish(&mut backend).unwrap();
        use crate::backend::headless::GpuCommand;
        assert!(backend.commands().iter().any(|c| matches!(
            c,
            GpuCommand::WriteBuffer { len: 128, offset: 0, .. }
        )));
    }
}
