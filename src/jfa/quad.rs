//! Full-screen quad geometry shared by every pass.

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use std::sync::Arc;
use vulkano::{
    buffer::{Buffer, BufferCreateInfo, BufferUsage, Subbuffer},
    memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
    pipeline::graphics::vertex_input::Vertex,
};

/// Vertex of the full-screen quad: clip-space position plus texture coordinate.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable, Vertex)]
pub struct QuadVertex {
    #[format(R32G32_SFLOAT)]
    pub position: [f32; 2],
    #[format(R32G32_SFLOAT)]
    pub tex_coord: [f32; 2],
}

/// Static 4-vertex / 2-triangle mesh covering the whole output surface.
pub struct FullscreenQuad {
    pub vertices: Subbuffer<[QuadVertex]>,
    pub indices: Subbuffer<[u32]>,
}

impl FullscreenQuad {
    pub fn new(memory_allocator: Arc<StandardMemoryAllocator>) -> Result<Self> {
        let corners = [
            QuadVertex {
                position: [-1.0, -1.0],
                tex_coord: [0.0, 0.0],
            },
            QuadVertex {
                position: [1.0, -1.0],
                tex_coord: [1.0, 0.0],
            },
            QuadVertex {
                position: [1.0, 1.0],
                tex_coord: [1.0, 1.0],
            },
            QuadVertex {
                position: [-1.0, 1.0],
                tex_coord: [0.0, 1.0],
            },
        ];

        let vertices = Buffer::from_iter(
            memory_allocator.clone(),
            BufferCreateInfo {
                usage: BufferUsage::VERTEX_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
                    | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
                ..Default::default()
            },
            corners,
        )
        .context("Failed to create quad vertex buffer")?;

        let indices = Buffer::from_iter(
            memory_allocator,
            BufferCreateInfo {
                usage: BufferUsage::INDEX_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
                    | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
                ..Default::default()
            },
            [0u32, 1, 2, 0, 2, 3],
        )
        .context("Failed to create quad index buffer")?;

        Ok(Self { vertices, indices })
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}
