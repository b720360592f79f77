//! GPU image readback: swapchain screenshots and state-texture capture.
//!
//! Both paths record a copy into a host-visible buffer; the buffer must not
//! be read until the submission's fence has signalled.

use anyhow::{Context, Result};
use std::sync::Arc;
use vulkano::{
    buffer::{Buffer, BufferCreateInfo, BufferUsage, Subbuffer},
    command_buffer::{AutoCommandBufferBuilder, CopyImageToBufferInfo, PrimaryAutoCommandBuffer},
    format::Format,
    image::Image,
    memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
};

fn readback_buffer(
    memory_allocator: Arc<StandardMemoryAllocator>,
    byte_len: usize,
) -> Result<Subbuffer<[u8]>> {
    Buffer::from_iter(
        memory_allocator,
        BufferCreateInfo {
            usage: BufferUsage::TRANSFER_DST,
            ..Default::default()
        },
        AllocationCreateInfo {
            memory_type_filter: MemoryTypeFilter::PREFER_HOST
                | MemoryTypeFilter::HOST_RANDOM_ACCESS,
            ..Default::default()
        },
        (0..byte_len).map(|_| 0u8),
    )
    .context("Failed to create readback buffer")
}

/// Record a copy of a presentation image into a host buffer.
pub fn capture_to_buffer(
    builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    memory_allocator: Arc<StandardMemoryAllocator>,
    image: Arc<Image>,
    format: Format,
) -> Result<CaptureBuffer> {
    let extent = image.extent();
    let (width, height) = (extent[0], extent[1]);
    let bytes_per_pixel = format.block_size() as u32;
    let buffer = readback_buffer(
        memory_allocator,
        (width * height * bytes_per_pixel) as usize,
    )?;

    builder
        .copy_image_to_buffer(CopyImageToBufferInfo::image_buffer(image, buffer.clone()))
        .context("Failed to record screenshot copy")?;

    Ok(CaptureBuffer {
        buffer,
        width,
        height,
        format,
    })
}

/// Captured presentation-surface pixels.
pub struct CaptureBuffer {
    buffer: Subbuffer<[u8]>,
    width: u32,
    height: u32,
    format: Format,
}

impl CaptureBuffer {
    /// Convert to an RGBA image (call after GPU work is complete).
    pub fn to_image(&self) -> Result<image::RgbaImage> {
        let buffer_content = self.buffer.read().context("Failed to read buffer")?;

        let rgba_data: Vec<u8> = match self.format {
            // 16-bit float surfaces (common on AMD). The shaders write
            // display-ready color, so clamp and quantize without transfer.
            Format::R16G16B16A16_SFLOAT => {
                use half::f16;
                buffer_content
                    .chunks(8)
                    .flat_map(|pixel| {
                        let r = f16::from_le_bytes([pixel[0], pixel[1]]).to_f32();
                        let g = f16::from_le_bytes([pixel[2], pixel[3]]).to_f32();
                        let b = f16::from_le_bytes([pixel[4], pixel[5]]).to_f32();
                        let a = f16::from_le_bytes([pixel[6], pixel[7]]).to_f32();
                        [
                            (r.clamp(0.0, 1.0) * 255.0) as u8,
                            (g.clamp(0.0, 1.0) * 255.0) as u8,
                            (b.clamp(0.0, 1.0) * 255.0) as u8,
                            (a.clamp(0.0, 1.0) * 255.0) as u8,
                        ]
                    })
                    .collect()
            }
            // BGRA 8-bit formats
            Format::B8G8R8A8_SRGB | Format::B8G8R8A8_UNORM => buffer_content
                .chunks(4)
                .flat_map(|bgra| [bgra[2], bgra[1], bgra[0], bgra[3]])
                .collect(),
            // RGBA 8-bit formats
            _ => buffer_content.to_vec(),
        };

        image::RgbaImage::from_raw(self.width, self.height, rgba_data)
            .context("Failed to create image from buffer")
    }
}

/// Record a copy of a `R32G32B32A32_SFLOAT` state texture into a host buffer.
pub fn capture_state_to_buffer(
    builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    memory_allocator: Arc<StandardMemoryAllocator>,
    image: Arc<Image>,
) -> Result<StateCapture> {
    let extent = image.extent();
    let (width, height) = (extent[0], extent[1]);
    let buffer = readback_buffer(memory_allocator, (width * height * 16) as usize)?;

    builder
        .copy_image_to_buffer(CopyImageToBufferInfo::image_buffer(image, buffer.clone()))
        .context("Failed to record state readback copy")?;

    Ok(StateCapture {
        buffer,
        width,
        height,
    })
}

/// Captured state texels: `(seed_x, seed_y, valid, _)` per pixel.
pub struct StateCapture {
    buffer: Subbuffer<[u8]>,
    width: u32,
    height: u32,
}

impl StateCapture {
    /// Decode into a CPU-side field (call after GPU work is complete).
    pub fn to_field(&self) -> Result<StateField> {
        let content = self.buffer.read().context("Failed to read state buffer")?;
        let texels = content
            .chunks_exact(16)
            .map(|texel| {
                let f = |i: usize| {
                    f32::from_le_bytes([texel[i], texel[i + 1], texel[i + 2], texel[i + 3]])
                };
                [f(0), f(4), f(8), f(12)]
            })
            .collect();

        Ok(StateField {
            width: self.width,
            height: self.height,
            texels,
        })
    }
}

/// A decoded distance field, one `[seed_x, seed_y, valid, _]` per texel.
pub struct StateField {
    pub width: u32,
    pub height: u32,
    texels: Vec<[f32; 4]>,
}

impl StateField {
    pub fn is_valid(&self, x: u32, y: u32) -> bool {
        self.texels[(y * self.width + x) as usize][2] >= 0.5
    }

    /// Euclidean distance from `(x, y)` to its recorded nearest seed, or
    /// `None` for texels no seed reaches.
    pub fn distance_at(&self, x: u32, y: u32) -> Option<f32> {
        let texel = self.texels[(y * self.width + x) as usize];
        if texel[2] < 0.5 {
            return None;
        }
        Some(((x as f32 - texel[0]).powi(2) + (y as f32 - texel[1]).powi(2)).sqrt())
    }

    /// Export the field as an 8-bit greyscale image, distances normalized
    /// to the observed maximum; unreached texels render black.
    pub fn to_distance_image(&self) -> image::GrayImage {
        let mut max_dist = 0.0f32;
        for y in 0..self.height {
            for x in 0..self.width {
                if let Some(d) = self.distance_at(x, y) {
                    max_dist = max_dist.max(d);
                }
            }
        }

        image::GrayImage::from_fn(self.width, self.height, |x, y| {
            if !self.is_valid(x, y) || max_dist == 0.0 {
                return image::Luma([0]);
            }
            let d = self.distance_at(x, y).unwrap_or(0.0);
            image::Luma([((d / max_dist) * 255.0) as u8])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_from(texels: Vec<[f32; 4]>, width: u32, height: u32) -> StateField {
        StateField {
            width,
            height,
            texels,
        }
    }

    #[test]
    fn test_distance_decoding() {
        // 2x1: texel (0,0) claims seed (1,0); texel (1,0) is unreached.
        let field = field_from(vec![[1.0, 0.0, 1.0, 0.0], [0.0, 0.0, 0.0, 0.0]], 2, 1);
        assert!((field.distance_at(0, 0).unwrap() - 1.0).abs() < 1e-6);
        assert!(field.distance_at(1, 0).is_none());
        assert!(!field.is_valid(1, 0));
    }

    #[test]
    fn test_distance_image_normalization() {
        let field = field_from(
            vec![
                [0.0, 0.0, 1.0, 0.0], // self-seed, distance 0
                [0.0, 0.0, 1.0, 0.0], // distance 1 -> the maximum
            ],
            2,
            1,
        );
        let img = field.to_distance_image();
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
        assert_eq!(img.get_pixel(1, 0).0[0], 255);
    }
}
