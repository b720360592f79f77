//! GPU-resident textures: the read-only seed texture, the two ping-pong
//! state textures and the shared depth attachment.
//!
//! Each state texel packs the best-known nearest seed as
//! `r = seed_x, g = seed_y, b = valid` in `R32G32B32A32_SFLOAT`; the
//! all-zero texel is the "no seed known" sentinel.

use anyhow::{Context, Result};
use std::sync::Arc;
use vulkano::{
    buffer::{Buffer, BufferCreateInfo, BufferUsage},
    command_buffer::{
        AutoCommandBufferBuilder, ClearColorImageInfo, CopyBufferToImageInfo,
        PrimaryAutoCommandBuffer,
    },
    device::Device,
    format::Format,
    image::{view::ImageView, Image, ImageCreateInfo, ImageType, ImageUsage},
    memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
    render_pass::{Framebuffer, FramebufferCreateInfo, RenderPass},
};

use crate::error::PipelineError;
use crate::jfa::seeds::SeedImage;

/// Channel layout of the state texels.
pub const STATE_FORMAT: Format = Format::R32G32B32A32_SFLOAT;
/// Depth attachment shared by both state framebuffers.
pub const DEPTH_FORMAT: Format = Format::D16_UNORM;
/// Single-channel seed texture.
pub const SEED_FORMAT: Format = Format::R8_UNORM;

/// One ping-pong state texture together with its framebuffer.
pub struct StateTarget {
    pub image: Arc<Image>,
    pub view: Arc<ImageView>,
    pub framebuffer: Arc<Framebuffer>,
}

/// Owns the seed texture, the state texture pair and the depth attachment.
///
/// The pair is reallocated whenever the seed image dimensions change;
/// the previous pair is dropped with it.
pub struct TextureStore {
    memory_allocator: Arc<StandardMemoryAllocator>,
    render_pass: Arc<RenderPass>,
    seed_view: Arc<ImageView>,
    state: [StateTarget; 2],
    width: u32,
    height: u32,
}

/// Render pass the state framebuffers are built against: one float color
/// attachment plus the depth buffer, cleared to the invalid sentinel.
pub fn create_state_render_pass(device: Arc<Device>) -> Result<Arc<RenderPass>> {
    vulkano::single_pass_renderpass!(
        device,
        attachments: {
            color: {
                format: STATE_FORMAT,
                samples: 1,
                load_op: Clear,
                store_op: Store,
            },
            depth: {
                format: DEPTH_FORMAT,
                samples: 1,
                load_op: Clear,
                store_op: DontCare,
            },
        },
        pass: {
            color: [color],
            depth_stencil: {depth},
        },
    )
    .context("Failed to create state render pass")
}

impl TextureStore {
    pub fn new(
        memory_allocator: Arc<StandardMemoryAllocator>,
        render_pass: Arc<RenderPass>,
        seed: &SeedImage,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    ) -> Result<Self> {
        let (width, height) = (seed.width(), seed.height());
        let seed_view = upload_seed_texture(&memory_allocator, seed, builder)?;
        let state = allocate_state_pair(&memory_allocator, &render_pass, width, height, builder)?;

        Ok(Self {
            memory_allocator,
            render_pass,
            seed_view,
            state,
            width,
            height,
        })
    }

    /// Replace the seed texture, reallocating the state pair first if the
    /// dimensions changed. Only legal between frames.
    pub fn load_seed(
        &mut self,
        seed: &SeedImage,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    ) -> Result<()> {
        if seed.width() != self.width || seed.height() != self.height {
            self.state = allocate_state_pair(
                &self.memory_allocator,
                &self.render_pass,
                seed.width(),
                seed.height(),
                builder,
            )?;
            self.width = seed.width();
            self.height = seed.height();
        }
        self.upload_seed(seed, builder)
    }

    /// Upload a seed image without reallocation. Fails with `SizeMismatch`
    /// if its dimensions differ from the allocated state textures.
    pub fn upload_seed(
        &mut self,
        seed: &SeedImage,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    ) -> Result<()> {
        if seed.width() != self.width || seed.height() != self.height {
            return Err(PipelineError::SizeMismatch {
                expected_w: self.width,
                expected_h: self.height,
                actual_w: seed.width(),
                actual_h: seed.height(),
            }
            .into());
        }
        self.seed_view = upload_seed_texture(&self.memory_allocator, seed, builder)?;
        Ok(())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn seed_view(&self) -> Arc<ImageView> {
        self.seed_view.clone()
    }

    pub fn state_target(&self, index: usize) -> &StateTarget {
        &self.state[index & 1]
    }

    /// Verify the ping-pong discipline's structural precondition: both state
    /// textures exist at the seed image's dimensions.
    pub fn check_consistent(&self) -> Result<(), PipelineError> {
        for target in &self.state {
            let extent = target.image.extent();
            if extent[0] != self.width || extent[1] != self.height {
                return Err(PipelineError::InvariantViolation(format!(
                    "state texture is {}x{} but the store expects {}x{}",
                    extent[0], extent[1], self.width, self.height
                )));
            }
        }
        Ok(())
    }
}

fn upload_seed_texture(
    memory_allocator: &Arc<StandardMemoryAllocator>,
    seed: &SeedImage,
    builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
) -> Result<Arc<ImageView>> {
    let staging = Buffer::from_iter(
        memory_allocator.clone(),
        BufferCreateInfo {
            usage: BufferUsage::TRANSFER_SRC,
            ..Default::default()
        },
        AllocationCreateInfo {
            memory_type_filter: MemoryTypeFilter::PREFER_HOST
                | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
            ..Default::default()
        },
        seed.data().iter().copied(),
    )
    .context("Failed to create seed staging buffer")?;

    let image = Image::new(
        memory_allocator.clone(),
        ImageCreateInfo {
            image_type: ImageType::Dim2d,
            format: SEED_FORMAT,
            extent: [seed.width(), seed.height(), 1],
            usage: ImageUsage::TRANSFER_DST | ImageUsage::SAMPLED,
            ..Default::default()
        },
        AllocationCreateInfo::default(),
    )
    .context("Failed to create seed texture")?;

    builder
        .copy_buffer_to_image(CopyBufferToImageInfo::buffer_image(staging, image.clone()))
        .context("Failed to record seed upload")?;

    ImageView::new_default(image).context("Failed to create seed image view")
}

fn allocate_state_pair(
    memory_allocator: &Arc<StandardMemoryAllocator>,
    render_pass: &Arc<RenderPass>,
    width: u32,
    height: u32,
    builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
) -> Result<[StateTarget; 2]> {
    let depth_image = Image::new(
        memory_allocator.clone(),
        ImageCreateInfo {
            image_type: ImageType::Dim2d,
            format: DEPTH_FORMAT,
            extent: [width, height, 1],
            usage: ImageUsage::DEPTH_STENCIL_ATTACHMENT,
            ..Default::default()
        },
        AllocationCreateInfo {
            memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
            ..Default::default()
        },
    )
    .context("Failed to create depth attachment")?;
    let depth_view =
        ImageView::new_default(depth_image).context("Failed to create depth view")?;

    let make_target = |builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>| {
        let image = Image::new(
            memory_allocator.clone(),
            ImageCreateInfo {
                image_type: ImageType::Dim2d,
                format: STATE_FORMAT,
                extent: [width, height, 1],
                usage: ImageUsage::COLOR_ATTACHMENT
                    | ImageUsage::SAMPLED
                    | ImageUsage::TRANSFER_SRC
                    | ImageUsage::TRANSFER_DST,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
                ..Default::default()
            },
        )
        .context("Failed to create state texture")?;

        // Contract: a fresh pair starts as the invalid sentinel everywhere.
        builder
            .clear_color_image(ClearColorImageInfo {
                clear_value: [0.0f32; 4].into(),
                ..ClearColorImageInfo::image(image.clone())
            })
            .context("Failed to clear state texture")?;

        let view = ImageView::new_default(image.clone())
            .context("Failed to create state image view")?;
        let framebuffer = Framebuffer::new(
            render_pass.clone(),
            FramebufferCreateInfo {
                attachments: vec![view.clone(), depth_view.clone()],
                ..Default::default()
            },
        )
        .context("Failed to create state framebuffer")?;

        Ok::<_, anyhow::Error>(StateTarget {
            image,
            view,
            framebuffer,
        })
    };

    let a = make_target(builder)?;
    let b = make_target(builder)?;
    Ok([a, b])
}
