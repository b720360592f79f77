//! Scoped render-target binding.
//!
//! Binding and unbinding a framebuffer is the only synchronization the
//! pipeline uses: ending the render pass before any later pass samples the
//! attachment imposes the writes-before-reads ordering on the single queue.
//! `with_target` guarantees the pass is closed on every exit path so a
//! failed pass never leaks an active attachment into the next one.

use anyhow::{Context, Result};
use std::sync::Arc;
use vulkano::{
    command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer, RenderPassBeginInfo},
    device::physical::PhysicalDevice,
    format::{ClearValue, Format, FormatFeatures},
    pipeline::graphics::viewport::Viewport,
    render_pass::Framebuffer,
};

use crate::error::PipelineError;

/// Begin a render pass targeting `framebuffer`, run `record` with a viewport
/// sized to the attachment, and end the pass regardless of the outcome.
pub fn with_target<F>(
    builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    framebuffer: Arc<Framebuffer>,
    clear_values: Vec<Option<ClearValue>>,
    record: F,
) -> Result<()>
where
    F: FnOnce(&mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>, Viewport) -> Result<()>,
{
    let extent = framebuffer.extent();
    let viewport = Viewport {
        offset: [0.0, 0.0],
        extent: [extent[0] as f32, extent[1] as f32],
        depth_range: 0.0..=1.0,
    };

    builder
        .begin_render_pass(
            RenderPassBeginInfo {
                clear_values,
                ..RenderPassBeginInfo::framebuffer(framebuffer)
            },
            Default::default(),
        )
        .context("Failed to begin render pass")?;

    let recorded = record(builder, viewport);

    // Close the pass even when recording failed, so the attachment is
    // detached before anything else touches it.
    builder
        .end_render_pass(Default::default())
        .context("Failed to end render pass")?;

    recorded
}

/// Check that the device can render to the given color + depth format pair.
pub fn ensure_renderable(
    physical_device: &Arc<PhysicalDevice>,
    color: Format,
    depth: Format,
) -> Result<(), PipelineError> {
    let color_props = physical_device
        .format_properties(color)
        .map_err(|e| PipelineError::Initialization(format!("format query failed: {e}")))?;
    if !color_props
        .optimal_tiling_features
        .contains(FormatFeatures::COLOR_ATTACHMENT)
    {
        return Err(PipelineError::UnsupportedFormat(color));
    }

    let depth_props = physical_device
        .format_properties(depth)
        .map_err(|e| PipelineError::Initialization(format!("format query failed: {e}")))?;
    if !depth_props
        .optimal_tiling_features
        .contains(FormatFeatures::DEPTH_STENCIL_ATTACHMENT)
    {
        return Err(PipelineError::UnsupportedFormat(depth));
    }

    Ok(())
}
