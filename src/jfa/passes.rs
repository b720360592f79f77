//! The three shader stages of the pipeline: Seed, Flood and Display.
//!
//! All three share the full-screen quad vertex stage and take their
//! per-pass inputs as typed push constants generated by `vulkano_shaders`,
//! so a mismatched uniform is a compile error rather than a draw-time one.

use anyhow::{Context, Result};
use std::sync::Arc;
use vulkano::{
    descriptor_set::{
        allocator::StandardDescriptorSetAllocator, DescriptorSet, WriteDescriptorSet,
    },
    device::Device,
    image::{
        sampler::{Filter, Sampler, SamplerAddressMode, SamplerCreateInfo},
        view::ImageView,
    },
    pipeline::{
        graphics::{
            color_blend::{ColorBlendAttachmentState, ColorBlendState},
            depth_stencil::{DepthState, DepthStencilState},
            input_assembly::InputAssemblyState,
            multisample::MultisampleState,
            rasterization::RasterizationState,
            vertex_input::{Vertex, VertexDefinition},
            viewport::{Viewport, ViewportState},
            GraphicsPipelineCreateInfo,
        },
        layout::PipelineDescriptorSetLayoutCreateInfo,
        DynamicState, GraphicsPipeline, Pipeline, PipelineShaderStageCreateInfo,
    },
    render_pass::{RenderPass, Subpass},
    shader::EntryPoint,
};

use crate::error::PipelineError;
use crate::jfa::quad::QuadVertex;

mod vs {
    vulkano_shaders::shader! {
        ty: "vertex",
        src: r"
            #version 450

            layout(location = 0) in vec2 position;
            layout(location = 1) in vec2 tex_coord;

            layout(location = 0) out vec2 v_tex_coord;

            void main() {
                gl_Position = vec4(position, 0.0, 1.0);
                v_tex_coord = tex_coord;
            }
        ",
    }
}

mod seed_fs {
    vulkano_shaders::shader! {
        ty: "fragment",
        src: r"
            #version 450

            layout(location = 0) in vec2 v_tex_coord;
            layout(location = 0) out vec4 f_state;

            layout(set = 0, binding = 0) uniform sampler2D seed_tex;

            // Foreground texels become their own nearest seed; everything
            // else starts as the all-zero invalid sentinel.
            void main() {
                float sample_value = texture(seed_tex, v_tex_coord).r;
                if (sample_value >= 0.5) {
                    f_state = vec4(floor(gl_FragCoord.xy), 1.0, 0.0);
                } else {
                    f_state = vec4(0.0);
                }
            }
        ",
    }
}

mod flood_fs {
    vulkano_shaders::shader! {
        ty: "fragment",
        src: r"
            #version 450

            layout(location = 0) in vec2 v_tex_coord;
            layout(location = 0) out vec4 f_state;

            layout(set = 0, binding = 0) uniform sampler2D state_tex;

            layout(push_constant) uniform FloodParams {
                int step;
                float texw;
                float texh;
            } pc;

            // Examine the 9 offsets {-step,0,+step}^2 (row-major, dy outer)
            // and keep the valid candidate whose stored seed is closest to
            // this texel. Out-of-bounds probes are absent, never clamped or
            // wrapped, so the field stays correct near the borders.
            void main() {
                vec2 self_pixel = floor(gl_FragCoord.xy);
                vec2 dims = vec2(pc.texw, pc.texh);
                vec4 best = vec4(0.0);
                float best_dist = 0.0;
                for (int dy = -1; dy <= 1; dy++) {
                    for (int dx = -1; dx <= 1; dx++) {
                        vec2 probe = self_pixel + vec2(dx, dy) * float(pc.step);
                        if (probe.x < 0.0 || probe.y < 0.0 ||
                            probe.x >= dims.x || probe.y >= dims.y) {
                            continue;
                        }
                        vec4 cand = texture(state_tex, (probe + 0.5) / dims);
                        if (cand.b < 0.5) {
                            continue;
                        }
                        float d = distance(self_pixel, cand.rg);
                        if (best.b < 0.5 || d < best_dist) {
                            best = cand;
                            best_dist = d;
                        }
                    }
                }
                f_state = best;
            }
        ",
    }
}

mod display_fs {
    vulkano_shaders::shader! {
        ty: "fragment",
        src: r"
            #version 450

            layout(location = 0) in vec2 v_tex_coord;
            layout(location = 0) out vec4 f_color;

            layout(set = 0, binding = 0) uniform sampler2D source_tex;

            layout(push_constant) uniform DisplayParams {
                int use_algorithm;
                float texw;
                float texh;
            } pc;

            void main() {
                if (pc.use_algorithm == 0) {
                    // Raw mode: the bound texture is the seed image itself.
                    float g = texture(source_tex, v_tex_coord).r;
                    f_color = vec4(vec3(g), 1.0);
                    return;
                }

                vec4 state = texture(source_tex, v_tex_coord);
                if (state.b < 0.5) {
                    // No seed reachable from this texel.
                    f_color = vec4(0.08, 0.0, 0.12, 1.0);
                    return;
                }

                vec2 dims = vec2(pc.texw, pc.texh);
                vec2 self_pixel = floor(v_tex_coord * dims);
                float d = distance(self_pixel, state.rg);

                // Distance colormap: warm near the seeds, cold far away,
                // with repeating bands to make the gradient readable.
                float norm = clamp(d / length(dims), 0.0, 1.0);
                float band = 0.7 + 0.3 * fract(d / 32.0);
                vec3 near_color = vec3(1.0, 0.85, 0.25);
                vec3 far_color = vec3(0.1, 0.2, 0.55);
                f_color = vec4(mix(near_color, far_color, sqrt(norm)) * band, 1.0);
            }
        ",
    }
}

pub use display_fs::DisplayParams;
pub use flood_fs::FloodParams;

/// The three graphics pipelines plus the shared nearest-neighbour sampler.
pub struct PassPrograms {
    pub seed: Arc<GraphicsPipeline>,
    pub flood: Arc<GraphicsPipeline>,
    pub display: Arc<GraphicsPipeline>,
    sampler: Arc<Sampler>,
    descriptor_set_allocator: Arc<StandardDescriptorSetAllocator>,
}

impl PassPrograms {
    /// Build all three pipelines. Any failure here is fatal: there is no
    /// meaningful recovery from a shader that does not compile.
    pub fn new(
        device: Arc<Device>,
        state_render_pass: Arc<RenderPass>,
        present_render_pass: Arc<RenderPass>,
    ) -> Result<Self, PipelineError> {
        let vs_entry = load_entry_point(vs::load(device.clone()), "vertex")?;
        let seed_entry = load_entry_point(seed_fs::load(device.clone()), "seed fragment")?;
        let flood_entry = load_entry_point(flood_fs::load(device.clone()), "flood fragment")?;
        let display_entry =
            load_entry_point(display_fs::load(device.clone()), "display fragment")?;

        let state_subpass = Subpass::from(state_render_pass, 0).ok_or_else(|| {
            PipelineError::Initialization("state render pass has no subpass 0".into())
        })?;
        let present_subpass = Subpass::from(present_render_pass, 0).ok_or_else(|| {
            PipelineError::Initialization("present render pass has no subpass 0".into())
        })?;

        let seed = build_pipeline(
            &device,
            vs_entry.clone(),
            seed_entry,
            state_subpass.clone(),
            true,
        )?;
        let flood = build_pipeline(&device, vs_entry.clone(), flood_entry, state_subpass, true)?;
        let display = build_pipeline(&device, vs_entry, display_entry, present_subpass, false)?;

        let sampler = Sampler::new(
            device.clone(),
            SamplerCreateInfo {
                mag_filter: Filter::Nearest,
                min_filter: Filter::Nearest,
                address_mode: [SamplerAddressMode::ClampToEdge; 3],
                ..Default::default()
            },
        )
        .map_err(|e| PipelineError::Initialization(format!("sampler: {e}")))?;

        let descriptor_set_allocator = Arc::new(StandardDescriptorSetAllocator::new(
            device,
            Default::default(),
        ));

        Ok(Self {
            seed,
            flood,
            display,
            sampler,
            descriptor_set_allocator,
        })
    }

    /// Descriptor set binding `view` through the shared nearest sampler at
    /// set 0, binding 0 of the given pipeline.
    pub fn sampled_texture_set(
        &self,
        pipeline: &Arc<GraphicsPipeline>,
        view: Arc<ImageView>,
    ) -> Result<Arc<DescriptorSet>> {
        DescriptorSet::new(
            self.descriptor_set_allocator.clone(),
            pipeline.layout().set_layouts()[0].clone(),
            [WriteDescriptorSet::image_view_sampler(
                0,
                view,
                self.sampler.clone(),
            )],
            [],
        )
        .context("Failed to create texture descriptor set")
    }
}

fn load_entry_point(
    module: std::result::Result<
        Arc<vulkano::shader::ShaderModule>,
        vulkano::Validated<vulkano::VulkanError>,
    >,
    what: &str,
) -> Result<EntryPoint, PipelineError> {
    let module =
        module.map_err(|e| PipelineError::Initialization(format!("{what} shader: {e}")))?;
    module
        .entry_point("main")
        .ok_or_else(|| PipelineError::Initialization(format!("{what} shader has no main")))
}

fn build_pipeline(
    device: &Arc<Device>,
    vs_entry: EntryPoint,
    fs_entry: EntryPoint,
    subpass: Subpass,
    with_depth: bool,
) -> Result<Arc<GraphicsPipeline>, PipelineError> {
    let vertex_input_state = QuadVertex::per_vertex()
        .definition(&vs_entry)
        .map_err(|e| PipelineError::Initialization(format!("vertex input: {e}")))?;

    let stages = [
        PipelineShaderStageCreateInfo::new(vs_entry),
        PipelineShaderStageCreateInfo::new(fs_entry),
    ];

    let layout = vulkano::pipeline::PipelineLayout::new(
        device.clone(),
        PipelineDescriptorSetLayoutCreateInfo::from_stages(&stages)
            .into_pipeline_layout_create_info(device.clone())
            .map_err(|e| PipelineError::Initialization(format!("pipeline layout: {e}")))?,
    )
    .map_err(|e| PipelineError::Initialization(format!("pipeline layout: {e}")))?;

    let depth_stencil_state = with_depth.then(|| DepthStencilState {
        depth: Some(DepthState::simple()),
        ..Default::default()
    });

    GraphicsPipeline::new(
        device.clone(),
        None,
        GraphicsPipelineCreateInfo {
            stages: stages.into_iter().collect(),
            vertex_input_state: Some(vertex_input_state),
            input_assembly_state: Some(InputAssemblyState::default()),
            viewport_state: Some(ViewportState {
                viewports: [Viewport::default()].into_iter().collect(),
                ..Default::default()
            }),
            rasterization_state: Some(RasterizationState::default()),
            multisample_state: Some(MultisampleState::default()),
            color_blend_state: Some(ColorBlendState::with_attachment_states(
                subpass.num_color_attachments(),
                ColorBlendAttachmentState::default(),
            )),
            depth_stencil_state,
            dynamic_state: [DynamicState::Viewport].into_iter().collect(),
            subpass: Some(subpass.into()),
            ..GraphicsPipelineCreateInfo::layout(layout)
        },
    )
    .map_err(|e| PipelineError::Initialization(format!("graphics pipeline: {e}")))
}
