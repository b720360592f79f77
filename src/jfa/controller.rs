//! Drives the pass sequence: one Seed pass, a descending series of Flood
//! passes ping-ponging between the two state textures, then a Display pass
//! into the presentation surface.
//!
//! The controller is the sole owner of the state texture pair. The parity
//! of the pass count decides which texture holds the converged field; that
//! index is the only state carried across frames. A seed image selected
//! mid-flight is parked in `pending_seed` and applied at the top of the
//! next frame, so partial results are never displayed and reallocation
//! only ever happens between frames.

use anyhow::{Context, Result};
use std::sync::Arc;
use vulkano::{
    command_buffer::{AutoCommandBufferBuilder, PrimaryAutoCommandBuffer},
    image::Image,
    pipeline::{graphics::viewport::Viewport, Pipeline, PipelineBindPoint},
    render_pass::{Framebuffer, RenderPass},
};

use crate::error::PipelineError;
use crate::jfa::passes::{DisplayParams, FloodParams, PassPrograms};
use crate::jfa::quad::FullscreenQuad;
use crate::jfa::schedule::{pass_count, StepSchedule};
use crate::jfa::seeds::SeedImage;
use crate::jfa::store::{create_state_render_pass, TextureStore, DEPTH_FORMAT, STATE_FORMAT};
use crate::renderer::{ensure_renderable, with_target, VulkanContext};

/// Which buffer the seed pass writes into; floods alternate from there.
const SEED_TARGET: usize = 0;

/// Index of the buffer holding the converged field after `passes` floods.
pub fn final_buffer_index(passes: u32) -> usize {
    (passes % 2) as usize
}

pub struct JfaController {
    store: TextureStore,
    programs: PassPrograms,
    quad: FullscreenQuad,
    last_written: usize,
    /// Display-pass mode: algorithmic distance field vs raw seed texture.
    pub use_algorithm: bool,
    pending_seed: Option<SeedImage>,
}

impl JfaController {
    pub fn new(
        ctx: &VulkanContext,
        present_render_pass: Arc<RenderPass>,
        seed: &SeedImage,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    ) -> Result<Self> {
        ensure_renderable(ctx.device.physical_device(), STATE_FORMAT, DEPTH_FORMAT)
            .context("State texture format check failed")?;

        let state_render_pass = create_state_render_pass(ctx.device.clone())?;
        let store = TextureStore::new(
            ctx.memory_allocator.clone(),
            state_render_pass.clone(),
            seed,
            builder,
        )?;
        let programs =
            PassPrograms::new(ctx.device.clone(), state_render_pass, present_render_pass)
                .context("Failed to build pass programs")?;
        let quad = FullscreenQuad::new(ctx.memory_allocator.clone())?;

        Ok(Self {
            store,
            programs,
            quad,
            last_written: SEED_TARGET,
            use_algorithm: true,
            pending_seed: None,
        })
    }

    /// Queue a new seed image. Applied at the start of the next frame; any
    /// in-progress flood result for the old image is discarded unseen.
    pub fn request_seed(&mut self, seed: SeedImage) {
        self.pending_seed = Some(seed);
    }

    /// The state texture holding the converged field of the last frame.
    pub fn last_state_image(&self) -> Arc<Image> {
        self.store.state_target(self.last_written).image.clone()
    }

    /// Record one full frame: apply any pending seed swap, then
    /// Seed -> Flood* -> Display into `present_framebuffer`.
    pub fn encode_frame(
        &mut self,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
        present_framebuffer: Arc<Framebuffer>,
    ) -> Result<()> {
        if let Some(seed) = self.pending_seed.take() {
            self.store.load_seed(&seed, builder)?;
            self.last_written = SEED_TARGET;
        }
        self.store.check_consistent()?;

        if self.use_algorithm {
            self.encode_seed_pass(builder)?;

            let (w, h) = (self.store.width(), self.store.height());
            let mut read = SEED_TARGET;
            for step in StepSchedule::new(w, h) {
                let write = read ^ 1;
                self.encode_flood_pass(builder, read, write, step)?;
                read = write;
            }
            debug_assert_eq!(read, final_buffer_index(pass_count(w, h)));
            self.last_written = read;
        }

        self.encode_display_pass(builder, present_framebuffer)
    }

    fn encode_seed_pass(
        &self,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
    ) -> Result<()> {
        let target = self.store.state_target(SEED_TARGET);
        let set = self
            .programs
            .sampled_texture_set(&self.programs.seed, self.store.seed_view())?;

        with_target(
            builder,
            target.framebuffer.clone(),
            state_clear_values(),
            |builder, viewport| {
                builder
                    .bind_pipeline_graphics(self.programs.seed.clone())
                    .context("Failed to bind seed pipeline")?
                    .bind_descriptor_sets(
                        PipelineBindPoint::Graphics,
                        self.programs.seed.layout().clone(),
                        0,
                        set,
                    )
                    .context("Failed to bind seed texture")?;
                self.draw_quad(builder, viewport)
            },
        )
    }

    fn encode_flood_pass(
        &self,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
        read: usize,
        write: usize,
        step: u32,
    ) -> Result<()> {
        if read == write {
            return Err(PipelineError::InvariantViolation(format!(
                "flood pass would read and write state texture {read}"
            ))
            .into());
        }

        let source = self.store.state_target(read).view.clone();
        let target = self.store.state_target(write).framebuffer.clone();
        let set = self
            .programs
            .sampled_texture_set(&self.programs.flood, source)?;
        let params = FloodParams {
            step: step as i32,
            texw: self.store.width() as f32,
            texh: self.store.height() as f32,
        };

        with_target(
            builder,
            target,
            state_clear_values(),
            |builder, viewport| {
                builder
                    .bind_pipeline_graphics(self.programs.flood.clone())
                    .context("Failed to bind flood pipeline")?
                    .bind_descriptor_sets(
                        PipelineBindPoint::Graphics,
                        self.programs.flood.layout().clone(),
                        0,
                        set,
                    )
                    .context("Failed to bind flood source texture")?
                    .push_constants(self.programs.flood.layout().clone(), 0, params)
                    .context("Failed to push flood params")?;
                self.draw_quad(builder, viewport)
            },
        )
    }

    fn encode_display_pass(
        &self,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
        present_framebuffer: Arc<Framebuffer>,
    ) -> Result<()> {
        // Raw mode samples the seed texture directly, exactly as loaded.
        let source = if self.use_algorithm {
            self.store.state_target(self.last_written).view.clone()
        } else {
            self.store.seed_view()
        };
        let set = self
            .programs
            .sampled_texture_set(&self.programs.display, source)?;
        let params = DisplayParams {
            use_algorithm: self.use_algorithm as i32,
            texw: self.store.width() as f32,
            texh: self.store.height() as f32,
        };

        with_target(
            builder,
            present_framebuffer,
            vec![Some([0.0, 0.0, 0.0, 1.0].into())],
            |builder, viewport| {
                builder
                    .bind_pipeline_graphics(self.programs.display.clone())
                    .context("Failed to bind display pipeline")?
                    .bind_descriptor_sets(
                        PipelineBindPoint::Graphics,
                        self.programs.display.layout().clone(),
                        0,
                        set,
                    )
                    .context("Failed to bind display source texture")?
                    .push_constants(self.programs.display.layout().clone(), 0, params)
                    .context("Failed to push display params")?;
                self.draw_quad(builder, viewport)
            },
        )
    }

    fn draw_quad(
        &self,
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
        viewport: Viewport,
    ) -> Result<()> {
        builder
            .set_viewport(0, [viewport].into_iter().collect())
            .context("Failed to set viewport")?
            .bind_vertex_buffers(0, self.quad.vertices.clone())
            .context("Failed to bind quad vertices")?
            .bind_index_buffer(self.quad.indices.clone())
            .context("Failed to bind quad indices")?;

        // SAFETY: pipeline, descriptor sets and buffers are all bound above
        // and the index count matches the index buffer length.
        unsafe {
            builder
                .draw_indexed(self.quad.index_count(), 1, 0, 0, 0)
                .context("Failed to draw quad")?;
        }

        Ok(())
    }
}

/// Clear values for a state framebuffer: the invalid sentinel plus depth.
fn state_clear_values() -> Vec<Option<vulkano::format::ClearValue>> {
    vec![Some([0.0f32; 4].into()), Some(1f32.into())]
}

#[cfg(test)]
mod tests {
    use super::*;

    // CPU mirror of the shader propagation rule, texel for texel. The GPU
    // path cannot run headless in CI, so the numeric properties of the
    // algorithm are pinned down here against the same semantics the
    // fragment shaders implement.

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Texel {
        seed_x: f32,
        seed_y: f32,
        valid: bool,
    }

    const INVALID: Texel = Texel {
        seed_x: 0.0,
        seed_y: 0.0,
        valid: false,
    };

    fn seed_pass(seed: &SeedImage) -> Vec<Texel> {
        let (w, h) = (seed.width(), seed.height());
        let mut out = vec![INVALID; (w * h) as usize];
        for y in 0..h {
            for x in 0..w {
                if seed.is_foreground(x, y) {
                    out[(y * w + x) as usize] = Texel {
                        seed_x: x as f32,
                        seed_y: y as f32,
                        valid: true,
                    };
                }
            }
        }
        out
    }

    fn flood_pass(prev: &[Texel], w: u32, h: u32, step: u32) -> Vec<Texel> {
        let mut out = vec![INVALID; prev.len()];
        for y in 0..h as i64 {
            for x in 0..w as i64 {
                let mut best = INVALID;
                let mut best_dist = 0.0f32;
                // Row-major offset enumeration, matching the shader.
                for dy in [-1i64, 0, 1] {
                    for dx in [-1i64, 0, 1] {
                        let px = x + dx * step as i64;
                        let py = y + dy * step as i64;
                        if px < 0 || py < 0 || px >= w as i64 || py >= h as i64 {
                            continue;
                        }
                        let cand = prev[(py as u32 * w + px as u32) as usize];
                        if !cand.valid {
                            continue;
                        }
                        let d = ((x as f32 - cand.seed_x).powi(2)
                            + (y as f32 - cand.seed_y).powi(2))
                        .sqrt();
                        if !best.valid || d < best_dist {
                            best = cand;
                            best_dist = d;
                        }
                    }
                }
                out[(y as u32 * w + x as u32) as usize] = best;
            }
        }
        out
    }

    fn run_pipeline(seed: &SeedImage) -> Vec<Texel> {
        let (w, h) = (seed.width(), seed.height());
        let mut state = seed_pass(seed);
        for step in StepSchedule::new(w, h) {
            state = flood_pass(&state, w, h, step);
        }
        state
    }

    fn distance_at(state: &[Texel], w: u32, x: u32, y: u32) -> f32 {
        let t = state[(y * w + x) as usize];
        assert!(t.valid, "texel ({x},{y}) has no seed");
        ((x as f32 - t.seed_x).powi(2) + (y as f32 - t.seed_y).powi(2)).sqrt()
    }

    fn image_with_seeds(w: u32, h: u32, seeds: &[(u32, u32)]) -> SeedImage {
        let mut data = vec![0u8; (w * h) as usize];
        for &(x, y) in seeds {
            data[(y * w + x) as usize] = 255;
        }
        SeedImage::new(w, h, data)
    }

    #[test]
    fn test_single_seed_is_exact() {
        let seed = image_with_seeds(16, 16, &[(3, 5)]);
        let state = run_pipeline(&seed);
        for y in 0..16 {
            for x in 0..16 {
                let expected = (((x as f32 - 3.0).powi(2)) + ((y as f32 - 5.0).powi(2))).sqrt();
                let got = distance_at(&state, 16, x, y);
                assert!(
                    (got - expected).abs() < 1e-4,
                    "({x},{y}): got {got}, expected {expected}"
                );
            }
        }
    }

    #[test]
    fn test_4x4_corner_scenario() {
        let seed = image_with_seeds(4, 4, &[(0, 0)]);
        let state = run_pipeline(&seed);
        assert!((distance_at(&state, 4, 3, 3) - 18.0f32.sqrt()).abs() < 1e-3);
        assert_eq!(distance_at(&state, 4, 0, 0), 0.0);
    }

    #[test]
    fn test_all_texels_valid_after_convergence_bound() {
        let seed = image_with_seeds(33, 20, &[(0, 0), (32, 19), (7, 13)]);
        let (w, h) = (seed.width(), seed.height());
        let mut state = seed_pass(&seed);
        let mut passes = 0;
        for step in StepSchedule::new(w, h) {
            state = flood_pass(&state, w, h, step);
            passes += 1;
        }
        assert_eq!(passes, pass_count(w, h));
        assert!(state.iter().all(|t| t.valid));
    }

    #[test]
    fn test_distance_is_monotonically_non_increasing() {
        let seed = image_with_seeds(32, 32, &[(1, 1), (30, 4), (16, 29)]);
        let (w, h) = (32, 32);
        let mut state = seed_pass(&seed);
        for step in StepSchedule::new(w, h) {
            let next = flood_pass(&state, w, h, step);
            for y in 0..h {
                for x in 0..w {
                    let i = (y * w + x) as usize;
                    if state[i].valid {
                        assert!(next[i].valid, "texel ({x},{y}) lost its candidate");
                        let before = distance_at(&state, w, x, y);
                        let after = distance_at(&next, w, x, y);
                        assert!(
                            after <= before + 1e-5,
                            "({x},{y}) worsened: {before} -> {after}"
                        );
                    }
                }
            }
            state = next;
        }
    }

    #[test]
    fn test_empty_seed_image_stays_invalid() {
        let seed = image_with_seeds(8, 8, &[]);
        let state = run_pipeline(&seed);
        assert!(state.iter().all(|t| !t.valid));
    }

    #[test]
    fn test_seed_pass_overwrites_every_texel() {
        // Reseeding must not depend on residual state: the seed pass writes
        // a defined value to every texel regardless of prior contents.
        let seed = image_with_seeds(4, 4, &[(2, 2)]);
        let fresh = seed_pass(&seed);
        for (i, t) in fresh.iter().enumerate() {
            if i == (2 * 4 + 2) as usize {
                assert!(t.valid);
            } else {
                assert_eq!(*t, INVALID);
            }
        }
    }

    #[test]
    fn test_rerun_is_deterministic() {
        let seed = image_with_seeds(16, 16, &[(2, 3), (14, 11)]);
        assert_eq!(run_pipeline(&seed), run_pipeline(&seed));
    }

    #[test]
    fn test_border_texels_never_wrap() {
        // A single seed at the far corner: if out-of-bounds probes wrapped,
        // texels near the opposite border would report bogus short distances.
        let seed = image_with_seeds(8, 8, &[(7, 7)]);
        let state = run_pipeline(&seed);
        let expected = (49.0f32 + 49.0).sqrt();
        assert!((distance_at(&state, 8, 0, 0) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_final_buffer_parity() {
        assert_eq!(final_buffer_index(0), 0);
        assert_eq!(final_buffer_index(1), 1);
        assert_eq!(final_buffer_index(9), 1);
        assert_eq!(final_buffer_index(10), 0);
    }
}
