mod config;
mod crash_log;
mod error;
mod input;
mod jfa;
mod renderer;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use vulkano::{
    command_buffer::{AutoCommandBufferBuilder, CommandBufferUsage},
    instance::Instance,
    swapchain::{acquire_next_image, Surface, SwapchainPresentInfo},
    sync::{self, GpuFuture},
    Validated, VulkanError,
};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::config::Settings;
use crate::error::PipelineError;
use crate::input::{command_from_event, Command};
use crate::jfa::{catalog_shape, JfaController, SeedImage};
use crate::renderer::{
    capture_state_to_buffer, capture_to_buffer, PresentSurface, VulkanContext,
};

/// CLI arguments for headless/screenshot use
#[derive(Default)]
struct CliArgs {
    /// Path to save a screenshot of the presentation surface
    screenshot: Option<PathBuf>,
    /// Path to save the computed distance field as a greyscale PNG
    dump_field: Option<PathBuf>,
    /// Seed image file to load instead of a catalog shape
    seed_path: Option<PathBuf>,
    /// Catalog shape to start with (1-based)
    shape: Option<u8>,
    /// Start in raw passthrough mode
    raw: bool,
}

fn parse_args() -> CliArgs {
    let mut args = CliArgs::default();
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--screenshot" => {
                args.screenshot = iter.next().map(PathBuf::from);
            }
            "--dump-field" => {
                args.dump_field = iter.next().map(PathBuf::from);
            }
            "--shape" => {
                args.shape = iter.next().and_then(|s| s.parse().ok());
            }
            "--raw" => {
                args.raw = true;
            }
            other if !other.starts_with('-') => {
                // Positional arg = seed image file
                args.seed_path = Some(PathBuf::from(other));
            }
            _ => {}
        }
    }

    args
}

fn main() -> Result<()> {
    crash_log::init();
    crash_log::install_panic_hook();

    let cli_args = parse_args();
    let settings = Settings::load();

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(&event_loop, cli_args, settings)?;

    event_loop.run_app(&mut app).context("Event loop error")?;

    Ok(())
}

struct App {
    instance: Arc<Instance>,
    cli_args: CliArgs,
    settings: Settings,
    renderer: Option<Renderer>,
}

struct Renderer {
    window: Arc<Window>,
    ctx: VulkanContext,
    present: PresentSurface,
    controller: JfaController,
    previous_frame_end: Option<Box<dyn GpuFuture>>,
    frame_count: u32,
    fps: FpsCounter,
}

impl App {
    fn new(event_loop: &EventLoop<()>, cli_args: CliArgs, settings: Settings) -> Result<Self> {
        let instance = VulkanContext::create_instance(event_loop)?;

        Ok(Self {
            instance,
            cli_args,
            settings,
            renderer: None,
        })
    }

    /// Seed image selected by CLI and settings, in that order of priority.
    fn initial_seed(&self) -> Result<SeedImage> {
        if let Some(path) = &self.cli_args.seed_path {
            return SeedImage::from_file(path);
        }
        let shape = self.cli_args.shape.unwrap_or(self.settings.start_shape);
        Ok(catalog_shape(shape))
    }

    fn init_renderer(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title("jumpflood")
                        .with_inner_size(winit::dpi::LogicalSize::new(512, 512)),
                )
                .context("Failed to create window")?,
        );

        let surface = Surface::from_window(self.instance.clone(), window.clone())
            .context("Failed to create surface")?;
        let ctx = VulkanContext::with_surface(self.instance.clone(), &surface)?;
        crash_log::set_vulkan_device(
            &ctx.device.physical_device().properties().device_name,
        );

        let present = PresentSurface::new(&ctx, surface, window.inner_size())?;

        // Seed texture upload and state clear are recorded into a one-shot
        // command buffer and waited on before the first frame.
        let seed = self.initial_seed()?;
        let mut upload_builder = AutoCommandBufferBuilder::primary(
            ctx.command_buffer_allocator.clone(),
            ctx.queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .context("Failed to create upload command buffer")?;

        let mut controller =
            JfaController::new(&ctx, present.render_pass.clone(), &seed, &mut upload_builder)?;
        controller.use_algorithm = self.settings.use_algorithm && !self.cli_args.raw;

        let upload_buffer = upload_builder
            .build()
            .context("Failed to build upload buffer")?;
        let upload_future = sync::now(ctx.device.clone())
            .then_execute(ctx.queue.clone(), upload_buffer)
            .context("Failed to execute upload")?
            .then_signal_fence_and_flush()
            .map_err(Validated::unwrap)
            .context("Failed to flush upload")?;
        upload_future
            .wait(None)
            .context("Failed to wait for upload")?;

        crash_log::breadcrumb(format!(
            "pipeline ready: {}x{} seed with {} sites, {} flood passes",
            seed.width(),
            seed.height(),
            seed.foreground_count(),
            jfa::schedule::pass_count(seed.width(), seed.height()),
        ));

        let previous_frame_end = Some(sync::now(ctx.device.clone()).boxed());

        self.renderer = Some(Renderer {
            window,
            ctx,
            present,
            controller,
            previous_frame_end,
            frame_count: 0,
            fps: FpsCounter::new(),
        });

        Ok(())
    }

    fn handle_command(&mut self, command: Command, event_loop: &ActiveEventLoop) {
        let Some(renderer) = &mut self.renderer else {
            return;
        };
        match command {
            Command::SelectShape(n) => {
                crash_log::breadcrumb(format!("select shape {n}"));
                renderer.controller.request_seed(catalog_shape(n));
                self.settings.start_shape = n;
                self.settings.save();
            }
            Command::UseAlgorithm => {
                crash_log::breadcrumb("mode: distance field".into());
                renderer.controller.use_algorithm = true;
                self.settings.use_algorithm = true;
                self.settings.save();
            }
            Command::ShowRaw => {
                crash_log::breadcrumb("mode: raw seed".into());
                renderer.controller.use_algorithm = false;
                self.settings.use_algorithm = false;
                self.settings.save();
            }
            Command::Quit => event_loop.exit(),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_none() {
            if let Err(e) = self.init_renderer(event_loop) {
                eprintln!("Failed to initialize renderer: {e:?}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(command) = command_from_event(&event) {
            self.handle_command(command, event_loop);
            return;
        }

        let Some(renderer) = &mut self.renderer else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(_) => {
                renderer.present.needs_recreate = true;
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = renderer.draw() {
                    match e.downcast_ref::<PipelineError>() {
                        Some(pe) if pe.is_recoverable() => {
                            // Full reset: reallocate for the new size and
                            // reseed, rather than patching partial state.
                            eprintln!("Recoverable pipeline error, reseeding: {pe}");
                            renderer
                                .controller
                                .request_seed(catalog_shape(self.settings.start_shape));
                        }
                        _ => eprintln!("Draw error: {e:?}"),
                    }
                }

                // Headless capture modes: grab output after a few frames
                // for stability, then exit.
                if renderer.frame_count == 3 {
                    let mut done = false;
                    if let Some(path) = &self.cli_args.screenshot {
                        match renderer.capture_screenshot() {
                            Ok(img) => match img.save(path) {
                                Ok(()) => println!("Screenshot saved to: {}", path.display()),
                                Err(e) => eprintln!("Failed to save screenshot: {e}"),
                            },
                            Err(e) => eprintln!("Failed to capture screenshot: {e:?}"),
                        }
                        done = true;
                    }
                    if let Some(path) = &self.cli_args.dump_field {
                        match renderer.capture_distance_field() {
                            Ok(img) => match img.save(path) {
                                Ok(()) => println!("Distance field saved to: {}", path.display()),
                                Err(e) => eprintln!("Failed to save distance field: {e}"),
                            },
                            Err(e) => eprintln!("Failed to read back distance field: {e:?}"),
                        }
                        done = true;
                    }
                    if done {
                        event_loop.exit();
                        return;
                    }
                }

                renderer.window.request_redraw();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(renderer) = &self.renderer {
            renderer.window.request_redraw();
        }
    }
}

impl Renderer {
    fn draw(&mut self) -> Result<()> {
        self.previous_frame_end
            .as_mut()
            .context("Missing frame future")?
            .cleanup_finished();

        if self.present.needs_recreate {
            crash_log::breadcrumb("swapchain recreate".into());
            self.present.recreate(self.window.inner_size())?;
        }

        let (image_index, suboptimal, acquire_future) =
            match acquire_next_image(self.present.swapchain.clone(), None)
                .map_err(Validated::unwrap)
            {
                Ok(r) => r,
                Err(VulkanError::OutOfDate) => {
                    self.present.needs_recreate = true;
                    return Ok(());
                }
                Err(e) => anyhow::bail!("Failed to acquire next image: {e:?}"),
            };

        if suboptimal {
            self.present.needs_recreate = true;
        }

        let mut builder = AutoCommandBufferBuilder::primary(
            self.ctx.command_buffer_allocator.clone(),
            self.ctx.queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .context("Failed to create command buffer builder")?;

        self.controller.encode_frame(
            &mut builder,
            self.present.framebuffers[image_index as usize].clone(),
        )?;

        let command_buffer = builder.build().context("Failed to build command buffer")?;

        let future = self
            .previous_frame_end
            .take()
            .context("Missing frame future")?
            .join(acquire_future)
            .then_execute(self.ctx.queue.clone(), command_buffer)
            .context("Failed to execute command buffer")?
            .then_swapchain_present(
                self.ctx.queue.clone(),
                SwapchainPresentInfo::swapchain_image_index(
                    self.present.swapchain.clone(),
                    image_index,
                ),
            )
            .then_signal_fence_and_flush();

        match future.map_err(Validated::unwrap) {
            Ok(future) => {
                self.previous_frame_end = Some(future.boxed());
            }
            Err(VulkanError::OutOfDate) => {
                self.present.needs_recreate = true;
                self.previous_frame_end = Some(sync::now(self.ctx.device.clone()).boxed());
            }
            Err(e) => {
                self.previous_frame_end = Some(sync::now(self.ctx.device.clone()).boxed());
                anyhow::bail!("Failed to flush: {e:?}");
            }
        }

        self.frame_count += 1;
        if let Some(fps) = self.fps.tick(Instant::now()) {
            self.window.set_title(&format!("jumpflood - FPS: {fps:.1}"));
        }

        Ok(())
    }

    /// Render one frame into an acquired swapchain image and read it back.
    fn capture_screenshot(&mut self) -> Result<image::RgbaImage> {
        self.previous_frame_end
            .as_mut()
            .context("Missing frame future")?
            .cleanup_finished();

        let (image_index, _suboptimal, acquire_future) =
            acquire_next_image(self.present.swapchain.clone(), None)
                .map_err(Validated::unwrap)
                .context("Failed to acquire image for screenshot")?;

        let mut builder = AutoCommandBufferBuilder::primary(
            self.ctx.command_buffer_allocator.clone(),
            self.ctx.queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .context("Failed to create command buffer")?;

        self.controller.encode_frame(
            &mut builder,
            self.present.framebuffers[image_index as usize].clone(),
        )?;

        let capture = capture_to_buffer(
            &mut builder,
            self.ctx.memory_allocator.clone(),
            self.present.images[image_index as usize].clone(),
            self.present.image_format(),
        )?;

        self.execute_and_wait(builder, acquire_future)?;
        capture.to_image()
    }

    /// Run the full pass sequence and read the converged state texture back
    /// as a normalized distance image.
    fn capture_distance_field(&mut self) -> Result<image::GrayImage> {
        self.previous_frame_end
            .as_mut()
            .context("Missing frame future")?
            .cleanup_finished();

        let (image_index, _suboptimal, acquire_future) =
            acquire_next_image(self.present.swapchain.clone(), None)
                .map_err(Validated::unwrap)
                .context("Failed to acquire image for field readback")?;

        let mut builder = AutoCommandBufferBuilder::primary(
            self.ctx.command_buffer_allocator.clone(),
            self.ctx.queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .context("Failed to create command buffer")?;

        self.controller.encode_frame(
            &mut builder,
            self.present.framebuffers[image_index as usize].clone(),
        )?;

        let capture = capture_state_to_buffer(
            &mut builder,
            self.ctx.memory_allocator.clone(),
            self.controller.last_state_image(),
        )?;

        self.execute_and_wait(builder, acquire_future)?;
        Ok(capture.to_field()?.to_distance_image())
    }

    fn execute_and_wait(
        &mut self,
        builder: AutoCommandBufferBuilder<
            vulkano::command_buffer::PrimaryAutoCommandBuffer,
        >,
        acquire_future: impl GpuFuture + 'static,
    ) -> Result<()> {
        let command_buffer = builder.build().context("Failed to build command buffer")?;

        let future = self
            .previous_frame_end
            .take()
            .context("Missing frame future")?
            .join(acquire_future)
            .then_execute(self.ctx.queue.clone(), command_buffer)
            .context("Failed to execute")?
            .then_signal_fence_and_flush()
            .map_err(Validated::unwrap)
            .context("Failed to flush")?;

        future.wait(None).context("Failed to wait for GPU")?;
        self.previous_frame_end = Some(sync::now(self.ctx.device.clone()).boxed());
        Ok(())
    }
}

/// Frame counter reporting smoothed FPS about once per second.
struct FpsCounter {
    frames: u32,
    window_start: Instant,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            frames: 0,
            window_start: Instant::now(),
        }
    }

    /// Count one frame; returns the FPS over the last window once a second
    /// has elapsed.
    fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.duration_since(self.window_start).as_secs_f32();
        if elapsed < 1.0 {
            return None;
        }
        let fps = self.frames as f32 / elapsed;
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fps_counter_reports_once_per_second() {
        let t0 = Instant::now();
        let mut fps = FpsCounter {
            frames: 0,
            window_start: t0,
        };
        for i in 1..=9 {
            assert_eq!(fps.tick(t0 + Duration::from_millis(i * 100)), None);
        }
        let reported = fps
            .tick(t0 + Duration::from_millis(1000))
            .expect("one second elapsed");
        assert!((reported - 10.0).abs() < 0.5, "got {reported}");
        // Window restarts after a report.
        assert_eq!(fps.tick(t0 + Duration::from_millis(1100)), None);
    }
}
