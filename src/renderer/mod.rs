mod capture;
mod context;
mod surface;
mod target;

pub use capture::{capture_state_to_buffer, capture_to_buffer, StateField};
pub use context::VulkanContext;
pub use surface::PresentSurface;
pub use target::{ensure_renderable, with_target};
