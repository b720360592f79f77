//! Input handling for the viewer.
//!
//! Distills winit keyboard events into the small command set the pipeline
//! reacts to: shape selection, display-mode toggling and quit.

mod keyboard;

pub use keyboard::{command_for, Command, Key};

/// Extract a command from a winit window event, if it carries one.
pub fn command_from_event(event: &winit::event::WindowEvent) -> Option<Command> {
    let winit::event::WindowEvent::KeyboardInput { event, .. } = event else {
        return None;
    };
    if event.state != winit::event::ElementState::Pressed || event.repeat {
        return None;
    }
    command_for(Key::from_winit(&event.physical_key))
}
