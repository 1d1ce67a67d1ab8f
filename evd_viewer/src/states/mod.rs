//! Interaction state machine. Exactly one [`State`] is alive per session; each
//! frame the session polls it with the window and the frame's UI, and a
//! returned state replaces the current one.

mod first_event;
mod non_sequential;
mod running;
mod try_load;

pub use first_event::FirstEvent;
pub use non_sequential::{NonSequential, Seek};
pub use running::Running;
pub use try_load::TryLoadNextEvent;

use crate::ui::{ControlId, FieldId, Ui};
use crate::window::EventWindow;

pub enum State {
    FirstEvent(FirstEvent),
    Running(Running),
    TryLoadNextEvent(TryLoadNextEvent),
    NonSequential(NonSequential),
}

impl State {
    pub fn name(&self) -> &'static str {
        match self {
            State::FirstEvent(_) => "FirstEvent",
            State::Running(_) => "Running",
            State::TryLoadNextEvent(_) => "TryLoadNextEvent",
            State::NonSequential(state) => state.name(),
        }
    }

    /// Runs one frame of the active state. `Some` is the state to switch to.
    pub fn poll(&mut self, window: &mut EventWindow, ui: &mut Ui<'_>) -> Option<State> {
        match self {
            State::FirstEvent(state) => state.poll(window, ui),
            State::Running(state) => state.poll(window, ui),
            State::TryLoadNextEvent(state) => state.poll(window, ui),
            State::NonSequential(state) => state.poll(window, ui),
        }
    }

    /// True when the state is waiting for user input and nothing else.
    pub fn is_idle(&self) -> bool {
        match self {
            State::Running(running) => !running.chooser_open(),
            _ => false,
        }
    }
}

/// Draws the control bar with every control disabled.
fn disabled_controls(window: &EventWindow, ui: &mut Ui<'_>) {
    let (run, event) = window
        .current_event()
        .map(|metadata| metadata.key())
        .unwrap_or_default();
    ui.disabled_button(ControlId::Print, "Print");
    ui.disabled_int_field(FieldId::Run, "run", run);
    ui.disabled_int_field(FieldId::Event, "event", event);
    ui.disabled_button(ControlId::Jump, "Go");
    ui.disabled_button(ControlId::Next, "Next");
    ui.disabled_button(ControlId::Reload, "Reload");
    ui.disabled_button(ControlId::ChooseFile, "Choose file");
}
