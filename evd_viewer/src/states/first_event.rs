use super::{State, TryLoadNextEvent};
use crate::ui::Ui;
use crate::window::EventWindow;

/// Session start: shows a loading indicator until a prefetch is scheduled.
#[derive(Debug, Default)]
pub struct FirstEvent;

impl FirstEvent {
    pub fn poll(&mut self, window: &mut EventWindow, ui: &mut Ui<'_>) -> Option<State> {
        ui.loading(format!("Loading {}", window.source_description()));
        window
            .next_event_status()
            .map(|_| State::TryLoadNextEvent(TryLoadNextEvent))
    }
}
