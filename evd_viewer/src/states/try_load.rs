use super::{Running, State};
use crate::cache::EventStatus;
use crate::ui::Ui;
use crate::window::EventWindow;

/// Waits for the oldest prefetch and commits it to the display.
#[derive(Debug, Default)]
pub struct TryLoadNextEvent;

impl TryLoadNextEvent {
    pub fn poll(&mut self, window: &mut EventWindow, ui: &mut Ui<'_>) -> Option<State> {
        match window.next_event_status() {
            None => {
                window.report_error("no event queued");
                Some(State::Running(Running::new(window)))
            }
            Some(EventStatus::Pending) => {
                ui.loading("Loading event");
                None
            }
            Some(EventStatus::Ready) => {
                if let Err(err) = window.load_next_event() {
                    window.report_error(err.to_string());
                }
                Some(State::Running(Running::new(window)))
            }
        }
    }
}
