use crate::states::{FirstEvent, State};
use crate::ui::{IoState, Ui, UiFrame};
use crate::window::EventWindow;

/// One display session: the window plus the active interaction state.
pub struct Session {
    window: EventWindow,
    state: State,
    last_frame: UiFrame,
    frames: u64,
}

impl Session {
    pub fn new(window: EventWindow) -> Self {
        Self {
            window,
            state: State::FirstEvent(FirstEvent),
            last_frame: UiFrame::default(),
            frames: 0,
        }
    }

    /// Host entry point, called once per frame.
    pub fn render(&mut self, width: u32, height: u32, io: &IoState) {
        let mut ui = Ui::new(io, width, height);
        if let Some(next) = self.state.poll(&mut self.window, &mut ui) {
            log::info!("state {} -> {}", self.state.name(), next.name());
            self.state = next;
        }
        self.last_frame = ui.finish();
        self.frames += 1;
    }

    pub fn last_frame(&self) -> &UiFrame {
        &self.last_frame
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_idle()
    }

    pub fn window(&self) -> &EventWindow {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut EventWindow {
        &mut self.window
    }
}
