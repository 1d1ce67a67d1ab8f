use std::path::PathBuf;

use super::{State, TryLoadNextEvent, disabled_controls};
use crate::ui::Ui;
use crate::window::EventWindow;

/// Where a non-sequential request moves the source once the cache settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seek {
    Goto { run: i32, event: i32 },
    NewFile(PathBuf),
    Reload,
}

/// Waits until no prefetch can still touch the source cursor, then clears the
/// cache and repositions the source. Never pushes while waiting.
#[derive(Debug)]
pub struct NonSequential {
    seek: Seek,
    waited_frames: u64,
}

impl NonSequential {
    pub fn new(seek: Seek) -> Self {
        Self {
            seek,
            waited_frames: 0,
        }
    }

    pub fn seek(&self) -> &Seek {
        &self.seek
    }

    pub fn name(&self) -> &'static str {
        match self.seek {
            Seek::Goto { .. } => "Goto",
            Seek::NewFile(_) => "NewFile",
            Seek::Reload => "Reload",
        }
    }

    pub fn poll(&mut self, window: &mut EventWindow, ui: &mut Ui<'_>) -> Option<State> {
        disabled_controls(window, ui);
        ui.notice("waiting for processing to finish");

        if !window.cache_settled() {
            self.waited_frames += 1;
            return None;
        }
        log::debug!(
            "{} proceeding after {} frames of waiting",
            self.name(),
            self.waited_frames
        );

        window.clear_cache();
        let scheduled = match &self.seek {
            Seek::Goto { run, event } => window.process_event_at(*run, *event),
            Seek::NewFile(path) => {
                window.open_file(path);
                true
            }
            Seek::Reload => window.reload_current(),
        };
        // The cache was just emptied, so the push always fits.
        debug_assert!(scheduled, "{} push refused on an empty cache", self.name());
        if !scheduled {
            log::warn!("{} seek was not scheduled", self.name());
        }
        Some(State::TryLoadNextEvent(TryLoadNextEvent))
    }
}
