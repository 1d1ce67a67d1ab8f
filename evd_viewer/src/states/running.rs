use std::path::PathBuf;

use super::{NonSequential, Seek, State, TryLoadNextEvent, disabled_controls};
use crate::cache::EventStatus;
use crate::chooser::FileChooser;
use crate::ui::{ControlId, FieldId, Ui};
use crate::window::{EventWindow, StatusMessage};

/// Steady state: interactive controls plus greedy prefetching.
pub struct Running {
    run_input: i32,
    event_input: i32,
    chooser: Option<FileChooser>,
}

impl Running {
    /// Seeds the jump fields from the displayed event.
    pub fn new(window: &EventWindow) -> Self {
        let (run_input, event_input) = window
            .current_event()
            .map(|metadata| metadata.key())
            .unwrap_or_default();
        Self {
            run_input,
            event_input,
            chooser: None,
        }
    }

    pub fn chooser_open(&self) -> bool {
        self.chooser.is_some()
    }

    pub fn poll(&mut self, window: &mut EventWindow, ui: &mut Ui<'_>) -> Option<State> {
        // At most one push per frame, and never behind a read still in flight.
        if window.event_cache_size() < window.max_event_cache_size()
            && window.last_event_status() != Some(EventStatus::Pending)
        {
            window.process_event(false);
        }

        match window.current_event() {
            Some(metadata) => ui.label(metadata.to_string()),
            None => ui.label("no event displayed"),
        }
        ui.label(format!(
            "cache {}/{}",
            window.event_cache_size(),
            window.max_event_cache_size()
        ));
        if let Some(status) = window.status() {
            match status {
                StatusMessage::Error(text) => ui.notice(text.clone()),
                StatusMessage::Info(text) => ui.label(text.clone()),
            }
        }

        if let Some(path) = ui.io().dropped_file.clone() {
            self.chooser = None;
            return Some(new_file(path));
        }
        if self.chooser.is_some() {
            disabled_controls(window, ui);
            return self.poll_chooser(ui);
        }

        if ui.button(ControlId::Print, "Print") {
            match window.print_scene() {
                Ok(path) => window.report_info(format!("saved {}", path.display())),
                Err(err) => window.report_error(format!("print failed: {err}")),
            }
        }
        ui.int_field(FieldId::Run, "run", &mut self.run_input);
        ui.int_field(FieldId::Event, "event", &mut self.event_input);
        let jump = ui.button(ControlId::Jump, "Go");
        let next = ui.button(ControlId::Next, "Next");
        let reload = ui.button(ControlId::Reload, "Reload");
        let choose = ui.button(ControlId::ChooseFile, "Choose file");

        if next {
            if window.event_cache_size() == 0 {
                window.process_event(false);
            }
            return Some(State::TryLoadNextEvent(TryLoadNextEvent));
        }
        if jump {
            return Some(State::NonSequential(NonSequential::new(Seek::Goto {
                run: self.run_input,
                event: self.event_input,
            })));
        }
        if reload {
            return Some(State::NonSequential(NonSequential::new(Seek::Reload)));
        }
        if choose {
            let chooser = FileChooser::scan(window.chooser_root());
            if chooser.entries().is_empty() {
                window.report_error(format!(
                    "no event files under {}",
                    chooser.root().display()
                ));
            } else {
                self.chooser = Some(chooser);
            }
        }
        None
    }

    fn poll_chooser(&mut self, ui: &mut Ui<'_>) -> Option<State> {
        let chooser = self.chooser.as_ref()?;
        ui.label(format!("choose a file under {}", chooser.root().display()));
        let mut picked = None;
        for (index, path) in chooser.entries().iter().enumerate() {
            let label = chooser
                .entry_label(index)
                .unwrap_or_else(|| path.display().to_string());
            if ui.button(ControlId::ChooserEntry(index), &label) && picked.is_none() {
                picked = Some(path.clone());
            }
        }
        let cancel = ui.button(ControlId::ChooserCancel, "Cancel");

        if let Some(path) = picked {
            self.chooser = None;
            return Some(new_file(path));
        }
        if cancel {
            self.chooser = None;
        }
        None
    }
}

fn new_file(path: PathBuf) -> State {
    State::NonSequential(NonSequential::new(Seek::NewFile(path)))
}
