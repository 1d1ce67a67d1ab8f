//! Immediate-mode description of the control bar. States declare widgets
//! every frame; the host turns the resulting [`UiFrame`] into pixels and
//! collects the next frame's input into an [`IoState`].

use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ControlId {
    Print,
    Jump,
    Next,
    Reload,
    ChooseFile,
    ChooserEntry(usize),
    ChooserCancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    Run,
    Event,
}

/// Input gathered by the host for a single frame.
#[derive(Debug, Clone, Default)]
pub struct IoState {
    pub clicks: BTreeSet<ControlId>,
    pub field_edits: Vec<(FieldId, i32)>,
    pub dropped_file: Option<PathBuf>,
}

impl IoState {
    pub fn click(control: ControlId) -> Self {
        let mut io = Self::default();
        io.clicks.insert(control);
        io
    }

    pub fn with_field(mut self, field: FieldId, value: i32) -> Self {
        self.field_edits.push((field, value));
        self
    }

    pub fn dropped(path: impl Into<PathBuf>) -> Self {
        Self {
            dropped_file: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clicks.is_empty() && self.field_edits.is_empty() && self.dropped_file.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    Label(String),
    Notice(String),
    Loading(String),
    Button {
        id: ControlId,
        label: String,
        enabled: bool,
    },
    IntField {
        id: FieldId,
        label: String,
        value: i32,
        enabled: bool,
    },
}

/// What a state drew during one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiFrame {
    pub width: u32,
    pub height: u32,
    pub widgets: Vec<Widget>,
}

impl UiFrame {
    pub fn is_loading(&self) -> bool {
        self.widgets
            .iter()
            .any(|widget| matches!(widget, Widget::Loading(_)))
    }

    pub fn has_enabled_button(&self, id: ControlId) -> bool {
        self.widgets.iter().any(|widget| {
            matches!(widget, Widget::Button { id: button, enabled: true, .. } if *button == id)
        })
    }

    /// One-line rendition used for window titles and headless logs.
    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .widgets
            .iter()
            .filter_map(|widget| match widget {
                Widget::Label(text) => Some(text.clone()),
                Widget::Notice(text) => Some(format!("! {text}")),
                Widget::Loading(text) => Some(format!("{text}...")),
                Widget::IntField { label, value, .. } => Some(format!("{label}={value}")),
                Widget::Button { .. } => None,
            })
            .collect();
        parts.join(" | ")
    }
}

pub struct Ui<'io> {
    io: &'io IoState,
    width: u32,
    height: u32,
    widgets: Vec<Widget>,
}

impl<'io> Ui<'io> {
    pub fn new(io: &'io IoState, width: u32, height: u32) -> Self {
        Self {
            io,
            width,
            height,
            widgets: Vec::new(),
        }
    }

    pub fn io(&self) -> &IoState {
        self.io
    }

    pub fn label(&mut self, text: impl Into<String>) {
        self.widgets.push(Widget::Label(text.into()));
    }

    pub fn notice(&mut self, text: impl Into<String>) {
        self.widgets.push(Widget::Notice(text.into()));
    }

    pub fn loading(&mut self, text: impl Into<String>) {
        self.widgets.push(Widget::Loading(text.into()));
    }

    /// Draws an enabled button; true when it was clicked this frame.
    pub fn button(&mut self, id: ControlId, label: &str) -> bool {
        self.widgets.push(Widget::Button {
            id,
            label: label.to_string(),
            enabled: true,
        });
        self.io.clicks.contains(&id)
    }

    pub fn disabled_button(&mut self, id: ControlId, label: &str) {
        self.widgets.push(Widget::Button {
            id,
            label: label.to_string(),
            enabled: false,
        });
    }

    /// Draws an integer field, applying this frame's edit. True when edited.
    pub fn int_field(&mut self, id: FieldId, label: &str, value: &mut i32) -> bool {
        let edit = self
            .io
            .field_edits
            .iter()
            .rev()
            .find(|(field, _)| *field == id)
            .map(|(_, new_value)| *new_value);
        if let Some(new_value) = edit {
            *value = new_value;
        }
        self.widgets.push(Widget::IntField {
            id,
            label: label.to_string(),
            value: *value,
            enabled: true,
        });
        edit.is_some()
    }

    pub fn disabled_int_field(&mut self, id: FieldId, label: &str, value: i32) {
        self.widgets.push(Widget::IntField {
            id,
            label: label.to_string(),
            value,
            enabled: false,
        });
    }

    pub fn finish(self) -> UiFrame {
        UiFrame {
            width: self.width,
            height: self.height,
            widgets: self.widgets,
        }
    }
}
