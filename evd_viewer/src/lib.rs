pub mod cache;
pub mod chooser;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod headless;
pub mod print;
pub mod render;
pub mod scene;
pub mod session;
pub mod source;
pub mod states;
pub mod ui;
pub mod window;

pub use cache::{EventCache, EventStatus, PendingEvent, PreparedEvent};
pub use config::{ViewerConfig, load_config};
pub use error::{DisplayError, PrintError, RenderError};
pub use render::RendererSet;
pub use session::Session;
pub use source::{EventMetadata, EventRecord, EventSource, FileListSource, ReadJob};
pub use states::State;
pub use ui::{ControlId, FieldId, IoState, UiFrame};
pub use window::{EventWindow, StatusMessage};
