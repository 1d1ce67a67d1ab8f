use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the prefetch pipeline. Every variant is delivered at
/// drain time; scheduling a read never fails.
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("no more files to read")]
    NoMoreFiles,
    #[error("run {run} event {event} not found")]
    EventNotFound { run: i32, event: i32 },
    #[error("reading {}: {message}", path.display())]
    Read { path: PathBuf, message: String },
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("prefetch worker exited before producing a result")]
    WorkerLost,
    #[error("failed to start prefetch worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("event cache is empty")]
    CacheEmpty,
}

impl DisplayError {
    pub fn read(path: impl Into<PathBuf>, err: anyhow::Error) -> Self {
        Self::Read {
            path: path.into(),
            message: format!("{err:#}"),
        }
    }

    /// True when the source had no event to give: `NoMoreFiles` after the
    /// last file, or `EventNotFound` for a failed seek.
    pub fn is_missing_event(&self) -> bool {
        matches!(self, Self::NoMoreFiles | Self::EventNotFound { .. })
    }
}

#[derive(Debug, Error)]
#[error("renderer {renderer} failed: {message}")]
pub struct RenderError {
    pub renderer: String,
    pub message: String,
}

impl RenderError {
    pub fn new(renderer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            renderer: renderer.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("no event is displayed")]
    NothingDisplayed,
    #[error("creating print directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
