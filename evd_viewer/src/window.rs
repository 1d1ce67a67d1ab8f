//! The display window's cache/seek surface. States receive the window as an
//! explicit parameter and drive the pipeline only through these operations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{EventCache, EventStatus};
use crate::config::ViewerConfig;
use crate::error::{DisplayError, PrintError};
use crate::print;
use crate::render::RendererSet;
use crate::scene::Scene;
use crate::source::{EventMetadata, EventSource, FileListSource};

/// Builds a source for a file picked in the chooser or dropped on the window.
pub type SourceOpener = Box<dyn Fn(&Path) -> Box<dyn EventSource> + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    Info(String),
    Error(String),
}

impl StatusMessage {
    pub fn text(&self) -> &str {
        match self {
            StatusMessage::Info(text) | StatusMessage::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StatusMessage::Error(_))
    }
}

pub struct EventWindow {
    source: Box<dyn EventSource>,
    cache: EventCache,
    scene: Scene,
    current: Option<EventMetadata>,
    status: Option<StatusMessage>,
    committed: u64,
    print_dir: PathBuf,
    chooser_root: PathBuf,
    opener: SourceOpener,
}

impl EventWindow {
    /// Creates the window and seeds the cache with the source's first event.
    pub fn new(
        source: Box<dyn EventSource>,
        renderers: Arc<RendererSet>,
        config: &ViewerConfig,
    ) -> Self {
        let mut window = Self {
            source,
            cache: EventCache::new(config.cache_capacity(), renderers),
            scene: Scene::new(),
            current: None,
            status: None,
            committed: 0,
            print_dir: config.print_dir.clone(),
            chooser_root: config
                .chooser_root
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
            opener: Box::new(|path: &Path| -> Box<dyn EventSource> {
                Box::new(FileListSource::open(vec![path.to_path_buf()]))
            }),
        };
        log::info!("displaying events from {}", window.source.describe());
        window.process_event(true);
        window
    }

    pub fn with_opener(mut self, opener: SourceOpener) -> Self {
        self.opener = opener;
        self
    }

    /// Prefetches the source's next event.
    pub fn process_event(&mut self, force_geometry: bool) -> bool {
        self.cache.push_next(self.source.as_mut(), force_geometry)
    }

    /// Prefetches an explicit run/event pair.
    pub fn process_event_at(&mut self, run: i32, event: i32) -> bool {
        self.cache.push_seek(self.source.as_mut(), run, event, false)
    }

    /// Re-reads the displayed event from a freshly opened source with the
    /// geometry rebuilt. Without a displayed event the next event is read.
    pub fn reload_current(&mut self) -> bool {
        match self.source.reopen() {
            Some(fresh) => {
                log::info!("reopened {}", fresh.describe());
                self.source = fresh;
            }
            None => log::debug!("{} cannot be reopened; reusing it", self.source.describe()),
        }
        match self.current.as_ref().map(EventMetadata::key) {
            Some((run, event)) => self.cache.push_seek(self.source.as_mut(), run, event, true),
            None => self.process_event(true),
        }
    }

    /// Commits the oldest prefetched event to the display. On failure the
    /// displayed event is left untouched.
    pub fn load_next_event(&mut self) -> Result<EventMetadata, DisplayError> {
        let prepared = self.cache.drain_front()?;
        if let Some(geometry) = prepared.geometry {
            if prepared.metadata.new_file {
                log::info!("file changed to {}", prepared.metadata.file_name);
            } else {
                log::debug!("geometry rebuilt for {}", prepared.metadata.file_name);
            }
            self.scene.replace_geometry(geometry);
        }
        self.scene.install_event(&prepared.metadata, prepared.layers);
        log::info!("displaying {}", prepared.metadata);
        self.current = Some(prepared.metadata.clone());
        self.status = None;
        self.committed += 1;
        Ok(prepared.metadata)
    }

    /// Abandons every prefetched event and releases scene state that does not
    /// belong to the displayed event. Prefetched models live in the cache
    /// entries, so dropping the entries releases them. Abandoned reads already
    /// moved the source cursor, so it is put back just past the displayed
    /// event.
    pub fn clear_cache(&mut self) {
        let abandoned = self.cache.clear();
        if abandoned > 0 {
            if let Some(current) = self.current.as_ref() {
                self.source.resume_after(current);
            }
        }
        let released = self.scene.release_stale(self.current.as_ref());
        if abandoned > 0 || released > 0 {
            log::debug!("cache cleared: {abandoned} prefetches abandoned, {released} layers released");
        }
    }

    /// Switches to a new source and seeds the cache from it.
    pub fn set_source(&mut self, source: Box<dyn EventSource>) {
        if !self.cache.is_empty() {
            self.clear_cache();
        }
        log::info!("switching source to {}", source.describe());
        self.source = source;
        self.process_event(true);
    }

    pub fn open_file(&mut self, path: &Path) {
        let source = (self.opener)(path);
        self.set_source(source);
    }

    pub fn event_cache_size(&self) -> usize {
        self.cache.size()
    }

    pub fn max_event_cache_size(&self) -> usize {
        self.cache.capacity()
    }

    pub fn next_event_status(&mut self) -> Option<EventStatus> {
        self.cache.peek_front().map(|entry| entry.status())
    }

    pub fn last_event_status(&mut self) -> Option<EventStatus> {
        self.cache.peek_back().map(|entry| entry.status())
    }

    /// True when no prefetch can still be touching the source.
    pub fn cache_settled(&mut self) -> bool {
        self.cache.is_empty() || self.cache.all_ready()
    }

    pub fn current_event(&self) -> Option<&EventMetadata> {
        self.current.as_ref()
    }

    /// Number of events committed to the display so far.
    pub fn committed_events(&self) -> u64 {
        self.committed
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    pub fn chooser_root(&self) -> &Path {
        &self.chooser_root
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn report_info(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::info!("{text}");
        self.status = Some(StatusMessage::Info(text));
    }

    pub fn report_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        log::warn!("{text}");
        self.status = Some(StatusMessage::Error(text));
    }

    pub fn print_scene(&self) -> Result<PathBuf, PrintError> {
        print::print_scene(&self.scene, &self.print_dir)
    }
}
