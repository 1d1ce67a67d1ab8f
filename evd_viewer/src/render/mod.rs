//! Scene renderers. Renderers run inside prefetch workers and only build
//! CPU-side [`SceneModel`]s; the models reach the foreground [`Scene`] when the
//! event is committed for display.
//!
//! [`Scene`]: crate::scene::Scene

mod detector;
mod hits;
mod model;
mod trajectory;

pub use detector::DetectorRenderer;
pub use hits::HitRenderer;
pub use model::{Bounds, LineSegment, Marker, SceneModel};
pub use trajectory::{TrajectoryRenderer, pdg_color};

use crate::config::ViewerConfig;
use crate::error::RenderError;
use crate::source::EventRecord;

/// Runs once per file (or on a forced reload) and builds the detector model.
pub trait GeometryRenderer: Send + Sync {
    fn name(&self) -> &str;

    fn draw_geometry(&self, record: &EventRecord) -> Result<SceneModel, RenderError>;
}

/// Runs once per event and builds one layer of the event display.
pub trait EventRenderer: Send + Sync {
    fn name(&self) -> &str;

    fn draw_event(&self, record: &EventRecord) -> Result<SceneModel, RenderError>;
}

/// The geometry renderer plus the per-event renderers, shared with prefetch
/// workers.
pub struct RendererSet {
    geometry: Box<dyn GeometryRenderer>,
    events: Vec<Box<dyn EventRenderer>>,
}

impl RendererSet {
    pub fn new(geometry: impl GeometryRenderer + 'static) -> Self {
        Self {
            geometry: Box::new(geometry),
            events: Vec::new(),
        }
    }

    pub fn with_event_renderer(mut self, renderer: impl EventRenderer + 'static) -> Self {
        self.events.push(Box::new(renderer));
        self
    }

    pub fn from_config(config: &ViewerConfig) -> Self {
        let mut set = Self::new(DetectorRenderer);
        if config.trajectories.enabled {
            set = set.with_event_renderer(TrajectoryRenderer::new(config.trajectories.clone()));
        }
        if config.hits.enabled {
            set = set.with_event_renderer(HitRenderer::new(config.hits.clone()));
        }
        set
    }

    pub fn names(&self) -> Vec<&str> {
        std::iter::once(self.geometry.name())
            .chain(self.events.iter().map(|renderer| renderer.name()))
            .collect()
    }

    pub fn draw_geometry(&self, record: &EventRecord) -> Result<SceneModel, RenderError> {
        self.geometry.draw_geometry(record)
    }

    pub fn draw_event(&self, record: &EventRecord) -> Result<Vec<SceneModel>, RenderError> {
        self.events
            .iter()
            .map(|renderer| renderer.draw_event(record))
            .collect()
    }
}
