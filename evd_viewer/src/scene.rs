//! Foreground scene state. Only the window's foreground thread touches it:
//! models arrive here when an event is committed and leave when the event is
//! replaced or released.

use crate::render::{Bounds, SceneModel};
use crate::source::EventMetadata;

#[derive(Debug, Default)]
pub struct Scene {
    geometry: Option<SceneModel>,
    event_layers: Vec<SceneModel>,
    event: Option<EventMetadata>,
    generation: u64,
    geometry_refreshes: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// File-changed path: swaps the detector model.
    pub fn replace_geometry(&mut self, model: SceneModel) {
        self.geometry = Some(model);
        self.geometry_refreshes += 1;
        self.generation += 1;
    }

    pub fn install_event(&mut self, metadata: &EventMetadata, layers: Vec<SceneModel>) {
        self.event_layers = layers;
        self.event = Some(metadata.clone());
        self.generation += 1;
    }

    /// Drops per-event layers that do not belong to `current`. Returns how many
    /// layers were released.
    pub fn release_stale(&mut self, current: Option<&EventMetadata>) -> usize {
        let stale = match (&self.event, current) {
            (Some(installed), Some(current)) => installed.key() != current.key(),
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !stale {
            return 0;
        }
        let released = self.event_layers.len();
        self.event_layers.clear();
        self.event = None;
        self.generation += 1;
        released
    }

    pub fn geometry(&self) -> Option<&SceneModel> {
        self.geometry.as_ref()
    }

    pub fn event_layers(&self) -> &[SceneModel] {
        &self.event_layers
    }

    pub fn event(&self) -> Option<&EventMetadata> {
        self.event.as_ref()
    }

    /// Bumped on every change so hosts know when to re-upload.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn geometry_refreshes(&self) -> u64 {
        self.geometry_refreshes
    }

    pub fn models(&self) -> impl Iterator<Item = &SceneModel> {
        self.geometry.iter().chain(self.event_layers.iter())
    }

    pub fn line_count(&self) -> usize {
        self.models().map(|model| model.lines.len()).sum()
    }

    pub fn marker_count(&self) -> usize {
        self.models().map(|model| model.markers.len()).sum()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.models()
            .filter_map(SceneModel::bounds)
            .reduce(Bounds::union)
    }
}
