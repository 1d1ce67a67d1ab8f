use glam::Vec3;

use crate::error::RenderError;
use crate::render::{GeometryRenderer, SceneModel};
use crate::source::EventRecord;

const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

const DEFAULT_VOLUME_COLOR: [f32; 3] = [0.55, 0.58, 0.62];

/// Draws every visible detector volume as a wireframe box.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectorRenderer;

impl GeometryRenderer for DetectorRenderer {
    fn name(&self) -> &str {
        "detector"
    }

    fn draw_geometry(&self, record: &EventRecord) -> Result<SceneModel, RenderError> {
        let mut model = SceneModel::new(self.name());
        for volume in record.geometry.volumes.iter().filter(|volume| volume.visible) {
            if volume.min.iter().zip(volume.max.iter()).any(|(lo, hi)| lo > hi) {
                return Err(RenderError::new(
                    self.name(),
                    format!("volume {} has inverted bounds", volume.name),
                ));
            }
            let color = volume.color.unwrap_or(DEFAULT_VOLUME_COLOR);
            let corners = volume.corners().map(Vec3::from);
            for (a, b) in BOX_EDGES {
                model.push_line(corners[a], corners[b], color);
            }
        }
        Ok(model)
    }
}
