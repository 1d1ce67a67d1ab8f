use glam::Vec3;

use crate::config::HitConfig;
use crate::error::RenderError;
use crate::render::{EventRenderer, SceneModel};
use crate::source::EventRecord;

const LOW_ENERGY_COLOR: [f32; 3] = [0.25, 0.45, 1.0];
const HIGH_ENERGY_COLOR: [f32; 3] = [1.0, 0.35, 0.2];

/// Draws energy deposits as markers sized and tinted by deposited energy.
#[derive(Debug, Clone)]
pub struct HitRenderer {
    config: HitConfig,
}

impl HitRenderer {
    pub fn new(config: HitConfig) -> Self {
        Self { config }
    }
}

impl EventRenderer for HitRenderer {
    fn name(&self) -> &str {
        "hits"
    }

    fn draw_event(&self, record: &EventRecord) -> Result<SceneModel, RenderError> {
        let mut model = SceneModel::new(self.name());
        let visible: Vec<_> = record
            .data
            .hits
            .iter()
            .filter(|hit| hit.energy >= self.config.energy_threshold)
            .collect();
        let peak = visible
            .iter()
            .map(|hit| hit.energy)
            .fold(0.0f32, f32::max);

        for hit in visible {
            if !hit.energy.is_finite() {
                return Err(RenderError::new(
                    self.name(),
                    format!(
                        "hit with non-finite energy in run {} event {}",
                        record.data.run, record.data.event
                    ),
                ));
            }
            let fraction = if peak > 0.0 { hit.energy / peak } else { 0.0 };
            let color = mix(LOW_ENERGY_COLOR, HIGH_ENERGY_COLOR, fraction);
            let size = (1.0 + hit.energy.max(0.0).sqrt()) * self.config.scale;
            model.push_marker(Vec3::from(hit.position), size, color);
        }
        Ok(model)
    }
}

fn mix(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    let t = t.clamp(0.0, 1.0);
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}
