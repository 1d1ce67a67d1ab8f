use glam::Vec3;

use crate::config::TrajectoryConfig;
use crate::error::RenderError;
use crate::render::{EventRenderer, SceneModel};
use crate::source::EventRecord;

const NEUTRAL_PDG: [i32; 6] = [22, 111, 2112, 12, 14, 16];

/// Display color for a particle species; antiparticles share their partner's color.
pub fn pdg_color(pdg: i32) -> [f32; 3] {
    match pdg.abs() {
        11 => [0.95, 0.85, 0.2],
        13 => [0.2, 0.8, 0.95],
        211 => [0.3, 0.9, 0.4],
        2212 => [0.9, 0.3, 0.3],
        22 => [0.7, 0.7, 0.7],
        2112 => [0.5, 0.5, 0.9],
        _ => [0.8, 0.5, 0.9],
    }
}

fn is_neutral(pdg: i32) -> bool {
    NEUTRAL_PDG.contains(&pdg.abs())
}

/// Draws each simulated trajectory as a polyline colored by particle type.
#[derive(Debug, Clone)]
pub struct TrajectoryRenderer {
    config: TrajectoryConfig,
}

impl TrajectoryRenderer {
    pub fn new(config: TrajectoryConfig) -> Self {
        Self { config }
    }
}

impl EventRenderer for TrajectoryRenderer {
    fn name(&self) -> &str {
        "trajectories"
    }

    fn draw_event(&self, record: &EventRecord) -> Result<SceneModel, RenderError> {
        let mut model = SceneModel::new(self.name());
        let min_points = self.config.min_points.max(2);
        for trajectory in &record.data.trajectories {
            if !self.config.show_neutral && is_neutral(trajectory.pdg) {
                continue;
            }
            if trajectory.points.len() < min_points {
                continue;
            }
            let points: Vec<Vec3> = trajectory.points.iter().copied().map(Vec3::from).collect();
            if let Some(bad) = points.iter().find(|point| !point.is_finite()) {
                return Err(RenderError::new(
                    self.name(),
                    format!(
                        "track {} of run {} event {} has non-finite point {bad}",
                        trajectory.track_id, record.data.run, record.data.event
                    ),
                ));
            }
            model.push_polyline(&points, pdg_color(trajectory.pdg));
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::EventMetadata;
    use evd_formats::{EventData, Geometry, Trajectory};
    use std::sync::Arc;

    fn record(trajectories: Vec<Trajectory>) -> EventRecord {
        EventRecord {
            metadata: EventMetadata::new(1, 1, "test.jsonl", false),
            geometry: Arc::new(Geometry::default()),
            data: EventData {
                trajectories,
                ..EventData::empty(1, 1)
            },
        }
    }

    fn track(track_id: i32, pdg: i32, points: usize) -> Trajectory {
        Trajectory {
            track_id,
            parent_id: -1,
            pdg,
            points: (0..points).map(|i| [i as f32, 0.0, 0.0]).collect(),
        }
    }

    #[test]
    fn neutral_particles_hidden_by_default() {
        let renderer = TrajectoryRenderer::new(TrajectoryConfig::default());
        let model = renderer
            .draw_event(&record(vec![track(1, 13, 3), track(2, 22, 5)]))
            .expect("event draws");
        assert_eq!(model.lines.len(), 2);
        assert!(model.lines.iter().all(|line| line.color == pdg_color(13)));
    }

    #[test]
    fn neutral_particles_shown_when_enabled() {
        let renderer = TrajectoryRenderer::new(TrajectoryConfig {
            show_neutral: true,
            ..TrajectoryConfig::default()
        });
        let model = renderer
            .draw_event(&record(vec![track(1, 13, 3), track(2, 22, 5)]))
            .expect("event draws");
        assert_eq!(model.lines.len(), 6);
    }

    #[test]
    fn short_tracks_are_skipped() {
        let renderer = TrajectoryRenderer::new(TrajectoryConfig {
            min_points: 4,
            ..TrajectoryConfig::default()
        });
        let model = renderer
            .draw_event(&record(vec![track(1, 11, 3), track(2, -11, 4)]))
            .expect("event draws");
        assert_eq!(model.lines.len(), 3);
    }

    #[test]
    fn non_finite_points_fail_the_render() {
        let mut broken = track(7, 2212, 3);
        broken.points[1] = [f32::NAN, 0.0, 0.0];
        let error = TrajectoryRenderer::new(TrajectoryConfig::default())
            .draw_event(&record(vec![broken]))
            .expect_err("NaN rejected");
        assert!(error.message.contains("track 7"));
    }
}
