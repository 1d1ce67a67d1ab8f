//! Deterministic synthetic detector and events for trying the viewer without
//! simulation output.

use crate::model::{EventData, Geometry, Hit, Trajectory, Volume};

const PDG_CHOICES: [i32; 6] = [13, -13, 11, 2212, 211, 22];
const STEPS_PER_TRACK: usize = 24;

pub fn demo_geometry() -> Geometry {
    Geometry {
        name: "demo-detector".to_string(),
        volumes: vec![
            Volume::new("world", [-400.0, -400.0, -400.0], [400.0, 400.0, 400.0]).hidden(),
            Volume::new("tpc", [-150.0, -150.0, -250.0], [150.0, 150.0, 250.0])
                .with_color([0.45, 0.55, 0.75]),
            Volume::new("ecal_top", [-200.0, 160.0, -260.0], [200.0, 200.0, 260.0])
                .with_color([0.7, 0.6, 0.3]),
            Volume::new("ecal_bottom", [-200.0, -200.0, -260.0], [200.0, -160.0, 260.0])
                .with_color([0.7, 0.6, 0.3]),
        ],
    }
}

/// Builds `count` events numbered from 1 for the given run.
pub fn synthetic_events(run: i32, count: usize) -> Vec<EventData> {
    (1..=count as i32)
        .map(|event| synthetic_event(run, event))
        .collect()
}

pub fn synthetic_event(run: i32, event: i32) -> EventData {
    let mut rng = XorShift::new(((run as u64) << 32) ^ (event as u64) ^ 0x9e37_79b9_7f4a_7c15);
    let track_count = 3 + (rng.next_u64() % 5) as i32;

    let mut trajectories = Vec::with_capacity(track_count as usize);
    let mut hits = Vec::new();
    for track_id in 1..=track_count {
        let pdg = PDG_CHOICES[(rng.next_u64() % PDG_CHOICES.len() as u64) as usize];
        let theta = rng.unit() * std::f32::consts::TAU;
        let dip = (rng.unit() - 0.5) * 1.2;
        let radius = 40.0 + rng.unit() * 160.0;
        let curl = if pdg < 0 { -1.0 } else { 1.0 };

        let mut points = Vec::with_capacity(STEPS_PER_TRACK);
        for step in 0..STEPS_PER_TRACK {
            let t = step as f32 / STEPS_PER_TRACK as f32;
            let phase = theta + curl * t * 1.5;
            let point = [
                radius * t * phase.cos(),
                radius * t * phase.sin(),
                240.0 * t * dip,
            ];
            if pdg != 22 && step % 3 == 0 {
                hits.push(Hit {
                    position: point,
                    energy: 0.2 + rng.unit() * 2.5,
                    track_id: Some(track_id),
                });
            }
            points.push(point);
        }

        trajectories.push(Trajectory {
            track_id,
            parent_id: if track_id == 1 { -1 } else { 1 },
            pdg,
            points,
        });
    }

    EventData {
        run,
        event,
        trajectories,
        hits,
    }
}

struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn unit(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }
}
