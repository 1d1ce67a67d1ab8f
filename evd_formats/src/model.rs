use serde::{Deserialize, Serialize};

/// Detector description shared by every event of a file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub name: String,
    #[serde(default)]
    pub volumes: Vec<Volume>,
}

/// Axis-aligned detector volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    pub min: [f32; 3],
    pub max: [f32; 3],
    #[serde(default)]
    pub color: Option<[f32; 3]>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Volume {
    pub fn new(name: impl Into<String>, min: [f32; 3], max: [f32; 3]) -> Self {
        Self {
            name: name.into(),
            min,
            max,
            color: None,
            visible: true,
        }
    }

    pub fn with_color(mut self, color: [f32; 3]) -> Self {
        self.color = Some(color);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// The eight box corners, bottom face first (counter-clockwise), then top.
    pub fn corners(&self) -> [[f32; 3]; 8] {
        let [x0, y0, z0] = self.min;
        let [x1, y1, z1] = self.max;
        [
            [x0, y0, z0],
            [x1, y0, z0],
            [x1, y1, z0],
            [x0, y1, z0],
            [x0, y0, z1],
            [x1, y0, z1],
            [x1, y1, z1],
            [x0, y1, z1],
        ]
    }
}

/// Simulated particle path, stored as an ordered list of points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub track_id: i32,
    #[serde(default = "default_parent")]
    pub parent_id: i32,
    pub pdg: i32,
    #[serde(default)]
    pub points: Vec<[f32; 3]>,
}

fn default_parent() -> i32 {
    -1
}

/// Energy deposit in a sensitive volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub position: [f32; 3],
    pub energy: f32,
    #[serde(default)]
    pub track_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub run: i32,
    pub event: i32,
    #[serde(default)]
    pub trajectories: Vec<Trajectory>,
    #[serde(default)]
    pub hits: Vec<Hit>,
}

impl EventData {
    pub fn empty(run: i32, event: i32) -> Self {
        Self {
            run,
            event,
            trajectories: Vec::new(),
            hits: Vec::new(),
        }
    }

    pub fn total_energy(&self) -> f32 {
        self.hits.iter().map(|hit| hit.energy).sum()
    }
}
