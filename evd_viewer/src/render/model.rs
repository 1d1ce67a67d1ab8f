use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub start: Vec3,
    pub end: Vec3,
    pub color: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub position: Vec3,
    pub size: f32,
    pub color: [f32; 3],
}

/// Axis-aligned bounds of a set of scene primitives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn around(point: Vec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    pub fn include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }
}

/// CPU-side primitives produced by one renderer for one event (or file).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneModel {
    pub layer: String,
    pub lines: Vec<LineSegment>,
    pub markers: Vec<Marker>,
}

impl SceneModel {
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            lines: Vec::new(),
            markers: Vec::new(),
        }
    }

    pub fn push_line(&mut self, start: Vec3, end: Vec3, color: [f32; 3]) {
        self.lines.push(LineSegment { start, end, color });
    }

    /// Adds consecutive segments through `points`; fewer than two points add nothing.
    pub fn push_polyline(&mut self, points: &[Vec3], color: [f32; 3]) {
        for pair in points.windows(2) {
            self.push_line(pair[0], pair[1], color);
        }
    }

    pub fn push_marker(&mut self, position: Vec3, size: f32, color: [f32; 3]) {
        self.markers.push(Marker {
            position,
            size,
            color,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.markers.is_empty()
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let mut points = self
            .lines
            .iter()
            .flat_map(|line| [line.start, line.end])
            .chain(self.markers.iter().map(|marker| marker.position));
        let mut bounds = Bounds::around(points.next()?);
        for point in points {
            bounds.include(point);
        }
        Some(bounds)
    }
}
