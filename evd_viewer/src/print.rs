//! PNG export of the displayed scene, projected onto the XY plane.

use std::fs;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use image::{Rgb, RgbImage};

use crate::error::PrintError;
use crate::scene::Scene;

pub const PRINT_WIDTH: u32 = 1024;
pub const PRINT_HEIGHT: u32 = 768;

const BACKGROUND: [u8; 3] = [12, 14, 20];
const MARGIN: f32 = 0.05;

pub fn print_file_name(run: i32, event: i32) -> String {
    format!("evd_run{run}_event{event}.png")
}

/// Writes the scene into `dir` and returns the written path.
pub fn print_scene(scene: &Scene, dir: &Path) -> Result<PathBuf, PrintError> {
    let metadata = scene.event().ok_or(PrintError::NothingDisplayed)?;
    fs::create_dir_all(dir).map_err(|source| PrintError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(print_file_name(metadata.run_id, metadata.event_id));
    let image = rasterize(scene, PRINT_WIDTH, PRINT_HEIGHT);
    image.save(&path).map_err(|source| PrintError::Image {
        path: path.clone(),
        source,
    })?;
    log::info!("printed {} to {}", metadata, path.display());
    Ok(path)
}

/// Maps scene XY onto pixel coordinates, preserving aspect ratio.
struct Projection {
    center: Vec2,
    scale: f32,
    half_size: Vec2,
}

impl Projection {
    fn fit(scene: &Scene, width: u32, height: u32) -> Self {
        let half_size = Vec2::new(width as f32, height as f32) * 0.5;
        let (center, extent) = match scene.bounds() {
            Some(bounds) => (bounds.center().truncate(), bounds.extent().truncate()),
            None => (Vec2::ZERO, Vec2::ONE),
        };
        let usable = half_size * 2.0 * (1.0 - 2.0 * MARGIN);
        let scale_x = if extent.x > 0.0 { usable.x / extent.x } else { f32::INFINITY };
        let scale_y = if extent.y > 0.0 { usable.y / extent.y } else { f32::INFINITY };
        let mut scale = scale_x.min(scale_y);
        if !scale.is_finite() {
            scale = 1.0;
        }
        Self {
            center,
            scale,
            half_size,
        }
    }

    fn project(&self, point: Vec3) -> Vec2 {
        let offset = (point.truncate() - self.center) * self.scale;
        // Image rows grow downwards.
        Vec2::new(self.half_size.x + offset.x, self.half_size.y - offset.y)
    }
}

pub fn rasterize(scene: &Scene, width: u32, height: u32) -> RgbImage {
    let mut image = RgbImage::from_pixel(width, height, Rgb(BACKGROUND));
    let projection = Projection::fit(scene, width, height);
    for model in scene.models() {
        for line in &model.lines {
            draw_line(
                &mut image,
                projection.project(line.start),
                projection.project(line.end),
                to_rgb(line.color),
            );
        }
        for marker in &model.markers {
            let center = projection.project(marker.position);
            let radius = marker.size.max(1.0).round() as i64;
            fill_square(&mut image, center, radius, to_rgb(marker.color));
        }
    }
    image
}

fn to_rgb(color: [f32; 3]) -> Rgb<u8> {
    let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgb([channel(color[0]), channel(color[1]), channel(color[2])])
}

fn put(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u64) < image.width() as u64 && (y as u64) < image.height() as u64 {
        image.put_pixel(x as u32, y as u32, color);
    }
}

fn draw_line(image: &mut RgbImage, from: Vec2, to: Vec2, color: Rgb<u8>) {
    if !(from.is_finite() && to.is_finite()) {
        return;
    }
    let (mut x0, mut y0) = (from.x.round() as i64, from.y.round() as i64);
    let (x1, y1) = (to.x.round() as i64, to.y.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let step_x = if x0 < x1 { 1 } else { -1 };
    let step_y = if y0 < y1 { 1 } else { -1 };
    let mut error = dx + dy;
    loop {
        put(image, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let doubled = 2 * error;
        if doubled >= dy {
            error += dy;
            x0 += step_x;
        }
        if doubled <= dx {
            error += dx;
            y0 += step_y;
        }
    }
}

fn fill_square(image: &mut RgbImage, center: Vec2, radius: i64, color: Rgb<u8>) {
    if !center.is_finite() {
        return;
    }
    let (cx, cy) = (center.x.round() as i64, center.y.round() as i64);
    for y in cy - radius..=cy + radius {
        for x in cx - radius..=cx + radius {
            put(image, x, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SceneModel;
    use crate::source::EventMetadata;
    use tempfile::TempDir;

    fn scene_with_event() -> Scene {
        let mut scene = Scene::new();
        let mut detector = SceneModel::new("detector");
        detector.push_line(Vec3::new(-10.0, -5.0, 0.0), Vec3::new(10.0, 5.0, 0.0), [1.0, 0.0, 0.0]);
        scene.replace_geometry(detector);
        let mut hits = SceneModel::new("hits");
        hits.push_marker(Vec3::ZERO, 2.0, [0.0, 1.0, 0.0]);
        scene.install_event(&EventMetadata::new(3, 14, "demo.jsonl", true), vec![hits]);
        scene
    }

    #[test]
    fn rasterize_draws_lines_and_markers() {
        let image = rasterize(&scene_with_event(), 200, 100);
        let center = image.get_pixel(100, 50);
        assert_eq!(*center, Rgb([0, 255, 0]));
        let red = image.pixels().filter(|pixel| **pixel == Rgb([255, 0, 0])).count();
        assert!(red > 50, "line should cover many pixels, got {red}");
    }

    #[test]
    fn print_names_file_after_event() {
        let dir = TempDir::new().expect("temp dir");
        let out = dir.path().join("prints");
        let path = print_scene(&scene_with_event(), &out).expect("print succeeds");
        assert_eq!(path, out.join("evd_run3_event14.png"));
        assert!(path.exists());
    }

    #[test]
    fn print_without_event_fails() {
        let dir = TempDir::new().expect("temp dir");
        let error = print_scene(&Scene::new(), dir.path()).expect_err("nothing to print");
        assert!(matches!(error, PrintError::NothingDisplayed));
    }
}
