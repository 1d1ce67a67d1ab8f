use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_EVENT_CACHE_SIZE: usize = 4;

/// Viewer settings loaded from an optional JSON file; every field has a
/// default so partial files are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub max_event_cache_size: usize,
    pub chooser_root: Option<PathBuf>,
    pub print_dir: PathBuf,
    pub trajectories: TrajectoryConfig,
    pub hits: HitConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            max_event_cache_size: DEFAULT_EVENT_CACHE_SIZE,
            chooser_root: None,
            print_dir: PathBuf::from("."),
            trajectories: TrajectoryConfig::default(),
            hits: HitConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Cache capacity actually used; a zero capacity would never prefetch.
    pub fn cache_capacity(&self) -> usize {
        self.max_event_cache_size.max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    pub enabled: bool,
    pub show_neutral: bool,
    pub min_points: usize,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            show_neutral: false,
            min_points: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HitConfig {
    pub enabled: bool,
    pub energy_threshold: f32,
    pub scale: f32,
}

impl Default for HitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            energy_threshold: 0.0,
            scale: 1.0,
        }
    }
}

pub fn load_config(path: &Path) -> Result<ViewerConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    let config: ViewerConfig = serde_json::from_str(&data)
        .with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}
