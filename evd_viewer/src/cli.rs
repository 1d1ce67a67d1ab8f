use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::{ViewerConfig, load_config};

#[derive(Parser, Debug)]
#[command(about = "Event display with background event prefetching", version)]
pub struct Args {
    /// Event files (.jsonl) to display, read in order
    pub files: Vec<PathBuf>,

    /// Viewer configuration JSON; missing fields keep their defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Maximum number of events prefetched ahead of the display
    #[arg(long)]
    pub cache_size: Option<usize>,

    /// Directory searched by the file chooser
    #[arg(long)]
    pub chooser_root: Option<PathBuf>,

    /// Directory receiving printed PNGs
    #[arg(long)]
    pub print_dir: Option<PathBuf>,

    /// Skip creating a winit window/event loop; drive the session from a script
    #[arg(long)]
    pub headless: bool,

    /// Headless command script, one command per line
    /// (next, goto:RUN:EVENT, reload, open:PATH, print)
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Stop the headless session after this many frames
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Write a synthetic demo event file to the given path and exit
    #[arg(long)]
    pub write_demo: Option<PathBuf>,
}

impl Args {
    /// Loads the optional config file and applies command-line overrides.
    pub fn viewer_config(&self) -> Result<ViewerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ViewerConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut ViewerConfig) {
        if let Some(size) = self.cache_size {
            config.max_event_cache_size = size;
        }
        if let Some(root) = &self.chooser_root {
            config.chooser_root = Some(root.clone());
        }
        if let Some(dir) = &self.print_dir {
            config.print_dir = dir.clone();
        }
    }
}
