use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use evd_formats::{demo, write_event_file};
use evd_viewer::cli::Args;
use evd_viewer::headless::{HeadlessRunner, load_script};
use evd_viewer::{EventWindow, FileListSource, RendererSet, Session, display};

const DEMO_RUNS: [(i32, usize); 2] = [(1, 3), (2, 5)];

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::init();

    if let Some(path) = &args.write_demo {
        write_demo(path)?;
        println!("wrote demo events to {}", path.display());
        return Ok(());
    }

    ensure!(
        !args.files.is_empty(),
        "no event files given (try --write-demo demo.jsonl first)"
    );
    let config = args.viewer_config().context("loading viewer configuration")?;
    let renderers = Arc::new(RendererSet::from_config(&config));
    log::info!(
        "renderers: {}; cache size {}",
        renderers.names().join(", "),
        config.cache_capacity()
    );

    let source = FileListSource::open(args.files.clone());
    let window = EventWindow::new(Box::new(source), renderers, &config);
    let mut session = Session::new(window);

    if args.headless {
        let script = match &args.script {
            Some(path) => load_script(path)?,
            None => Vec::new(),
        };
        let report = HeadlessRunner::new(args.max_frames).run(&mut session, script);
        log::info!(
            "headless session finished after {} frames: {} events shown, {} errors",
            report.frames,
            report.events.len(),
            report.errors.len()
        );
        return Ok(());
    }

    display::run_windowed(session)
}

fn write_demo(path: &Path) -> Result<()> {
    let geometry = demo::demo_geometry();
    let events: Vec<_> = DEMO_RUNS
        .iter()
        .flat_map(|&(run, count)| demo::synthetic_events(run, count))
        .collect();
    write_event_file(path, &geometry, &events)
        .with_context(|| format!("writing demo file {}", path.display()))
}
