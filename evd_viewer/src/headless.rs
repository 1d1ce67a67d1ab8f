//! Scripted host: drives a [`Session`] frame by frame without a window.

use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};

use crate::session::Session;
use crate::source::EventMetadata;
use crate::ui::{ControlId, FieldId, IoState};

pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const HEADLESS_WIDTH: u32 = 1280;
const HEADLESS_HEIGHT: u32 = 720;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Next,
    Goto { run: i32, event: i32 },
    Reload,
    Open(PathBuf),
    Print,
}

impl Command {
    /// The frame input that performs this command from the running state.
    pub fn io(&self) -> IoState {
        match self {
            Command::Next => IoState::click(ControlId::Next),
            Command::Goto { run, event } => IoState::click(ControlId::Jump)
                .with_field(FieldId::Run, *run)
                .with_field(FieldId::Event, *event),
            Command::Reload => IoState::click(ControlId::Reload),
            Command::Open(path) => IoState::dropped(path.clone()),
            Command::Print => IoState::click(ControlId::Print),
        }
    }
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(':') {
            Some((verb, rest)) => (verb, Some(rest)),
            None => (line, None),
        };
        match (verb, rest) {
            ("next", None) => Ok(Command::Next),
            ("reload", None) => Ok(Command::Reload),
            ("print", None) => Ok(Command::Print),
            ("open", Some(path)) if !path.is_empty() => Ok(Command::Open(PathBuf::from(path))),
            ("goto", Some(target)) => {
                let (run, event) = target
                    .split_once(':')
                    .ok_or_else(|| anyhow!("goto expects goto:RUN:EVENT, got {line:?}"))?;
                Ok(Command::Goto {
                    run: run
                        .trim()
                        .parse()
                        .with_context(|| format!("parsing run in {line:?}"))?,
                    event: event
                        .trim()
                        .parse()
                        .with_context(|| format!("parsing event in {line:?}"))?,
                })
            }
            _ => bail!("unknown command {line:?}"),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Next => write!(f, "next"),
            Command::Goto { run, event } => write!(f, "goto:{run}:{event}"),
            Command::Reload => write!(f, "reload"),
            Command::Open(path) => write!(f, "open:{}", path.display()),
            Command::Print => write!(f, "print"),
        }
    }
}

/// Parses a script; blank lines and `#` comments are skipped.
pub fn parse_script(text: &str) -> Result<Vec<Command>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(number, line)| {
            line.parse()
                .with_context(|| format!("script line {}", number + 1))
        })
        .collect()
}

pub fn load_script(path: &Path) -> Result<Vec<Command>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading script {}", path.display()))?;
    parse_script(&text).with_context(|| format!("parsing script {}", path.display()))
}

#[derive(Debug, Default)]
pub struct HeadlessReport {
    pub frames: u64,
    pub events: Vec<EventMetadata>,
    pub errors: Vec<String>,
}

pub struct HeadlessRunner {
    frame_interval: Duration,
    max_frames: Option<u64>,
    echo: bool,
}

impl HeadlessRunner {
    pub fn new(max_frames: Option<u64>) -> Self {
        Self {
            frame_interval: FRAME_INTERVAL,
            max_frames,
            echo: true,
        }
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Disables the per-event stdout lines.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Runs until the script is exhausted and the session is idle, or until
    /// the frame limit is hit.
    pub fn run(&self, session: &mut Session, script: Vec<Command>) -> HeadlessReport {
        let mut pending: VecDeque<Command> = script.into();
        let mut report = HeadlessReport::default();
        let mut seen_commits = session.window().committed_events();
        let mut seen_status = session.window().status().cloned();

        loop {
            if self.max_frames.is_some_and(|limit| report.frames >= limit) {
                log::info!("headless frame limit reached");
                break;
            }
            let io = if session.is_idle() {
                match pending.pop_front() {
                    Some(command) => {
                        log::info!("headless command {command}");
                        command.io()
                    }
                    None => break,
                }
            } else {
                IoState::default()
            };

            session.render(HEADLESS_WIDTH, HEADLESS_HEIGHT, &io);
            report.frames += 1;

            let window = session.window();
            if window.committed_events() != seen_commits {
                seen_commits = window.committed_events();
                if let Some(metadata) = window.current_event() {
                    if self.echo {
                        println!("{metadata}");
                    }
                    report.events.push(metadata.clone());
                }
            }
            let status = window.status().cloned();
            if status != seen_status {
                if let Some(message) = status.as_ref().filter(|message| message.is_error()) {
                    if self.echo {
                        println!("error: {}", message.text());
                    }
                    report.errors.push(message.text().to_string());
                }
                seen_status = status;
            }

            if !self.frame_interval.is_zero() {
                thread::sleep(self.frame_interval);
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_command() {
        let script = parse_script(
            "# warm up\nnext\n\ngoto:2:5\nreload\nopen:/tmp/run 2.jsonl\nprint\n",
        )
        .expect("script parses");
        assert_eq!(
            script,
            vec![
                Command::Next,
                Command::Goto { run: 2, event: 5 },
                Command::Reload,
                Command::Open(PathBuf::from("/tmp/run 2.jsonl")),
                Command::Print,
            ]
        );
    }

    #[test]
    fn reports_bad_line_number() {
        let error = parse_script("next\ngoto:x:1\n").expect_err("bad run");
        assert!(format!("{error:#}").contains("script line 2"));
        assert!("jump".parse::<Command>().is_err());
        assert!("goto:1".parse::<Command>().is_err());
    }

    #[test]
    fn runner_reports_committed_events_and_errors() {
        use crate::config::ViewerConfig;
        use crate::render::RendererSet;
        use crate::source::FileListSource;
        use crate::window::EventWindow;
        use evd_formats::{demo, write_event_file};
        use std::sync::Arc;
        use tempfile::TempDir;

        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("run.jsonl");
        write_event_file(&path, &demo::demo_geometry(), &demo::synthetic_events(3, 4))
            .expect("write events");
        let config = ViewerConfig::default();
        let window = EventWindow::new(
            Box::new(FileListSource::open(vec![path])),
            Arc::new(RendererSet::from_config(&config)),
            &config,
        );
        let mut session = Session::new(window);

        let report = HeadlessRunner::new(Some(10_000))
            .with_frame_interval(Duration::from_millis(1))
            .quiet()
            .run(
                &mut session,
                vec![Command::Next, Command::Goto { run: 3, event: 4 }, Command::Next],
            );
        let shown: Vec<_> = report.events.iter().map(EventMetadata::key).collect();
        assert_eq!(shown, vec![(3, 1), (3, 2), (3, 4)]);
        assert_eq!(report.errors, vec!["no more files to read".to_string()]);
        assert!(session.is_idle());
    }

    #[test]
    fn goto_command_fills_jump_fields() {
        let io = Command::Goto { run: 4, event: 9 }.io();
        assert!(io.clicks.contains(&ControlId::Jump));
        assert_eq!(io.field_edits, vec![(FieldId::Run, 4), (FieldId::Event, 9)]);
        assert_eq!(Command::Goto { run: 4, event: 9 }.to_string(), "goto:4:9");
    }
}
