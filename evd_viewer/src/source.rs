//! Event sources feeding the prefetch pipeline.
//!
//! A read is split in two halves. Calling `next`/`goto` on a source happens on
//! the foreground thread and only reserves the read's place in the source's
//! order; the returned [`ReadJob`] carries the actual work and is executed by a
//! prefetch worker. [`FileListSource`] keeps its cursor consistent across
//! concurrently running jobs with a ticket turnstile: jobs move the cursor
//! strictly in reservation order and decode their event after leaving the turn.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use evd_formats::{EventData, EventFileIndex, Geometry, display_name};

use crate::error::DisplayError;

/// Identity of one displayable event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMetadata {
    pub event_id: i32,
    pub run_id: i32,
    pub file_name: String,
    pub new_file: bool,
}

impl EventMetadata {
    pub fn new(run_id: i32, event_id: i32, file_name: impl Into<String>, new_file: bool) -> Self {
        Self {
            event_id,
            run_id,
            file_name: file_name.into(),
            new_file,
        }
    }

    pub fn key(&self) -> (i32, i32) {
        (self.run_id, self.event_id)
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run {} event {} ({})",
            self.run_id, self.event_id, self.file_name
        )
    }
}

/// Result of a completed read, handed to the renderers.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub metadata: EventMetadata,
    pub geometry: Arc<Geometry>,
    pub data: EventData,
}

type ReadWork = Box<dyn FnOnce() -> Result<EventRecord, DisplayError> + Send>;

/// Deferred half of a read reserved on an [`EventSource`].
pub struct ReadJob {
    label: String,
    work: ReadWork,
}

impl ReadJob {
    pub fn new<F>(label: impl Into<String>, work: F) -> Self
    where
        F: FnOnce() -> Result<EventRecord, DisplayError> + Send + 'static,
    {
        Self {
            label: label.into(),
            work: Box::new(work),
        }
    }

    /// A job whose outcome is already known.
    pub fn ready(label: impl Into<String>, outcome: Result<EventRecord, DisplayError>) -> Self {
        Self::new(label, move || outcome)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn run(self) -> Result<EventRecord, DisplayError> {
        (self.work)()
    }
}

impl fmt::Debug for ReadJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadJob")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Sequential/random-access reader the window prefetches from.
///
/// `next` and `goto` must return immediately; the source is responsible for
/// making the returned jobs observe its cursor in the order they were
/// reserved, even when they execute concurrently.
pub trait EventSource: Send {
    fn next(&mut self) -> ReadJob;

    fn goto(&mut self, run: i32, event: i32) -> ReadJob;

    /// Short description for status lines.
    fn describe(&self) -> String;

    /// Fresh source over the same inputs, used when reloading.
    fn reopen(&self) -> Option<Box<dyn EventSource>> {
        None
    }

    /// Moves the cursor just past the displayed event, after every read
    /// reserved so far. Called when prefetched reads are abandoned.
    fn resume_after(&mut self, _displayed: &EventMetadata) {}
}

struct TurnState {
    serving: u64,
    abandoned: BTreeSet<u64>,
}

impl TurnState {
    fn advance(&mut self) {
        self.serving += 1;
        while self.abandoned.remove(&self.serving) {
            self.serving += 1;
        }
    }
}

/// Hands out turns in ticket order. Tickets dropped without being used are
/// skipped so a job that never runs cannot stall the ones behind it.
struct Turnstile {
    state: Mutex<TurnState>,
    changed: Condvar,
}

impl Turnstile {
    fn new() -> Self {
        Self {
            state: Mutex::new(TurnState {
                serving: 0,
                abandoned: BTreeSet::new(),
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TurnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_for(&self, number: u64) {
        let mut state = self.lock();
        while state.serving != number {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn finish(&self) {
        self.lock().advance();
        self.changed.notify_all();
    }

    fn abandon(&self, number: u64) {
        let mut state = self.lock();
        if state.serving == number {
            state.advance();
        } else if number > state.serving {
            state.abandoned.insert(number);
        }
        drop(state);
        self.changed.notify_all();
    }
}

struct Ticket {
    number: u64,
    turnstile: Arc<Turnstile>,
    used: bool,
}

impl Ticket {
    /// Blocks until every earlier ticket has finished its turn.
    fn wait(mut self) -> Turn {
        self.used = true;
        self.turnstile.wait_for(self.number);
        Turn {
            turnstile: Arc::clone(&self.turnstile),
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if !self.used {
            self.turnstile.abandon(self.number);
        }
    }
}

struct Turn {
    turnstile: Arc<Turnstile>,
}

impl Drop for Turn {
    fn drop(&mut self) {
        self.turnstile.finish();
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    file: usize,
    entry: usize,
    last_file: Option<usize>,
}

struct Resolved {
    index: Arc<EventFileIndex>,
    entry: usize,
    new_file: bool,
}

impl Resolved {
    fn read(self) -> Result<EventRecord, DisplayError> {
        let data = self
            .index
            .read_event(self.entry)
            .map_err(|err| DisplayError::read(self.index.path(), err))?;
        Ok(EventRecord {
            metadata: EventMetadata::new(
                data.run,
                data.event,
                self.index.file_name(),
                self.new_file,
            ),
            geometry: Arc::clone(self.index.geometry()),
            data,
        })
    }
}

struct CursorState {
    cursor: Cursor,
    indexes: Vec<Option<Arc<EventFileIndex>>>,
}

impl CursorState {
    fn index_for(&mut self, file: usize, path: &Path) -> Result<Arc<EventFileIndex>, DisplayError> {
        if let Some(Some(index)) = self.indexes.get(file) {
            return Ok(Arc::clone(index));
        }
        let index = EventFileIndex::scan(path)
            .map(Arc::new)
            .map_err(|err| DisplayError::read(path, err))?;
        log::debug!("indexed {} ({} events)", path.display(), index.len());
        if let Some(slot) = self.indexes.get_mut(file) {
            *slot = Some(Arc::clone(&index));
        }
        Ok(index)
    }

    fn commit(&mut self, file: usize, entry: usize, index: Arc<EventFileIndex>) -> Resolved {
        let new_file = self.cursor.last_file != Some(file);
        self.cursor = Cursor {
            file,
            entry: entry + 1,
            last_file: Some(file),
        };
        Resolved {
            index,
            entry,
            new_file,
        }
    }

    fn resolve_next(&mut self, paths: &[PathBuf]) -> Result<Resolved, DisplayError> {
        loop {
            let file = self.cursor.file;
            let Some(path) = paths.get(file) else {
                return Err(DisplayError::NoMoreFiles);
            };
            let index = match self.index_for(file, path) {
                Ok(index) => index,
                Err(err) => {
                    self.cursor.file += 1;
                    self.cursor.entry = 0;
                    return Err(err);
                }
            };
            if self.cursor.entry < index.len() {
                let entry = self.cursor.entry;
                return Ok(self.commit(file, entry, index));
            }
            self.cursor.file += 1;
            self.cursor.entry = 0;
        }
    }

    fn resolve_goto(
        &mut self,
        paths: &[PathBuf],
        run: i32,
        event: i32,
    ) -> Result<Resolved, DisplayError> {
        for (file, path) in paths.iter().enumerate() {
            let index = match self.index_for(file, path) {
                Ok(index) => index,
                Err(err) => {
                    log::warn!("skipping unreadable file during seek: {err}");
                    continue;
                }
            };
            if let Some(entry) = index.find(run, event) {
                return Ok(self.commit(file, entry, index));
            }
        }
        Err(DisplayError::EventNotFound { run, event })
    }

    fn resume_after(&mut self, paths: &[PathBuf], run: i32, event: i32, file_name: &str) {
        let preferred = paths
            .iter()
            .enumerate()
            .filter(|(_, path)| display_name(path) == file_name);
        for (file, path) in preferred.chain(paths.iter().enumerate()) {
            let Ok(index) = self.index_for(file, path) else {
                continue;
            };
            if let Some(entry) = index.find(run, event) {
                self.cursor = Cursor {
                    file,
                    entry: entry + 1,
                    last_file: Some(file),
                };
                log::debug!(
                    "cursor resumed after run {run} event {event} in {}",
                    path.display()
                );
                return;
            }
        }
        log::warn!("run {run} event {event} no longer found; cursor left in place");
    }
}

/// Cursor reset waiting for its turn; carried by the next reserved job.
struct ResumeTarget {
    ticket: Ticket,
    run: i32,
    event: i32,
    file_name: String,
}

impl ResumeTarget {
    fn apply(self, shared: &FileListShared) {
        let ResumeTarget {
            ticket,
            run,
            event,
            file_name,
        } = self;
        let _turn = ticket.wait();
        shared
            .lock()
            .resume_after(&shared.paths, run, event, &file_name);
    }
}

struct FileListShared {
    paths: Vec<PathBuf>,
    turnstile: Arc<Turnstile>,
    state: Mutex<CursorState>,
}

impl FileListShared {
    fn lock(&self) -> MutexGuard<'_, CursorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reads events from a list of event files in order, moving on to the next
/// file when one is exhausted.
pub struct FileListSource {
    shared: Arc<FileListShared>,
    next_ticket: u64,
    resume: Option<ResumeTarget>,
}

impl FileListSource {
    pub fn open(paths: Vec<PathBuf>) -> Self {
        let indexes = vec![None; paths.len()];
        Self {
            shared: Arc::new(FileListShared {
                paths,
                turnstile: Arc::new(Turnstile::new()),
                state: Mutex::new(CursorState {
                    cursor: Cursor::default(),
                    indexes,
                }),
            }),
            next_ticket: 0,
            resume: None,
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.shared.paths
    }

    fn take_ticket(&mut self) -> Ticket {
        let number = self.next_ticket;
        self.next_ticket += 1;
        Ticket {
            number,
            turnstile: Arc::clone(&self.shared.turnstile),
            used: false,
        }
    }
}

impl EventSource for FileListSource {
    fn next(&mut self) -> ReadJob {
        let resume = self.resume.take();
        let ticket = self.take_ticket();
        let shared = Arc::clone(&self.shared);
        ReadJob::new("next", move || {
            if let Some(resume) = resume {
                resume.apply(&shared);
            }
            let resolved = {
                let _turn = ticket.wait();
                shared.lock().resolve_next(&shared.paths)
            }?;
            resolved.read()
        })
    }

    fn goto(&mut self, run: i32, event: i32) -> ReadJob {
        let resume = self.resume.take();
        let ticket = self.take_ticket();
        let shared = Arc::clone(&self.shared);
        ReadJob::new(format!("goto {run}:{event}"), move || {
            if let Some(resume) = resume {
                resume.apply(&shared);
            }
            let resolved = {
                let _turn = ticket.wait();
                shared.lock().resolve_goto(&shared.paths, run, event)
            }?;
            resolved.read()
        })
    }

    fn describe(&self) -> String {
        match self.shared.paths.as_slice() {
            [] => "no files".to_string(),
            [only] => display_name(only),
            [first, rest @ ..] => format!("{} (+{} more)", display_name(first), rest.len()),
        }
    }

    fn reopen(&self) -> Option<Box<dyn EventSource>> {
        Some(Box::new(FileListSource::open(self.shared.paths.clone())))
    }

    fn resume_after(&mut self, displayed: &EventMetadata) {
        let ticket = self.take_ticket();
        self.resume = Some(ResumeTarget {
            ticket,
            run: displayed.run_id,
            event: displayed.event_id,
            file_name: displayed.file_name.clone(),
        });
    }
}
