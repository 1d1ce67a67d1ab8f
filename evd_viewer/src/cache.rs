//! Bounded FIFO of prefetch tasks.
//!
//! Each push reserves a read on the source synchronously and hands the read
//! plus the renderer passes to a dedicated worker thread. Entries drain in push
//! order. Clearing the cache drops the handles without cancelling the workers:
//! a worker that is already running finishes its read and its result is
//! discarded when the send to the dropped receiver fails.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use crate::error::DisplayError;
use crate::render::{RendererSet, SceneModel};
use crate::source::{EventMetadata, EventSource, ReadJob};

/// Everything a worker prepared for one event.
#[derive(Debug, Clone)]
pub struct PreparedEvent {
    pub metadata: EventMetadata,
    /// Present when the event opened a new file or geometry was forced.
    pub geometry: Option<SceneModel>,
    pub layers: Vec<SceneModel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Pending,
    Ready,
}

type Outcome = Result<PreparedEvent, DisplayError>;

/// Handle to one prefetch task. Readiness can be polled without blocking;
/// the result is taken exactly once by [`PendingEvent::wait`].
#[derive(Debug)]
pub struct PendingEvent {
    label: String,
    receiver: Option<Receiver<Outcome>>,
    outcome: Option<Outcome>,
}

impl PendingEvent {
    fn spawn<F>(label: String, work: F) -> Self
    where
        F: FnOnce() -> Outcome + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("evd-prefetch".to_string())
            .spawn(move || {
                if tx.send(work()).is_err() {
                    log::debug!("prefetch result discarded; entry was cleared");
                }
            });
        match spawned {
            Ok(_) => Self {
                label,
                receiver: Some(rx),
                outcome: None,
            },
            Err(err) => Self::resolved(label, Err(DisplayError::Spawn(err))),
        }
    }

    fn resolved(label: String, outcome: Outcome) -> Self {
        Self {
            label,
            receiver: None,
            outcome: Some(outcome),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Non-blocking readiness check.
    pub fn status(&mut self) -> EventStatus {
        if self.outcome.is_some() {
            return EventStatus::Ready;
        }
        let Some(receiver) = self.receiver.as_ref() else {
            return EventStatus::Ready;
        };
        match receiver.try_recv() {
            Ok(outcome) => {
                self.outcome = Some(outcome);
                self.receiver = None;
                EventStatus::Ready
            }
            Err(TryRecvError::Empty) => EventStatus::Pending,
            Err(TryRecvError::Disconnected) => {
                self.outcome = Some(Err(DisplayError::WorkerLost));
                self.receiver = None;
                EventStatus::Ready
            }
        }
    }

    pub fn is_ready(&mut self) -> bool {
        self.status() == EventStatus::Ready
    }

    /// Blocks until the worker reports, then yields its result.
    pub fn wait(mut self) -> Outcome {
        if let Some(outcome) = self.outcome.take() {
            return outcome;
        }
        match self.receiver.take() {
            Some(receiver) => receiver.recv().unwrap_or(Err(DisplayError::WorkerLost)),
            None => Err(DisplayError::WorkerLost),
        }
    }
}

/// Runs one prefetched read: the source read, then geometry when needed, then
/// every per-event renderer.
fn prepare_event(job: ReadJob, renderers: &RendererSet, force_geometry: bool) -> Outcome {
    let record = job.run()?;
    let geometry = if record.metadata.new_file || force_geometry {
        Some(renderers.draw_geometry(&record)?)
    } else {
        None
    };
    let layers = renderers.draw_event(&record)?;
    Ok(PreparedEvent {
        metadata: record.metadata,
        geometry,
        layers,
    })
}

pub struct EventCache {
    entries: VecDeque<PendingEvent>,
    capacity: usize,
    renderers: Arc<RendererSet>,
}

impl EventCache {
    pub fn new(capacity: usize, renderers: Arc<RendererSet>) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            renderers,
        }
    }

    /// Schedules `source.next()`. Returns false, without touching the source,
    /// when the cache is already full.
    pub fn push_next(&mut self, source: &mut dyn EventSource, force_geometry: bool) -> bool {
        if self.is_full() {
            log::warn!("event cache full ({}); next read not scheduled", self.capacity);
            return false;
        }
        let job = source.next();
        self.schedule(job, force_geometry);
        true
    }

    /// Schedules `source.goto(run, event)`; same capacity rule as `push_next`.
    pub fn push_seek(
        &mut self,
        source: &mut dyn EventSource,
        run: i32,
        event: i32,
        force_geometry: bool,
    ) -> bool {
        if self.is_full() {
            log::warn!(
                "event cache full ({}); seek to run {run} event {event} not scheduled",
                self.capacity
            );
            return false;
        }
        let job = source.goto(run, event);
        self.schedule(job, force_geometry);
        true
    }

    fn schedule(&mut self, job: ReadJob, force_geometry: bool) {
        let label = job.label().to_string();
        log::debug!(
            "prefetch {label} scheduled (force_geometry={force_geometry}, depth {})",
            self.entries.len() + 1
        );
        let renderers = Arc::clone(&self.renderers);
        self.entries.push_back(PendingEvent::spawn(label, move || {
            prepare_event(job, &renderers, force_geometry)
        }));
    }

    pub fn peek_front(&mut self) -> Option<&mut PendingEvent> {
        self.entries.front_mut()
    }

    pub fn peek_back(&mut self) -> Option<&mut PendingEvent> {
        self.entries.back_mut()
    }

    /// Removes the oldest entry, blocking until its worker has finished.
    pub fn drain_front(&mut self) -> Result<PreparedEvent, DisplayError> {
        let entry = self.entries.pop_front().ok_or(DisplayError::CacheEmpty)?;
        log::debug!("draining prefetch {}", entry.label());
        entry.wait()
    }

    /// True when no entry is still running.
    pub fn all_ready(&mut self) -> bool {
        self.entries.iter_mut().all(PendingEvent::is_ready)
    }

    /// Discards every entry, including ones still running. Returns how many
    /// entries were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        if dropped > 0 {
            log::debug!("event cache cleared ({dropped} entries abandoned)");
        }
        self.entries.clear();
        dropped
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::DetectorRenderer;
    use crate::source::EventRecord;
    use evd_formats::{EventData, Geometry};
    use std::sync::mpsc::Sender;
    use std::time::{Duration, Instant};

    /// Counts reads and lets the test decide when each job may finish.
    struct GatedSource {
        reads: i32,
        gates: Vec<Sender<()>>,
    }

    impl GatedSource {
        fn new() -> Self {
            Self {
                reads: 0,
                gates: Vec::new(),
            }
        }

        fn open_gate(&self, index: usize) {
            let _ = self.gates[index].send(());
        }
    }

    impl EventSource for GatedSource {
        fn next(&mut self) -> ReadJob {
            self.reads += 1;
            let event = self.reads;
            let (tx, rx) = mpsc::channel::<()>();
            self.gates.push(tx);
            ReadJob::new("next", move || {
                let _ = rx.recv();
                Ok(EventRecord {
                    metadata: EventMetadata::new(1, event, "gated", event == 1),
                    geometry: Arc::new(Geometry::default()),
                    data: EventData::empty(1, event),
                })
            })
        }

        fn goto(&mut self, run: i32, event: i32) -> ReadJob {
            ReadJob::ready("goto", Err(DisplayError::EventNotFound { run, event }))
        }

        fn describe(&self) -> String {
            "gated".to_string()
        }
    }

    fn cache(capacity: usize) -> EventCache {
        EventCache::new(capacity, Arc::new(RendererSet::new(DetectorRenderer)))
    }

    fn wait_until_ready(entry: &mut PendingEvent) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !entry.is_ready() {
            assert!(Instant::now() < deadline, "prefetch never completed");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn drains_in_push_order_when_completion_is_reversed() {
        let mut source = GatedSource::new();
        let mut cache = cache(3);
        for _ in 0..3 {
            assert!(cache.push_next(&mut source, false));
        }
        source.open_gate(2);
        source.open_gate(1);
        source.open_gate(0);

        let drained: Vec<i32> = (0..3)
            .map(|_| cache.drain_front().expect("drain").metadata.event_id)
            .collect();
        assert_eq!(drained, vec![1, 2, 3]);
        assert!(cache.is_empty());
    }

    #[test]
    fn push_refused_when_full() {
        let mut source = GatedSource::new();
        let mut cache = cache(2);
        assert!(cache.push_next(&mut source, false));
        assert!(cache.push_next(&mut source, false));
        assert!(!cache.push_next(&mut source, false));
        assert_eq!(source.reads, 2);
        assert_eq!(cache.size(), 2);
        assert_eq!(cache.capacity(), 2);
        for gate in 0..2 {
            source.open_gate(gate);
        }
    }

    #[test]
    fn status_reports_pending_until_worker_finishes() {
        let mut source = GatedSource::new();
        let mut cache = cache(1);
        cache.push_next(&mut source, false);
        assert_eq!(
            cache.peek_front().expect("front").status(),
            EventStatus::Pending
        );
        source.open_gate(0);
        wait_until_ready(cache.peek_front().expect("front"));
        assert!(cache.all_ready());
    }

    #[test]
    fn geometry_built_for_new_file_or_when_forced() {
        let mut source = GatedSource::new();
        let mut cache = cache(3);
        cache.push_next(&mut source, false);
        cache.push_next(&mut source, false);
        cache.push_next(&mut source, true);
        for gate in 0..3 {
            source.open_gate(gate);
        }
        let geometry: Vec<bool> = (0..3)
            .map(|_| cache.drain_front().expect("drain").geometry.is_some())
            .collect();
        assert_eq!(geometry, vec![true, false, true]);
    }

    #[test]
    fn clear_abandons_running_work() {
        let mut source = GatedSource::new();
        let mut cache = cache(2);
        cache.push_next(&mut source, false);
        cache.push_next(&mut source, false);
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.clear(), 0);
        assert!(cache.is_empty());
        source.open_gate(0);
        source.open_gate(1);
        assert!(matches!(cache.drain_front(), Err(DisplayError::CacheEmpty)));
    }

    #[test]
    fn read_failure_surfaces_at_drain() {
        let mut source = GatedSource::new();
        let mut cache = cache(1);
        assert!(cache.push_seek(&mut source, 8, 9, false));
        let error = cache.drain_front().expect_err("seek fails");
        assert!(matches!(error, DisplayError::EventNotFound { run: 8, event: 9 }));
    }
}
