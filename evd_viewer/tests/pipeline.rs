use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use evd_formats::{EventData, Geometry, Volume, demo, write_event_file};
use evd_viewer::cache::EventCache;
use evd_viewer::render::{DetectorRenderer, RendererSet};
use evd_viewer::{
    ControlId, DisplayError, EventMetadata, EventRecord, EventSource, EventWindow, FieldId,
    FileListSource, IoState, ReadJob, Session, ViewerConfig,
};
use tempfile::tempdir;

/// Blocks reads until the test hands out permits.
#[derive(Default)]
struct Gate {
    permits: Mutex<usize>,
    ready: Condvar,
}

impl Gate {
    fn release(&self, count: usize) {
        let mut permits = self.permits.lock().expect("gate lock");
        *permits += count;
        self.ready.notify_all();
    }

    fn pass(&self) {
        let mut permits = self.permits.lock().expect("gate lock");
        while *permits == 0 {
            permits = self.ready.wait(permits).expect("gate wait");
        }
        *permits -= 1;
    }
}

/// In-memory source over `(run, event, file)` triples. The cursor moves when a
/// read is reserved; the returned job only sleeps and/or waits on the gate.
#[derive(Clone)]
struct ScriptedSource {
    events: Arc<Vec<(i32, i32, &'static str)>>,
    cursor: usize,
    last_file: Option<&'static str>,
    calls: Arc<AtomicUsize>,
    reopens: Arc<AtomicUsize>,
    fail_on_call: Option<usize>,
    delays: Vec<Duration>,
    gate: Option<Arc<Gate>>,
}

impl ScriptedSource {
    fn new(events: &[(i32, i32, &'static str)]) -> Self {
        Self {
            events: Arc::new(events.to_vec()),
            cursor: 0,
            last_file: None,
            calls: Arc::new(AtomicUsize::new(0)),
            reopens: Arc::new(AtomicUsize::new(0)),
            fail_on_call: None,
            delays: Vec::new(),
            gate: None,
        }
    }

    fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    fn with_delays(mut self, delays: &[u64]) -> Self {
        self.delays = delays.iter().map(|ms| Duration::from_millis(*ms)).collect();
        self
    }

    fn gated(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn reserve(&mut self, index: usize, label: &str) -> ReadJob {
        let (run, event, file) = self.events[index];
        let new_file = self.last_file != Some(file);
        self.last_file = Some(file);
        self.cursor = index + 1;
        let call = self.calls.load(Ordering::SeqCst);
        let delay = self.delays.get(call - 1).copied().unwrap_or_default();
        let gate = self.gate.clone();
        ReadJob::new(label, move || {
            if let Some(gate) = gate {
                gate.pass();
            }
            thread::sleep(delay);
            Ok(EventRecord {
                metadata: EventMetadata::new(run, event, file, new_file),
                geometry: Arc::new(detector()),
                data: EventData::empty(run, event),
            })
        })
    }

    fn take_call(&self) -> usize {
        self.calls.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl EventSource for ScriptedSource {
    fn next(&mut self) -> ReadJob {
        let call = self.take_call();
        if self.fail_on_call == Some(call) || self.cursor >= self.events.len() {
            return ReadJob::ready("next", Err(DisplayError::NoMoreFiles));
        }
        self.reserve(self.cursor, "next")
    }

    fn goto(&mut self, run: i32, event: i32) -> ReadJob {
        let call = self.take_call();
        let found = self
            .events
            .iter()
            .position(|&(r, e, _)| (r, e) == (run, event));
        match found {
            Some(index) if self.fail_on_call != Some(call) => self.reserve(index, "goto"),
            _ => ReadJob::ready("goto", Err(DisplayError::EventNotFound { run, event })),
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }

    fn reopen(&self) -> Option<Box<dyn EventSource>> {
        self.reopens.fetch_add(1, Ordering::SeqCst);
        let mut fresh = self.clone();
        fresh.cursor = 0;
        fresh.last_file = None;
        Some(Box::new(fresh))
    }

    fn resume_after(&mut self, displayed: &EventMetadata) {
        let found = self
            .events
            .iter()
            .position(|&(r, e, _)| (r, e) == displayed.key());
        if let Some(index) = found {
            self.cursor = index + 1;
            self.last_file = Some(self.events[index].2);
        }
    }
}

fn detector() -> Geometry {
    Geometry {
        name: "box".to_string(),
        volumes: vec![Volume::new("tpc", [-1.0; 3], [1.0; 3])],
    }
}

fn renderers() -> Arc<RendererSet> {
    Arc::new(RendererSet::new(DetectorRenderer))
}

fn config(capacity: usize) -> ViewerConfig {
    ViewerConfig {
        max_event_cache_size: capacity,
        ..ViewerConfig::default()
    }
}

fn session(source: ScriptedSource, capacity: usize) -> Session {
    Session::new(EventWindow::new(
        Box::new(source),
        renderers(),
        &config(capacity),
    ))
}

fn frame(session: &mut Session, io: &IoState) {
    session.render(640, 480, io);
    let window = session.window();
    assert!(
        window.event_cache_size() <= window.max_event_cache_size(),
        "cache over capacity in {}",
        session.state().name()
    );
}

fn run_until_idle(session: &mut Session) {
    let deadline = Instant::now() + Duration::from_secs(10);
    let idle = IoState::default();
    loop {
        frame(session, &idle);
        if session.is_idle() {
            return;
        }
        assert!(Instant::now() < deadline, "session never became idle");
        thread::sleep(Duration::from_millis(1));
    }
}

fn click(session: &mut Session, control: ControlId) {
    assert!(session.is_idle(), "commands are issued from the running state");
    frame(session, &IoState::click(control));
    run_until_idle(session);
}

fn jump(session: &mut Session, run: i32, event: i32) {
    assert!(session.is_idle());
    let io = IoState::click(ControlId::Jump)
        .with_field(FieldId::Run, run)
        .with_field(FieldId::Event, event);
    frame(session, &io);
    run_until_idle(session);
}

/// Lets `Running` prefetch until the cache is full and every read finished.
fn fill_cache(session: &mut Session) {
    let deadline = Instant::now() + Duration::from_secs(10);
    let idle = IoState::default();
    loop {
        frame(session, &idle);
        let window = session.window_mut();
        if window.event_cache_size() == window.max_event_cache_size() && window.cache_settled() {
            return;
        }
        assert!(Instant::now() < deadline, "cache never filled");
        thread::sleep(Duration::from_millis(1));
    }
}

fn current(session: &Session) -> Option<(i32, i32)> {
    session.window().current_event().map(EventMetadata::key)
}

#[test]
fn drains_follow_push_order_regardless_of_completion_order() {
    let events: Vec<_> = (1..=5).map(|event| (1, event, "a")).collect();
    let mut source = ScriptedSource::new(&events).with_delays(&[60, 45, 30, 15, 0]);
    let mut cache = EventCache::new(5, renderers());
    for _ in 0..5 {
        assert!(cache.push_next(&mut source, false));
    }
    let drained: Vec<i32> = (0..5)
        .map(|_| cache.drain_front().expect("drain").metadata.event_id)
        .collect();
    assert_eq!(drained, vec![1, 2, 3, 4, 5]);
}

#[test]
fn running_never_exceeds_capacity() {
    let events: Vec<_> = (1..=20).map(|event| (1, event, "a")).collect();
    let mut session = session(ScriptedSource::new(&events), 3);
    run_until_idle(&mut session);
    let idle = IoState::default();
    for _ in 0..40 {
        frame(&mut session, &idle);
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(session.window().event_cache_size(), 3);
    click(&mut session, ControlId::Next);
    assert_eq!(current(&session), Some((1, 2)));
}

#[test]
fn non_sequential_waits_for_in_flight_reads() {
    let gate = Arc::new(Gate::default());
    let events: Vec<_> = (1..=4).map(|event| (1, event, "a")).collect();
    let source = ScriptedSource::new(&events).gated(Arc::clone(&gate));
    let calls = Arc::clone(&source.calls);
    let mut session = session(source, 2);

    gate.release(1);
    run_until_idle(&mut session);
    assert_eq!(current(&session), Some((1, 1)));

    let idle = IoState::default();
    frame(&mut session, &idle);
    frame(&mut session, &idle);
    assert_eq!(calls.load(Ordering::SeqCst), 2, "one push behind a pending read");

    let io = IoState::click(ControlId::Jump)
        .with_field(FieldId::Run, 1)
        .with_field(FieldId::Event, 3);
    frame(&mut session, &io);
    for _ in 0..10 {
        frame(&mut session, &idle);
        assert_eq!(session.state().name(), "Goto");
        assert!(
            !session
                .last_frame()
                .has_enabled_button(ControlId::Next)
        );
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(session.window().event_cache_size(), 1);

    gate.release(100);
    run_until_idle(&mut session);
    assert_eq!(current(&session), Some((1, 3)));
}

#[test]
fn third_read_failure_keeps_second_event() {
    let events: Vec<_> = (1..=5).map(|event| (1, event, "a")).collect();
    let source = ScriptedSource::new(&events).failing_on_call(3);
    let mut window = EventWindow::new(Box::new(source), renderers(), &config(1));

    assert_eq!(window.load_next_event().expect("first").key(), (1, 1));
    window.process_event(false);
    assert_eq!(window.load_next_event().expect("second").key(), (1, 2));
    window.process_event(false);
    let error = window.load_next_event().expect_err("third read fails");
    assert!(error.is_missing_event());
    assert_eq!(window.current_event().map(EventMetadata::key), Some((1, 2)));
}

#[test]
fn exhaustion_is_reported_through_render() {
    let events: Vec<_> = (1..=5).map(|event| (1, event, "a")).collect();
    let mut session = session(ScriptedSource::new(&events).failing_on_call(3), 1);
    run_until_idle(&mut session);
    click(&mut session, ControlId::Next);
    assert_eq!(current(&session), Some((1, 2)));

    click(&mut session, ControlId::Next);
    assert_eq!(current(&session), Some((1, 2)));
    frame(&mut session, &IoState::default());
    let status = session.window().status().expect("failure reported");
    assert!(status.is_error());
    assert_eq!(status.text(), "no more files to read");
    assert!(session.last_frame().has_enabled_button(ControlId::Next));

    // The failed read did not move the cursor.
    click(&mut session, ControlId::Next);
    assert_eq!(current(&session), Some((1, 3)));
    assert!(session.window().status().is_none());
}

#[test]
fn clearing_twice_equals_clearing_once() {
    let events: Vec<_> = (1..=5).map(|event| (1, event, "a")).collect();
    let mut session = session(ScriptedSource::new(&events), 3);
    run_until_idle(&mut session);
    frame(&mut session, &IoState::default());
    assert_eq!(session.window().event_cache_size(), 1);

    let window = session.window_mut();
    window.clear_cache();
    let after_once = (
        window.event_cache_size(),
        window.scene().generation(),
        window.current_event().cloned(),
    );
    window.clear_cache();
    let after_twice = (
        window.event_cache_size(),
        window.scene().generation(),
        window.current_event().cloned(),
    );
    assert_eq!(after_once, after_twice);
    assert_eq!(after_once.0, 0);
    assert_eq!(window.scene().event_layers().len(), 0);
}

#[test]
fn sequential_playback_refreshes_geometry_per_file() {
    let source = ScriptedSource::new(&[(1, 1, "a"), (1, 2, "a"), (2, 1, "b")]);
    let mut session = session(source, 2);
    let mut shown = Vec::new();
    let mut refreshes = Vec::new();

    run_until_idle(&mut session);
    shown.push(session.window().current_event().cloned().expect("first"));
    refreshes.push(session.window().scene().geometry_refreshes());
    for _ in 0..2 {
        click(&mut session, ControlId::Next);
        shown.push(session.window().current_event().cloned().expect("next"));
        refreshes.push(session.window().scene().geometry_refreshes());
    }

    let tuples: Vec<_> = shown
        .iter()
        .map(|metadata| (metadata.run_id, metadata.event_id, metadata.new_file))
        .collect();
    assert_eq!(tuples, vec![(1, 1, true), (1, 2, false), (2, 1, true)]);
    assert_eq!(refreshes, vec![1, 1, 2]);
}

#[test]
fn goto_then_next_resumes_after_target() {
    let mut events: Vec<_> = (1..=3).map(|event| (1, event, "run1")).collect();
    events.extend((1..=8).map(|event| (2, event, "run2")));
    let mut session = session(ScriptedSource::new(&events), 3);
    run_until_idle(&mut session);
    assert_eq!(current(&session), Some((1, 1)));

    jump(&mut session, 2, 5);
    assert_eq!(current(&session), Some((2, 5)));
    assert!(session.window().event_cache_size() <= 1);

    click(&mut session, ControlId::Next);
    assert_eq!(current(&session), Some((2, 6)));
}

#[test]
fn goto_missing_event_keeps_display() {
    let events: Vec<_> = (1..=8).map(|event| (1, event, "a")).collect();
    let mut session = session(ScriptedSource::new(&events), 4);
    run_until_idle(&mut session);
    fill_cache(&mut session);

    jump(&mut session, 7, 7);
    assert_eq!(current(&session), Some((1, 1)));
    let status = session.window().status().expect("seek failure reported");
    assert_eq!(status.text(), "run 7 event 7 not found");

    // Reads abandoned by the jump are not skipped.
    click(&mut session, ControlId::Next);
    assert_eq!(current(&session), Some((1, 2)));
}

#[test]
fn goto_across_files_after_abandoned_prefetches() {
    let dir = tempdir().expect("temp dir");
    let first = dir.path().join("a.jsonl");
    let second = dir.path().join("b.jsonl");
    let single = Geometry {
        name: "single".to_string(),
        volumes: vec![Volume::new("tpc", [-1.0; 3], [1.0; 3])],
    };
    let double = Geometry {
        name: "double".to_string(),
        volumes: vec![
            Volume::new("tpc", [-1.0; 3], [1.0; 3]),
            Volume::new("veto", [-3.0; 3], [3.0; 3]),
        ],
    };
    write_event_file(&first, &single, &demo::synthetic_events(1, 2)).expect("write first");
    write_event_file(&second, &double, &demo::synthetic_events(2, 6)).expect("write second");

    let window = EventWindow::new(
        Box::new(FileListSource::open(vec![first, second])),
        renderers(),
        &config(4),
    );
    let mut session = Session::new(window);
    let geometry_lines =
        |session: &Session| session.window().scene().geometry().map(|model| model.lines.len());

    run_until_idle(&mut session);
    assert_eq!(current(&session), Some((1, 1)));
    assert_eq!(geometry_lines(&session), Some(12));

    // (1,2) and the first events of b.jsonl are prefetched, then abandoned.
    fill_cache(&mut session);
    jump(&mut session, 2, 5);
    let shown = session.window().current_event().cloned().expect("jump target");
    assert_eq!(shown.key(), (2, 5));
    assert!(shown.new_file);
    assert_eq!(geometry_lines(&session), Some(24));
    assert_eq!(session.window().scene().geometry_refreshes(), 2);

    fill_cache(&mut session);
    jump(&mut session, 9, 9);
    assert_eq!(current(&session), Some((2, 5)));
    click(&mut session, ControlId::Next);
    assert_eq!(current(&session), Some((2, 6)));
    assert_eq!(session.window().scene().geometry_refreshes(), 2);
}

#[test]
fn reload_refetches_current_event_with_geometry() {
    let events: Vec<_> = (1..=4).map(|event| (1, event, "a")).collect();
    let source = ScriptedSource::new(&events);
    let reopens = Arc::clone(&source.reopens);
    let mut session = session(source, 2);
    run_until_idle(&mut session);
    click(&mut session, ControlId::Next);
    assert_eq!(current(&session), Some((1, 2)));
    let refreshes = session.window().scene().geometry_refreshes();
    let commits = session.window().committed_events();

    click(&mut session, ControlId::Reload);
    assert_eq!(current(&session), Some((1, 2)));
    assert_eq!(reopens.load(Ordering::SeqCst), 1);
    assert_eq!(session.window().committed_events(), commits + 1);
    assert_eq!(session.window().scene().geometry_refreshes(), refreshes + 1);

    click(&mut session, ControlId::Next);
    assert_eq!(current(&session), Some((1, 3)));
}

#[test]
fn dropped_file_switches_source() {
    let mut session = Session::new(
        EventWindow::new(
            Box::new(ScriptedSource::new(&[(1, 1, "a"), (1, 2, "a")])),
            renderers(),
            &config(2),
        )
        .with_opener(Box::new(|_path: &Path| -> Box<dyn EventSource> {
            Box::new(ScriptedSource::new(&[(9, 1, "other"), (9, 2, "other")]))
        })),
    );
    run_until_idle(&mut session);
    let refreshes = session.window().scene().geometry_refreshes();

    frame(&mut session, &IoState::dropped("/data/other.jsonl"));
    run_until_idle(&mut session);
    let shown = session.window().current_event().cloned().expect("new file event");
    assert_eq!(shown.key(), (9, 1));
    assert!(shown.new_file);
    assert_eq!(session.window().scene().geometry_refreshes(), refreshes + 1);
}

#[test]
fn file_chooser_opens_picked_file() {
    let dir = tempdir().expect("temp dir");
    let first = dir.path().join("a_first.jsonl");
    let second = dir.path().join("b_second.jsonl");
    write_event_file(&first, &demo::demo_geometry(), &demo::synthetic_events(1, 2))
        .expect("write first");
    write_event_file(&second, &demo::demo_geometry(), &demo::synthetic_events(4, 2))
        .expect("write second");

    let config = ViewerConfig {
        chooser_root: Some(dir.path().to_path_buf()),
        ..config(2)
    };
    let window = EventWindow::new(
        Box::new(FileListSource::open(vec![first])),
        Arc::new(RendererSet::from_config(&config)),
        &config,
    );
    let mut session = Session::new(window);
    run_until_idle(&mut session);
    assert_eq!(current(&session), Some((1, 1)));

    frame(&mut session, &IoState::click(ControlId::ChooseFile));
    assert!(!session.is_idle());
    frame(&mut session, &IoState::default());
    assert!(session.last_frame().has_enabled_button(ControlId::ChooserEntry(1)));
    assert!(!session.last_frame().has_enabled_button(ControlId::Next));

    frame(&mut session, &IoState::click(ControlId::ChooserEntry(1)));
    run_until_idle(&mut session);
    assert_eq!(current(&session), Some((4, 1)));
    assert!(session.window().scene().line_count() > 0);
}
