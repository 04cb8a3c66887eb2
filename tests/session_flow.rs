//! Integration tests for the conversion session.
//!
//! Every timer-driven test runs with a paused Tokio clock, so a full run
//! (4.8 s of simulated progress) completes instantly and deterministically.
//!
//! Run with:
//!   cargo test --test session_flow

use convsim::{
    ArtifactRegistry, ConversionOptions, ConversionSession, ConvertError, ConvertedArtifact, ObserverHandle,
    ProgressSchedule, ProgressTick, Quality, SelectOutcome, SelectedFile, SessionConfig, SessionEvent,
    SessionObserver, SessionState, StartOutcome, ValidationError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_test::{assert_err, assert_ok};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// One entry per observer callback, in call order.
#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Rejected(&'static str),
    Ready(String),
    Cleared,
    Started(String),
    Progress(u8, Instant),
    Completed(String, Instant),
}

#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<Seen>>,
}

impl Recorder {
    fn events(&self) -> Vec<Seen> {
        self.log.lock().unwrap().clone()
    }

    fn percentages(&self) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Seen::Progress(p, _) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Seen) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    fn push(&self, e: Seen) {
        self.log.lock().unwrap().push(e);
    }
}

impl SessionObserver for Recorder {
    fn on_validation_rejected(&self, error: &ValidationError) {
        self.push(Seen::Rejected(error.reason()));
    }

    fn on_file_ready(&self, file: &SelectedFile) {
        self.push(Seen::Ready(file.name.clone()));
    }

    fn on_cleared(&self) {
        self.push(Seen::Cleared);
    }

    fn on_conversion_started(&self, options: &ConversionOptions) {
        self.push(Seen::Started(options.target_format.clone()));
    }

    fn on_progress(&self, tick: &ProgressTick) {
        self.push(Seen::Progress(tick.percentage, Instant::now()));
    }

    fn on_conversion_completed(&self, artifact: &ConvertedArtifact) {
        self.push(Seen::Completed(artifact.suggested_file_name.clone(), Instant::now()));
    }
}

fn session_with(recorder: &Arc<Recorder>, schedule: ProgressSchedule) -> ConversionSession {
    let config = SessionConfig::builder()
        .schedule(schedule)
        .observer(Arc::clone(recorder) as ObserverHandle)
        .build()
        .unwrap();
    ConversionSession::new(config)
}

fn video(name: &str) -> SelectedFile {
    SelectedFile::new(name, 5 * 1024 * 1024, "video/mp4")
}

fn gif() -> ConversionOptions {
    ConversionOptions::builder()
        .target_format("gif")
        .quality(Quality::High)
        .target_size("720p")
        .build()
        .unwrap()
}

// ── Intake ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn rejection_leaves_state_and_reports_reason() {
    let rec = Arc::new(Recorder::default());
    let mut s = session_with(&rec, ProgressSchedule::default());

    let out = assert_ok!(s.select_file(Some(SelectedFile::new(
        "huge.bin",
        600 * 1024 * 1024,
        "chemical/x-pdb"
    ))));
    assert!(matches!(out, SelectOutcome::Rejected(ValidationError::TooLarge { .. })));
    assert_eq!(s.state(), SessionState::Empty);

    let out = assert_ok!(s.select_file(None));
    assert_eq!(out, SelectOutcome::Rejected(ValidationError::NoFile));

    assert_eq!(
        rec.events(),
        vec![Seen::Rejected("too-large"), Seen::Rejected("no-file")]
    );
}

#[tokio::test]
async fn empty_mime_is_accepted() {
    let rec = Arc::new(Recorder::default());
    let mut s = session_with(&rec, ProgressSchedule::default());

    let out = assert_ok!(s.select_file(Some(SelectedFile::new("mystery", 10, ""))));
    assert!(out.is_accepted());
    assert_eq!(s.state(), SessionState::FileSelected);
    assert_eq!(rec.events(), vec![Seen::Ready("mystery".into())]);
}

// ── Full runs ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn stepped_run_is_monotonic_and_completes_after_last_tick() {
    let rec = Arc::new(Recorder::default());
    let mut s = session_with(&rec, ProgressSchedule::default());

    assert_ok!(s.select_file(Some(video("video.mp4"))));
    let started = Instant::now();
    let outcome = assert_ok!(s.start_conversion(&gif()));
    assert_eq!(outcome, StartOutcome::Started { run_id: 1 });
    assert_eq!(s.state(), SessionState::Converting);

    let end = assert_ok!(s.run_until_settled().await);
    assert_eq!(end, SessionState::Completed);
    assert!(started.elapsed() >= Duration::from_millis(4800));

    assert_eq!(rec.percentages(), vec![10, 30, 60, 80, 95, 100]);

    let events = rec.events();
    let last_tick = events
        .iter()
        .rev()
        .find_map(|e| match e {
            Seen::Progress(100, at) => Some(*at),
            _ => None,
        })
        .unwrap();
    match events.last().unwrap() {
        Seen::Completed(name, at) => {
            assert_eq!(name, "video_converted.gif");
            assert!(*at >= last_tick);
        }
        other => panic!("expected completion last, got {other:?}"),
    }

    let artifact = s.artifact().unwrap();
    assert_eq!(artifact.suggested_file_name, "video_converted.gif");
    assert_eq!(artifact.options, gif());
    assert_eq!(s.live_artifacts(), 1);
}

#[tokio::test(start_paused = true)]
async fn smooth_run_reaches_100_once() {
    let rec = Arc::new(Recorder::default());
    let mut s = session_with(&rec, ProgressSchedule::smooth());

    assert_ok!(s.select_file(Some(video("clip.mov"))));
    assert_ok!(s.start_conversion(&ConversionOptions::default()));
    assert_eq!(assert_ok!(s.run_until_settled().await), SessionState::Completed);

    let pcts = rec.percentages();
    assert!(pcts.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(pcts.iter().filter(|&&p| p == 100).count(), 1);
    assert_eq!(pcts.last(), Some(&100));
    assert_eq!(s.artifact().unwrap().suggested_file_name, "clip_converted.mp4");
}

#[tokio::test(start_paused = true)]
async fn double_start_runs_once() {
    let rec = Arc::new(Recorder::default());
    let mut s = session_with(&rec, ProgressSchedule::default());

    assert_ok!(s.select_file(Some(video("video.mp4"))));
    assert_ok!(s.start_conversion(&gif()));
    let second = assert_ok!(s.start_conversion(&ConversionOptions::default()));
    assert_eq!(second, StartOutcome::AlreadyConverting);

    assert_ok!(s.run_until_settled().await);
    // Give any stray task time to deliver.
    sleep(Duration::from_secs(10)).await;
    assert!(assert_ok!(s.next_event().await).is_none());

    assert_eq!(rec.count(|e| matches!(e, Seen::Started(_))), 1);
    assert_eq!(rec.count(|e| matches!(e, Seen::Completed(..))), 1);
    assert_eq!(rec.percentages().len(), 6);
    // The first snapshot wins.
    assert_eq!(s.options().unwrap().target_format, "gif");
}

#[tokio::test(start_paused = true)]
async fn next_event_reports_each_step() {
    let rec = Arc::new(Recorder::default());
    let mut s = session_with(&rec, ProgressSchedule::default());

    assert_ok!(s.select_file(Some(video("a.mp4"))));
    assert_ok!(s.start_conversion(&gif()));

    let mut seen = Vec::new();
    while let Some(event) = assert_ok!(s.next_event().await) {
        seen.push(event);
    }

    assert_eq!(seen.len(), 7);
    assert!(matches!(&seen[0], SessionEvent::Progress(t) if t.percentage == 10));
    assert!(matches!(&seen[5], SessionEvent::Progress(t) if t.is_terminal()));
    assert_eq!(seen[6], SessionEvent::Completed);
}

// ── Cancellation and cleanup ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn remove_mid_run_cancels_further_ticks() {
    let rec = Arc::new(Recorder::default());
    let mut s = session_with(&rec, ProgressSchedule::default());

    assert_ok!(s.select_file(Some(video("a.mp4"))));
    assert_ok!(s.start_conversion(&gif()));
    assert_ok!(s.next_event().await);
    assert_ok!(s.next_event().await);
    assert_eq!(rec.percentages(), vec![10, 30]);

    assert_ok!(s.remove_file());
    assert_eq!(s.state(), SessionState::Empty);
    assert!(s.selected_file().is_none());

    sleep(Duration::from_secs(10)).await;
    assert!(assert_ok!(s.next_event().await).is_none());
    assert_eq!(rec.percentages(), vec![10, 30]);
    assert_eq!(rec.count(|e| matches!(e, Seen::Completed(..))), 0);
    assert_eq!(rec.events().last(), Some(&Seen::Cleared));
    assert!(s.artifact().is_none());
    assert_eq!(s.live_artifacts(), 0);
}

#[tokio::test(start_paused = true)]
async fn queued_ticks_of_a_cancelled_run_are_dropped() {
    let rec = Arc::new(Recorder::default());
    let mut s = session_with(&rec, ProgressSchedule::default());

    assert_ok!(s.select_file(Some(video("a.mp4"))));
    assert_ok!(s.start_conversion(&gif()));
    assert_ok!(s.next_event().await);

    // Let run 1's 30% and 60% ticks queue up without pumping them.
    sleep(Duration::from_millis(1700)).await;

    assert_ok!(s.remove_file());
    assert_ok!(s.select_file(Some(video("b.mp4"))));
    let outcome = assert_ok!(s.start_conversion(&gif()));
    assert_eq!(outcome, StartOutcome::Started { run_id: 2 });

    let first = assert_ok!(s.next_event().await);
    assert!(
        matches!(&first, Some(SessionEvent::Progress(t)) if t.percentage == 10),
        "got {first:?}"
    );
    assert_eq!(rec.percentages(), vec![10, 10]);

    assert_eq!(assert_ok!(s.run_until_settled().await), SessionState::Completed);
    assert_eq!(rec.percentages(), vec![10, 10, 30, 60, 80, 95, 100]);
    assert_eq!(s.artifact().unwrap().suggested_file_name, "b_converted.gif");
}

#[tokio::test(start_paused = true)]
async fn remove_after_completion_discards_artifact() {
    let rec = Arc::new(Recorder::default());
    let mut s = session_with(&rec, ProgressSchedule::default());

    assert_ok!(s.select_file(Some(video("a.mp4"))));
    assert_ok!(s.start_conversion(&gif()));
    assert_ok!(s.run_until_settled().await);
    assert_eq!(s.live_artifacts(), 1);

    assert_ok!(s.remove_file());
    assert_eq!(s.state(), SessionState::Empty);
    assert!(s.artifact().is_none());
    assert!(s.options().is_none());
    assert_eq!(s.live_artifacts(), 0);
}

#[tokio::test(start_paused = true)]
async fn reconvert_releases_previous_artifact() {
    let rec = Arc::new(Recorder::default());
    let mut s = session_with(&rec, ProgressSchedule::default());

    assert_ok!(s.select_file(Some(video("a.mp4"))));
    assert_ok!(s.start_conversion(&gif()));
    assert_ok!(s.run_until_settled().await);
    assert_eq!(s.live_artifacts(), 1);

    let webm = ConversionOptions::builder().target_format("webm").build().unwrap();
    let outcome = assert_ok!(s.start_conversion(&webm));
    assert_eq!(outcome, StartOutcome::Started { run_id: 2 });
    assert!(s.artifact().is_none());
    assert_eq!(s.live_artifacts(), 0);

    assert_ok!(s.run_until_settled().await);
    assert_eq!(s.artifact().unwrap().suggested_file_name, "a_converted.webm");
    assert_eq!(s.live_artifacts(), 1);
}

#[tokio::test(start_paused = true)]
async fn reselect_after_completion_releases_artifact() {
    let rec = Arc::new(Recorder::default());
    let mut s = session_with(&rec, ProgressSchedule::default());

    assert_ok!(s.select_file(Some(video("a.mp4"))));
    assert_ok!(s.start_conversion(&gif()));
    assert_ok!(s.run_until_settled().await);

    assert_ok!(s.select_file(Some(video("b.mp4"))));
    assert_eq!(s.state(), SessionState::FileSelected);
    assert!(s.artifact().is_none());
    assert_eq!(s.live_artifacts(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_session_releases_everything() {
    let rec = Arc::new(Recorder::default());
    let registry = ArtifactRegistry::new();
    let config = SessionConfig::builder()
        .observer(Arc::clone(&rec) as ObserverHandle)
        .build()
        .unwrap();

    let mut s = ConversionSession::with_registry(config.clone(), registry.clone());
    assert_ok!(s.select_file(Some(video("a.mp4"))));
    assert_ok!(s.start_conversion(&gif()));
    assert_ok!(s.run_until_settled().await);
    assert_eq!(registry.live(), 1);
    drop(s);
    assert_eq!(registry.live(), 0);

    // A session dropped mid-run never completes.
    let mut s = ConversionSession::with_registry(config, registry.clone());
    assert_ok!(s.select_file(Some(video("b.mp4"))));
    assert_ok!(s.start_conversion(&gif()));
    drop(s);
    sleep(Duration::from_secs(10)).await;
    assert_eq!(rec.count(|e| matches!(e, Seen::Completed(..))), 1);
    assert_eq!(registry.live(), 0);
}

// ── Misuse ───────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn invalid_transitions_are_errors() {
    let rec = Arc::new(Recorder::default());
    let mut s = session_with(&rec, ProgressSchedule::default());

    assert!(matches!(
        assert_err!(s.start_conversion(&gif())),
        ConvertError::NoFileSelected
    ));
    assert!(matches!(
        assert_err!(s.remove_file()),
        ConvertError::InvalidTransition { state: SessionState::Empty, .. }
    ));

    assert_ok!(s.select_file(Some(video("a.mp4"))));
    assert_ok!(s.start_conversion(&gif()));
    assert!(matches!(
        assert_err!(s.select_file(Some(video("b.mp4")))),
        ConvertError::InvalidTransition { state: SessionState::Converting, .. }
    ));
    assert!(matches!(
        assert_err!(s.on_progress_complete()),
        ConvertError::OutOfOrderCompletion
    ));
    assert_eq!(s.state(), SessionState::Converting);
    assert_eq!(assert_ok!(s.run_until_settled().await), SessionState::Completed);
}

#[tokio::test]
async fn pump_is_idle_without_a_run() {
    let mut s = ConversionSession::new(SessionConfig::default());
    assert!(assert_ok!(s.next_event().await).is_none());
    assert_eq!(assert_ok!(s.run_until_settled().await), SessionState::Empty);
}

// ── Download ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn completed_artifact_writes_under_suggested_name() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("README");
    std::fs::write(&input, b"hello").unwrap();

    let mut s = ConversionSession::new(SessionConfig::default());
    let file = assert_ok!(SelectedFile::from_path(&input).await);
    assert_eq!(file.mime_type, "");
    assert_eq!(file.size_bytes, 5);
    assert!(assert_ok!(s.select_file(Some(file))).is_accepted());

    let txt = ConversionOptions::builder().target_format("txt").build().unwrap();
    assert_ok!(s.start_conversion(&txt));
    assert_ok!(s.run_until_settled().await);

    let out_dir = dir.path().join("out");
    let path = assert_ok!(convsim::write_artifact(s.artifact().unwrap(), &out_dir).await);
    assert_eq!(path, out_dir.join("README_converted.txt"));
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("Original: README"));
    assert!(text.contains("Converted to: TXT"));
}
