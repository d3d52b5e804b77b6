use log::{info, warn};
use std::collections::HashSet;

use crate::clock::{ClockTick, SessionClock};
use crate::config::Config;
use crate::detection::{
    DetectedObject, DetectionError, DetectionReport, DetectionRequest, DetectionScheduler,
    DetectorPort, FrameSource,
};
use crate::error::{GameError, Resource};
use crate::labels::{LabelTable, UnknownLabels};
use crate::render_loop::{RenderCommand, RenderLoop};
use crate::session::{EndReason, Feedback, GameMode, Session, SessionStatus};
use crate::tracker::{ChallengeTracker, InputVerdict, TargetOutcome};
use crate::word_source::{DetectionSource, ListSource, WordSource};

/// Camera-side collaborators. Absent when no camera could be set up.
pub struct CameraRig {
    pub frames: Box<dyn FrameSource>,
    pub detector: Box<dyn DetectorPort>,
}

impl CameraRig {
    pub fn new(frames: impl FrameSource + 'static, detector: impl DetectorPort + 'static) -> Self {
        Self {
            frames: Box::new(frames),
            detector: Box::new(detector),
        }
    }

    fn check_ready(&self) -> Result<(), GameError> {
        if !self.frames.is_ready() {
            return Err(GameError::ResourceUnavailable(Resource::Camera));
        }
        if !self.detector.is_ready() {
            return Err(GameError::ResourceUnavailable(Resource::Detector));
        }
        Ok(())
    }
}

/// Commands from the input boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start(GameMode),
    Stop,
    Reset,
    /// Typed text so far
    Input(String),
}

/// Updates for the presentation boundary, emitted after each transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Status(String),
    Feedback(Feedback),
    Score(u32),
    Timer(u32),
    Target(Option<String>),
    Ended { score: u32, reason: EndReason },
}

/// Top-level state machine: `Idle -> Running -> Ended -> Idle`.
///
/// Owns the [`Session`] and every component that mutates it. All mutation
/// goes through this type on the host's single control thread.
pub struct GameController {
    config: Config,
    session: Session,
    tracker: ChallengeTracker,
    list_source: ListSource,
    detection_source: DetectionSource,
    scheduler: DetectionScheduler,
    clock: SessionClock,
    render_loop: RenderLoop,
    camera: Option<CameraRig>,
    notices: Vec<Notice>,
}

impl GameController {
    pub fn new(
        config: Config,
        vocabulary: Vec<String>,
        labels: &LabelTable,
        camera: Option<CameraRig>,
    ) -> Self {
        let config = config.sanitized();
        let allowed = match config.unknown_labels {
            UnknownLabels::Raw => None,
            UnknownLabels::Ineligible => {
                Some(labels.vocabulary().into_iter().collect::<HashSet<_>>())
            }
        };

        Self {
            session: Session::new(GameMode::List, config.session_secs),
            tracker: ChallengeTracker::new(),
            list_source: ListSource::new(vocabulary, config.cycle_list),
            detection_source: DetectionSource::new(allowed),
            scheduler: DetectionScheduler::new(
                config.detection_interval_ms,
                config.detection_threshold,
            ),
            clock: SessionClock::new(),
            render_loop: RenderLoop::new(),
            camera,
            notices: Vec::new(),
            config,
        }
    }

    pub fn with_tracker(mut self, tracker: ChallengeTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn vocabulary(&self) -> &[String] {
        self.list_source.vocabulary()
    }

    /// Latest completed detection pass
    pub fn snapshot(&self) -> &[DetectedObject] {
        self.render_loop.snapshot()
    }

    pub fn camera_ready(&self) -> bool {
        self.camera
            .as_ref()
            .is_some_and(|rig| rig.check_ready().is_ok())
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn dispatch(&mut self, command: Command, now_ms: u64) -> Result<(), GameError> {
        match command {
            Command::Start(mode) => self.start(mode, now_ms),
            Command::Stop => self.stop(),
            Command::Reset => {
                self.reset();
                Ok(())
            }
            Command::Input(typed) => {
                self.input(&typed);
                Ok(())
            }
        }
    }

    /// Idle -> Running. Rejected while running or ended, or when Camera mode
    /// lacks its camera or detector.
    pub fn start(&mut self, mode: GameMode, now_ms: u64) -> Result<(), GameError> {
        if self.session.status != SessionStatus::Idle {
            return self.reject(GameError::InvalidTransition {
                action: "start",
                status: self.session.status,
            });
        }
        let ready = match (mode, &self.camera) {
            (GameMode::Camera, Some(rig)) => rig.check_ready(),
            (GameMode::Camera, None) => Err(GameError::ResourceUnavailable(Resource::Camera)),
            (GameMode::List, _) if self.list_source.is_empty() => Err(GameError::EmptyVocabulary),
            (GameMode::List, _) => Ok(()),
        };
        if let Err(err) = ready {
            return self.reject(err);
        }

        info!("starting {mode} session ({}s)", self.config.session_secs);
        self.session.begin(mode, self.config.session_secs);
        self.scheduler.cancel();
        self.clock.start(now_ms);
        self.detection_source.clear();
        self.notices.extend([
            Notice::Score(0),
            Notice::Timer(self.session.remaining_secs),
            Notice::Target(None),
            Notice::Feedback(Feedback::None),
        ]);

        match mode {
            GameMode::Camera => {
                self.render_loop.start();
                self.status("Game on! Type the name of what the camera sees.");
            }
            GameMode::List => {
                self.render_loop.reset();
                self.status("Game on! Type the word shown.");
                self.draw_from_list(true);
            }
        }
        Ok(())
    }

    /// Running -> Ended. Score and answers stay readable until reset.
    pub fn stop(&mut self) -> Result<(), GameError> {
        if !self.session.is_running() {
            return self.reject(GameError::InvalidTransition {
                action: "stop",
                status: self.session.status,
            });
        }
        self.end(EndReason::Stopped);
        Ok(())
    }

    /// Any state -> Idle. Camera readiness is left alone.
    pub fn reset(&mut self) {
        if self.session.is_running() {
            self.end(EndReason::Stopped);
        }
        self.session = Session::new(self.session.mode, self.config.session_secs);
        self.clock.cancel();
        self.scheduler.cancel();
        self.render_loop.reset();
        self.detection_source.clear();
        self.notices.extend([
            Notice::Score(0),
            Notice::Timer(self.session.remaining_secs),
            Notice::Target(None),
            Notice::Feedback(Feedback::None),
        ]);
        self.status("Choose a mode.");
    }

    pub fn input(&mut self, typed: &str) -> InputVerdict {
        let verdict = self.tracker.check_input(&mut self.session, typed);
        match &verdict {
            InputVerdict::Ignored => {}
            InputVerdict::Correct(word) => {
                info!("correct answer {word:?}, score {}", self.session.score);
                self.notices.push(Notice::Score(self.session.score));
                self.notices
                    .push(Notice::Feedback(Feedback::Correct(word.clone())));
                match self.session.mode {
                    GameMode::List => self.draw_from_list(true),
                    GameMode::Camera => self.draw_from_camera(true),
                }
            }
            InputVerdict::Partial => self.notices.push(Notice::Feedback(Feedback::Typing)),
            InputVerdict::Mismatch => self.notices.push(Notice::Feedback(Feedback::Miss)),
        }
        verdict
    }

    /// Countdown callback; the host calls it at any rate, firing is 1 Hz
    pub fn on_clock(&mut self, now_ms: u64) {
        match self.clock.poll(now_ms, &mut self.session) {
            ClockTick::Idle => {}
            ClockTick::Ticked { remaining_secs } => {
                self.notices.push(Notice::Timer(remaining_secs))
            }
            ClockTick::Expired => {
                self.notices.push(Notice::Timer(0));
                self.end(EndReason::TimeUp);
            }
        }
    }

    /// Render callback: redraws the latest snapshot, then lets the scheduler
    /// dispatch a detection if one is due.
    pub fn on_frame(&mut self, now_ms: u64) -> Vec<RenderCommand> {
        if !self.session.is_running() || !self.render_loop.is_active() {
            return Vec::new();
        }
        let Some(camera) = self.camera.as_mut() else {
            return Vec::new();
        };

        let resolution = camera.frames.resolution();
        let commands = self.render_loop.draw(&self.session, resolution);

        if let Some(attempt) = self.scheduler.poll(now_ms, &mut self.session) {
            let report = match camera.frames.current_frame() {
                Some(frame) => camera.detector.submit(DetectionRequest { attempt, frame }),
                None => Some(DetectionReport {
                    attempt,
                    result: Err(DetectionError::NoFrame),
                }),
            };
            if let Some(report) = report {
                self.on_detection(report);
            }
        }
        commands
    }

    /// Completion of a detection attempt, inline or from a worker
    pub fn on_detection(&mut self, report: DetectionReport) {
        let Some(objects) = self.scheduler.complete(report, &self.session) else {
            return;
        };
        self.detection_source.feed(&objects);
        self.render_loop.replace_snapshot(objects);
        self.draw_from_camera(false);
    }

    fn draw_from_list(&mut self, forced: bool) {
        let candidates = self.list_source.next_candidates();
        match self
            .tracker
            .consider_new_target(&mut self.session, &candidates, &[], forced)
        {
            TargetOutcome::Drawn(word) => self.announce_target(word),
            TargetOutcome::Exhausted if self.list_source.is_cyclic() => {
                info!("word list cleared, starting another round");
                let previous = self.session.target.clone();
                self.session.answered.clear();
                let pool: Vec<String> = candidates
                    .iter()
                    .filter(|w| candidates.len() == 1 || Some(*w) != previous.as_ref())
                    .cloned()
                    .collect();
                let session = &mut self.session;
                let outcome = self.tracker.consider_new_target(session, &pool, &[], true);
                if let TargetOutcome::Drawn(word) = outcome {
                    self.announce_target(word);
                }
            }
            TargetOutcome::Exhausted => {
                self.session.target = None;
                self.notices.push(Notice::Target(None));
                self.notices.push(Notice::Feedback(Feedback::AllClear));
                self.end(EndReason::AllCleared);
            }
            _ => {}
        }
    }

    fn draw_from_camera(&mut self, forced: bool) {
        let candidates = self.detection_source.next_candidates();
        let visible = self.detection_source.visible_labels().to_vec();
        let open = candidates
            .iter()
            .filter(|w| !self.session.answered.contains(*w))
            .count();

        match self
            .tracker
            .consider_new_target(&mut self.session, &candidates, &visible, forced)
        {
            TargetOutcome::Drawn(word) => {
                self.announce_target(word);
                self.status(format!("{open} target candidate(s) in view."));
            }
            TargetOutcome::Kept if open > 0 => {
                self.status(format!("{open} target candidate(s) in view."));
            }
            TargetOutcome::NothingNew => {
                let msg = format!(
                    "Nothing new in view. Keep going with \"{}\".",
                    self.session.target_label()
                );
                self.status(msg);
            }
            TargetOutcome::NoTarget => {
                self.notices.push(Notice::Target(None));
                if candidates.is_empty() {
                    self.status("No target found. Show something to the camera.");
                } else {
                    self.status("Everything in view has been cleared!");
                }
                if forced {
                    self.scheduler.expedite(&mut self.session);
                }
            }
            TargetOutcome::Kept | TargetOutcome::Exhausted => {}
        }
    }

    fn announce_target(&mut self, word: String) {
        let feedback = Notice::Feedback(Feedback::NewTarget(word.clone()));
        self.notices.extend([Notice::Target(Some(word)), feedback]);
    }

    fn end(&mut self, reason: EndReason) {
        info!(
            "session ended ({reason}) with score {}, {}s left",
            self.session.score, self.session.remaining_secs
        );
        self.session.finish(reason);
        self.clock.cancel();
        self.render_loop.stop();
        self.scheduler.cancel();
        self.notices.push(Notice::Ended {
            score: self.session.score,
            reason,
        });
        self.status(format!("Game over! Score: {}", self.session.score));
    }

    fn reject(&mut self, err: GameError) -> Result<(), GameError> {
        warn!("rejected: {err}");
        self.status(err.to_string());
        Err(err)
    }

    fn status(&mut self, text: impl Into<String>) {
        self.notices.push(Notice::Status(text.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{AttemptToken, Frame, InlineDetector, ObjectDetector};
    use assert_matches::assert_matches;
    use std::collections::VecDeque;

    struct StillCamera {
        ready: bool,
        seq: u64,
    }

    impl FrameSource for StillCamera {
        fn is_ready(&self) -> bool {
            self.ready
        }

        fn resolution(&self) -> (u32, u32) {
            (640, 480)
        }

        fn current_frame(&mut self) -> Option<Frame> {
            self.seq += 1;
            Some(Frame {
                seq: self.seq,
                width: 640,
                height: 480,
            })
        }
    }

    /// Pops one scripted pass per call; empty once the script runs out
    struct QueueDetector(VecDeque<Vec<DetectedObject>>);

    impl ObjectDetector for QueueDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<DetectedObject>, DetectionError> {
            Ok(self.0.pop_front().unwrap_or_default())
        }
    }

    /// Holds requests so tests can complete them out of band
    #[derive(Default)]
    struct DeferredPort {
        requests: std::rc::Rc<std::cell::RefCell<Vec<DetectionRequest>>>,
    }

    impl DetectorPort for DeferredPort {
        fn submit(&mut self, request: DetectionRequest) -> Option<DetectionReport> {
            self.requests.borrow_mut().push(request);
            None
        }
    }

    fn cup() -> DetectedObject {
        DetectedObject::new("cup", 0.9, [10.0, 10.0, 50.0, 50.0])
    }

    fn list_controller(words: &[&str]) -> GameController {
        GameController::new(
            Config::default(),
            words.iter().map(|s| s.to_string()).collect(),
            &LabelTable::coco().unwrap(),
            None,
        )
        .with_tracker(ChallengeTracker::with_seed(7))
    }

    fn still(ready: bool) -> StillCamera {
        StillCamera { ready, seq: 0 }
    }

    fn camera_controller(passes: Vec<Vec<DetectedObject>>) -> GameController {
        let detector = QueueDetector(passes.into());
        let rig = CameraRig::new(still(true), InlineDetector(detector));
        GameController::new(
            Config::default(),
            vec![],
            &LabelTable::coco().unwrap(),
            Some(rig),
        )
        .with_tracker(ChallengeTracker::with_seed(7))
    }

    #[test]
    fn test_list_scenario_cat_dog() {
        let mut game = list_controller(&["cat", "dog"]);
        game.start(GameMode::List, 0).unwrap();
        let first = game.session().target_label().to_string();
        assert!(first == "cat" || first == "dog");
        let second = if first == "cat" { "dog" } else { "cat" };

        assert_eq!(game.input(&first), InputVerdict::Correct(first.clone()));
        assert_eq!(game.session().score, 1);
        assert_eq!(game.session().target_label(), second);

        let expected = InputVerdict::Correct(second.to_string());
        assert_eq!(game.input(second), expected);
        assert_eq!(game.session().score, 2);
        assert_eq!(game.session().status, SessionStatus::Ended);
        assert_eq!(game.session().end_reason, Some(EndReason::AllCleared));
        assert!(game.session().remaining_secs > 0);

        let ended = Notice::Ended {
            score: 2,
            reason: EndReason::AllCleared,
        };
        assert!(game.drain_notices().contains(&ended));
    }

    #[test]
    fn test_partial_and_mismatch_feedback() {
        let mut game = list_controller(&["cat"]);
        game.start(GameMode::List, 0).unwrap();
        game.drain_notices();

        assert_eq!(game.input("c"), InputVerdict::Partial);
        assert_eq!(game.input("cx"), InputVerdict::Mismatch);
        assert_eq!(
            game.drain_notices(),
            vec![
                Notice::Feedback(Feedback::Typing),
                Notice::Feedback(Feedback::Miss)
            ]
        );
        assert_eq!(game.session().score, 0);
    }

    #[test]
    fn test_cycling_list_never_ends_early() {
        let config = Config {
            cycle_list: true,
            ..Config::default()
        };
        let mut game = GameController::new(
            config,
            vec!["cat".into(), "dog".into()],
            &LabelTable::coco().unwrap(),
            None,
        )
        .with_tracker(ChallengeTracker::with_seed(1));
        game.start(GameMode::List, 0).unwrap();

        for _ in 0..5 {
            let target = game.session().target_label().to_string();
            assert_matches!(game.input(&target), InputVerdict::Correct(_));
            assert!(game.session().is_running());
            assert_ne!(game.session().target_label(), target);
        }
        assert_eq!(game.session().score, 5);
    }

    #[test]
    fn test_start_rejected_while_running() {
        let mut game = list_controller(&["cat"]);
        game.start(GameMode::List, 0).unwrap();
        let err = game.start(GameMode::Camera, 10).unwrap_err();
        assert_eq!(
            err,
            GameError::InvalidTransition {
                action: "start",
                status: SessionStatus::Running
            }
        );
        assert_eq!(game.session().mode, GameMode::List);
        assert!(game.session().is_running());
    }

    #[test]
    fn test_camera_start_needs_camera() {
        let mut game = list_controller(&["cat"]);
        let err = game.start(GameMode::Camera, 0).unwrap_err();
        assert_eq!(err, GameError::ResourceUnavailable(Resource::Camera));
        assert_eq!(game.session().status, SessionStatus::Idle);
        let status = Notice::Status("camera is not ready".into());
        assert!(game.drain_notices().contains(&status));

        let detector = InlineDetector(QueueDetector(VecDeque::new()));
        let rig = CameraRig::new(still(false), detector);
        let mut game = GameController::new(
            Config::default(),
            vec![],
            &LabelTable::coco().unwrap(),
            Some(rig),
        );
        assert!(!game.camera_ready());
        assert_eq!(
            game.start(GameMode::Camera, 0),
            Err(GameError::ResourceUnavailable(Resource::Camera))
        );
    }

    #[test]
    fn test_empty_vocabulary_rejected() {
        let mut game = list_controller(&[]);
        let err = game.start(GameMode::List, 0).unwrap_err();
        assert_eq!(err, GameError::EmptyVocabulary);
        assert_eq!(game.session().status, SessionStatus::Idle);
    }

    #[test]
    fn test_stop_then_reset() {
        let mut game = list_controller(&["cat", "dog"]);
        assert!(game.stop().is_err());

        game.start(GameMode::List, 0).unwrap();
        let target = game.session().target_label().to_string();
        game.input(&target);
        game.stop().unwrap();

        assert_eq!(game.session().status, SessionStatus::Ended);
        assert_eq!(game.session().score, 1);
        assert!(game.stop().is_err());
        assert!(game.start(GameMode::List, 100).is_err());

        game.reset();
        assert_eq!(game.session().status, SessionStatus::Idle);
        assert_eq!(game.session().score, 0);
        assert!(game.session().answered.is_empty());
        game.start(GameMode::List, 200).unwrap();
    }

    #[test]
    fn test_timeout_ends_exactly_once() {
        let config = Config {
            session_secs: 2,
            ..Config::default()
        };
        let mut game = GameController::new(
            config,
            vec!["cat".into()],
            &LabelTable::coco().unwrap(),
            None,
        );
        game.start(GameMode::List, 0).unwrap();
        game.drain_notices();

        game.on_clock(1000);
        game.on_clock(2000);
        game.on_clock(3000);
        game.on_clock(4000);

        let ended = game
            .drain_notices()
            .into_iter()
            .filter(|n| matches!(n, Notice::Ended { .. }))
            .count();
        assert_eq!(ended, 1);
        assert_eq!(game.session().end_reason, Some(EndReason::TimeUp));
        assert_eq!(game.input("cat"), InputVerdict::Ignored);
    }

    #[test]
    fn test_camera_target_persists_when_view_empties() {
        let mut game = camera_controller(vec![vec![cup()], vec![]]);
        game.start(GameMode::Camera, 0).unwrap();

        game.on_frame(16);
        assert_eq!(game.session().target_label(), "cup");

        // within the interval nothing is dispatched
        game.on_frame(1000);
        assert_eq!(game.snapshot().len(), 1);

        game.on_frame(2016);
        assert!(game.snapshot().is_empty());
        assert_eq!(game.session().target_label(), "cup");
    }

    #[test]
    fn test_camera_correct_answer_with_nothing_left_expedites() {
        let mut game = camera_controller(vec![vec![cup()], vec![cup()]]);
        game.start(GameMode::Camera, 0).unwrap();
        game.on_frame(16);
        assert_eq!(game.input("cup"), InputVerdict::Correct("cup".into()));
        assert_eq!(game.session().target, None);
        assert_eq!(game.session().last_detection_ms, None);

        // next frame dispatches right away, "cup" is answered so no target
        game.on_frame(32);
        assert_eq!(game.session().last_detection_ms, Some(32));
        assert_eq!(game.session().target, None);
        let cleared = Notice::Status("Everything in view has been cleared!".into());
        assert!(game.drain_notices().contains(&cleared));
    }

    #[test]
    fn test_unknown_labels_are_ineligible_by_default() {
        let ufo = DetectedObject::new("ufo", 0.99, [0.0; 4]);
        let mut game = camera_controller(vec![vec![ufo]]);
        game.start(GameMode::Camera, 0).unwrap();
        game.on_frame(0);
        assert_eq!(game.session().target, None);
        assert_eq!(game.snapshot().len(), 1);
    }

    #[test]
    fn test_late_detection_after_stop_is_discarded() {
        let port = DeferredPort::default();
        let requests = port.requests.clone();
        let rig = CameraRig::new(still(true), port);
        let mut game = GameController::new(
            Config::default(),
            vec![],
            &LabelTable::coco().unwrap(),
            Some(rig),
        );
        game.start(GameMode::Camera, 0).unwrap();
        game.on_frame(0);
        // in flight: further frames do not dispatch again
        game.on_frame(5000);
        assert_eq!(requests.borrow().len(), 1);

        let attempt = requests.borrow()[0].attempt;
        game.stop().unwrap();
        game.on_detection(DetectionReport {
            attempt,
            result: Ok(vec![cup()]),
        });
        assert_eq!(game.session().target, None);
        assert!(game.snapshot().is_empty());
        assert!(game.on_frame(6000).is_empty());
    }

    #[test]
    fn test_async_detection_applies_on_completion() {
        let port = DeferredPort::default();
        let requests = port.requests.clone();
        let rig = CameraRig::new(still(true), port);
        let mut game = GameController::new(
            Config::default(),
            vec![],
            &LabelTable::coco().unwrap(),
            Some(rig),
        )
        .with_tracker(ChallengeTracker::with_seed(2));
        game.start(GameMode::Camera, 0).unwrap();
        game.on_frame(0);

        // a forged token never matches
        game.on_detection(DetectionReport {
            attempt: AttemptToken(999),
            result: Ok(vec![cup()]),
        });
        assert_eq!(game.session().target, None);

        let attempt = requests.borrow()[0].attempt;
        game.on_detection(DetectionReport {
            attempt,
            result: Ok(vec![cup()]),
        });
        assert_eq!(game.session().target_label(), "cup");

        let commands = game.on_frame(16);
        assert!(commands.iter().any(|c| matches!(
            c,
            RenderCommand::DrawBox {
                highlighted: true,
                ..
            }
        )));
    }

    #[test]
    fn test_reset_keeps_camera_and_clears_state() {
        let mut game = camera_controller(vec![vec![cup()]]);
        game.start(GameMode::Camera, 0).unwrap();
        game.on_frame(0);
        game.reset();

        assert_eq!(game.session().status, SessionStatus::Idle);
        assert_eq!(game.session().target, None);
        assert!(game.snapshot().is_empty());
        assert!(game.camera_ready());
        assert!(game.on_frame(10).is_empty());
        let ended = Notice::Ended {
            score: 0,
            reason: EndReason::Stopped,
        };
        assert!(game.drain_notices().contains(&ended));
    }

    #[test]
    fn test_dispatch_routes_commands() {
        let mut game = list_controller(&["cat"]);
        game.dispatch(Command::Start(GameMode::List), 0).unwrap();
        game.dispatch(Command::Input("cat".into()), 10).unwrap();
        assert_eq!(game.session().status, SessionStatus::Ended);
        game.dispatch(Command::Reset, 20).unwrap();
        assert_eq!(game.session().status, SessionStatus::Idle);
        assert!(game.dispatch(Command::Stop, 30).is_err());
    }
}
