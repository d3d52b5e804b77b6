use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};
use log::{debug, warn};

use crate::detection::{
    DetectionError, DetectionReport, DetectionRequest, DetectorPort, ObjectDetector,
};

/// Unified event type consumed by the app runner
#[derive(Clone, Debug)]
pub enum GameEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    /// A detection attempt finished on the worker thread
    Detection(DetectionReport),
}

/// Source of host events (keyboard, resize, detection completions)
pub trait GameEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<GameEvent, RecvTimeoutError>;
}

/// Production event source using crossterm
pub struct CrosstermEventSource {
    tx: Sender<GameEvent>,
    rx: Receiver<GameEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        let keys = tx.clone();

        thread::spawn(move || loop {
            let sent = match event::read() {
                Ok(CtEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                    keys.send(GameEvent::Key(key))
                }
                Ok(CtEvent::Resize(_, _)) => keys.send(GameEvent::Resize),
                Ok(_) => Ok(()),
                Err(_) => break,
            };
            if sent.is_err() {
                break;
            }
        });

        Self { tx, rx }
    }

    /// Handle for other producers feeding the same queue
    pub fn sender(&self) -> Sender<GameEvent> {
        self.tx.clone()
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl GameEventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<GameEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Test event source for unit tests
pub struct TestEventSource {
    rx: Receiver<GameEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<GameEvent>) -> Self {
        Self { rx }
    }
}

impl GameEventSource for TestEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<GameEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Runner that advances the application one event/tick at a time
pub struct Runner<E: GameEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    started: Instant,
}

impl<E: GameEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
            started: Instant::now(),
        }
    }

    /// Blocks up to tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> GameEvent {
        match self.event_source.recv_timeout(self.ticker.interval()) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => GameEvent::Tick,
        }
    }

    /// Monotonic host time handed to the controller's timed callbacks
    pub fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Runs an [`ObjectDetector`] on its own thread.
///
/// Requests are queued to the worker; each finished attempt is posted back
/// to the host's event queue as [`GameEvent::Detection`].
pub struct DetectionWorker {
    requests: Option<Sender<DetectionRequest>>,
    handle: Option<JoinHandle<()>>,
}

impl DetectionWorker {
    pub fn spawn<D: ObjectDetector + 'static>(mut detector: D, events: Sender<GameEvent>) -> Self {
        let (tx, rx) = mpsc::channel::<DetectionRequest>();

        let handle = thread::spawn(move || {
            for request in rx {
                debug!("worker running detection attempt {}", request.attempt.0);
                let report = DetectionReport {
                    attempt: request.attempt,
                    result: detector.detect(&request.frame),
                };
                if events.send(GameEvent::Detection(report)).is_err() {
                    break;
                }
            }
        });

        Self {
            requests: Some(tx),
            handle: Some(handle),
        }
    }
}

impl DetectorPort for DetectionWorker {
    fn is_ready(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn submit(&mut self, request: DetectionRequest) -> Option<DetectionReport> {
        let attempt = request.attempt;
        match self.requests.as_ref().map(|tx| tx.send(request)) {
            Some(Ok(())) => None,
            _ => {
                warn!("detection worker is gone, attempt {} dropped", attempt.0);
                Some(DetectionReport {
                    attempt,
                    result: Err(DetectionError::Unavailable),
                })
            }
        }
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        // closing the request channel ends the worker loop
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
