use log::{debug, warn};
use serde::Deserialize;
use thiserror::Error;

use crate::session::Session;

/// Default time between two detector invocations
pub const DETECTION_INTERVAL_MS: u64 = 2000;
/// Detections at or below this confidence are dropped
pub const DETECTION_THRESHOLD: f32 = 0.6;

/// Box in frame pixel space
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f32; 4]")]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        BoundingBox {
            x: v[0],
            y: v[1],
            width: v[2],
            height: v[3],
        }
    }
}

/// One item from a detection pass. Never tracked across passes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectedObject {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl DetectedObject {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox: bbox.into(),
        }
    }
}

/// Opaque handle to a captured camera frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub seq: u64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectionError {
    #[error("no camera frame available")]
    NoFrame,
    #[error("detector is unavailable")]
    Unavailable,
    #[error("detection failed: {0}")]
    Failed(String),
}

/// Supplies the frame handed to the detector
pub trait FrameSource {
    fn is_ready(&self) -> bool;
    /// Frame dimensions in pixels
    fn resolution(&self) -> (u32, u32);
    fn current_frame(&mut self) -> Option<Frame>;
}

/// Runs object detection on a single frame
pub trait ObjectDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedObject>, DetectionError>;
}

/// Identifies one dispatched detection attempt. Increases monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptToken(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRequest {
    pub attempt: AttemptToken,
    pub frame: Frame,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    pub attempt: AttemptToken,
    pub result: Result<Vec<DetectedObject>, DetectionError>,
}

/// Where the controller sends detection requests.
///
/// `submit` returns the report right away when the detector runs inline, or
/// `None` when the report will be delivered later through the host's event
/// queue.
pub trait DetectorPort {
    fn is_ready(&self) -> bool {
        true
    }
    fn submit(&mut self, request: DetectionRequest) -> Option<DetectionReport>;
}

/// Runs the wrapped detector synchronously on the control thread
pub struct InlineDetector<D: ObjectDetector>(pub D);

impl<D: ObjectDetector> DetectorPort for InlineDetector<D> {
    fn submit(&mut self, request: DetectionRequest) -> Option<DetectionReport> {
        Some(DetectionReport {
            attempt: request.attempt,
            result: self.0.detect(&request.frame),
        })
    }
}

/// Throttles detector invocations to a fixed interval, independent of the
/// render tick rate, with at most one attempt in flight.
#[derive(Debug)]
pub struct DetectionScheduler {
    interval_ms: u64,
    threshold: f32,
    in_flight: Option<AttemptToken>,
    next_attempt: u64,
}

impl DetectionScheduler {
    pub fn new(interval_ms: u64, threshold: f32) -> Self {
        Self {
            interval_ms,
            threshold,
            in_flight: None,
            next_attempt: 1,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn in_flight(&self) -> Option<AttemptToken> {
        self.in_flight
    }

    /// Decides whether a detection should be dispatched now.
    ///
    /// The dispatch timestamp is recorded here rather than on completion, so a
    /// slow detector cannot cause a burst of calls once it returns.
    pub fn poll(&mut self, now_ms: u64, session: &mut Session) -> Option<AttemptToken> {
        if !session.is_running() || self.in_flight.is_some() {
            return None;
        }
        if let Some(last) = session.last_detection_ms {
            if now_ms.saturating_sub(last) < self.interval_ms {
                return None;
            }
        }

        let attempt = AttemptToken(self.next_attempt);
        self.next_attempt += 1;
        self.in_flight = Some(attempt);
        session.last_detection_ms = Some(now_ms);
        debug!("dispatching detection attempt {} at {now_ms}ms", attempt.0);
        Some(attempt)
    }

    /// Accepts the report for the in-flight attempt.
    ///
    /// Stale reports (an older attempt, or any report once the session has
    /// stopped running) return `None` and change nothing. A failed detection
    /// counts as "nothing detected".
    pub fn complete(
        &mut self,
        report: DetectionReport,
        session: &Session,
    ) -> Option<Vec<DetectedObject>> {
        if self.in_flight != Some(report.attempt) {
            debug!("discarding stale detection attempt {}", report.attempt.0);
            return None;
        }
        self.in_flight = None;

        if !session.is_running() {
            debug!(
                "discarding detection attempt {} after session end",
                report.attempt.0
            );
            return None;
        }

        match report.result {
            Ok(objects) => Some(self.filter(objects)),
            Err(err) => {
                warn!("detection attempt {} failed: {err}", report.attempt.0);
                Some(Vec::new())
            }
        }
    }

    /// Synchronous dispatch-and-complete for detectors that run inline
    pub fn tick<D: ObjectDetector + ?Sized>(
        &mut self,
        now_ms: u64,
        session: &mut Session,
        frame: &Frame,
        detector: &mut D,
    ) -> Option<Vec<DetectedObject>> {
        let attempt = self.poll(now_ms, session)?;
        let result = detector.detect(frame);
        self.complete(DetectionReport { attempt, result }, session)
    }

    /// Forgets any in-flight attempt. Tokens are never reused, so a cancelled
    /// attempt's report can no longer match and is discarded on arrival.
    pub fn cancel(&mut self) {
        self.in_flight = None;
    }

    /// Lets the next poll dispatch without waiting for the interval
    pub fn expedite(&self, session: &mut Session) {
        session.last_detection_ms = None;
    }

    pub fn filter(&self, objects: Vec<DetectedObject>) -> Vec<DetectedObject> {
        objects
            .into_iter()
            .filter(|o| o.confidence > self.threshold)
            .collect()
    }
}

impl Default for DetectionScheduler {
    fn default() -> Self {
        Self::new(DETECTION_INTERVAL_MS, DETECTION_THRESHOLD)
    }
}
