use crate::detection::{BoundingBox, DetectedObject};
use crate::session::Session;

/// Drawing instructions handed to the presentation boundary every frame
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    Clear,
    DrawFrame {
        width: u32,
        height: u32,
    },
    DrawBox {
        bbox: BoundingBox,
        caption: String,
        highlighted: bool,
    },
}

/// Per-frame redraw of the latest completed detection pass.
///
/// The loop is active only while a camera session runs; once stopped it
/// produces nothing.
#[derive(Debug, Default)]
pub struct RenderLoop {
    active: bool,
    snapshot: Vec<DetectedObject>,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.active = true;
        self.snapshot.clear();
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn reset(&mut self) {
        self.active = false;
        self.snapshot.clear();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn snapshot(&self) -> &[DetectedObject] {
        &self.snapshot
    }

    /// Swaps in the result of the most recently completed detection pass
    pub fn replace_snapshot(&mut self, detections: Vec<DetectedObject>) {
        self.snapshot = detections;
    }

    /// Commands for one frame: the base frame, then a box per detection.
    ///
    /// Detections already answered are hidden unless they are the current
    /// target, which is drawn highlighted.
    pub fn draw(&self, session: &Session, resolution: (u32, u32)) -> Vec<RenderCommand> {
        if !self.active {
            return Vec::new();
        }

        let mut commands = vec![
            RenderCommand::Clear,
            RenderCommand::DrawFrame {
                width: resolution.0,
                height: resolution.1,
            },
        ];

        let target = session.target.as_deref();
        let is_target = |d: &DetectedObject| Some(d.label.as_str()) == target;
        commands.extend(
            self.snapshot
                .iter()
                .filter(|&d| is_target(d) || !session.answered.contains(&d.label))
                .map(|d| RenderCommand::DrawBox {
                    bbox: d.bbox,
                    caption: format!("{} ({:.0}%)", d.label, d.confidence * 100.0),
                    highlighted: is_target(d),
                }),
        );
        commands
    }
}
