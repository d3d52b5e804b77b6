use include_dir::{include_dir, Dir};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::detection::{DetectedObject, DetectionError, Frame, FrameSource, ObjectDetector};
use crate::error::SceneError;

static SCENE_DIR: Dir = include_dir!("assets/scenes");

/// Scripted camera feed: one entry per frame, `None` where the detector fails
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Scene {
    #[serde(default)]
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub frames: Vec<Option<Vec<DetectedObject>>>,
}

impl Scene {
    pub fn parse(text: &str) -> Result<Self, SceneError> {
        let scene: Scene = serde_json::from_str(text)?;
        if scene.frames.is_empty() {
            return Err(SceneError::Empty);
        }
        Ok(scene)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SceneError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// The scene bundled with the binary
    pub fn demo() -> Result<Self, SceneError> {
        let text = SCENE_DIR
            .get_file("demo.json")
            .and_then(|f| f.contents_utf8())
            .ok_or(SceneError::Empty)?;
        Self::parse(text)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn frame_at(&self, seq: u64) -> Option<&Option<Vec<DetectedObject>>> {
        if self.frames.is_empty() {
            return None;
        }
        self.frames.get((seq % self.frames.len() as u64) as usize)
    }
}

/// Splits a scene into the camera and detector halves of a camera rig
pub fn scripted_pair(scene: Scene, latency: Duration) -> (ScriptedCamera, ScriptedDetector) {
    let scene = Arc::new(scene);
    (
        ScriptedCamera {
            scene: scene.clone(),
            next_seq: 0,
        },
        ScriptedDetector { scene, latency },
    )
}

pub struct ScriptedCamera {
    scene: Arc<Scene>,
    next_seq: u64,
}

impl FrameSource for ScriptedCamera {
    fn is_ready(&self) -> bool {
        !self.scene.is_empty()
    }

    fn resolution(&self) -> (u32, u32) {
        (self.scene.width, self.scene.height)
    }

    fn current_frame(&mut self) -> Option<Frame> {
        if self.scene.is_empty() {
            return None;
        }
        let seq = self.next_seq;
        self.next_seq = (self.next_seq + 1) % self.scene.len() as u64;
        Some(Frame {
            seq,
            width: self.scene.width,
            height: self.scene.height,
        })
    }
}

pub struct ScriptedDetector {
    scene: Arc<Scene>,
    latency: Duration,
}

impl ObjectDetector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedObject>, DetectionError> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        match self.scene.frame_at(frame.seq) {
            Some(Some(objects)) => Ok(objects.clone()),
            Some(None) => Err(DetectionError::Failed(format!(
                "scripted failure at frame {}",
                frame.seq
            ))),
            None => Err(DetectionError::NoFrame),
        }
    }
}
