use thiserror::Error;

use crate::session::SessionStatus;

/// External collaborators that must be ready before Camera mode may start
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Resource {
    #[strum(serialize = "camera")]
    Camera,
    #[strum(serialize = "object detector")]
    Detector,
}

/// Errors returned by [`crate::controller::GameController`] transitions.
///
/// None of these are fatal: a rejected transition leaves the session exactly
/// as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    #[error("{0} is not ready")]
    ResourceUnavailable(Resource),
    #[error("cannot {action} while the session is {status}")]
    InvalidTransition {
        action: &'static str,
        status: SessionStatus,
    },
    #[error("word list is empty")]
    EmptyVocabulary,
}

/// Errors raised while loading a scripted detection scene
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("unable to read scene: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse scene: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("scene has no frames")]
    Empty,
}
