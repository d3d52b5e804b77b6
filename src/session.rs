use clap::ValueEnum;
use std::collections::HashSet;
use std::fmt;

/// Shown wherever the target word is the "none" sentinel
pub const NO_TARGET: &str = "---";

/// Where target words come from
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum GameMode {
    Camera,
    List,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Running,
    Ended,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, strum_macros::Display)]
pub enum EndReason {
    #[strum(serialize = "stopped")]
    Stopped,
    #[strum(serialize = "time is up")]
    TimeUp,
    #[strum(serialize = "all clear")]
    AllCleared,
}

/// Short feedback line shown under the input
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Feedback {
    #[default]
    None,
    NewTarget(String),
    Typing,
    Correct(String),
    Miss,
    AllClear,
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feedback::None => Ok(()),
            Feedback::NewTarget(word) => write!(f, "New target: \"{word}\""),
            Feedback::Typing => write!(f, "Typing..."),
            Feedback::Correct(word) => write!(f, "Correct! \"{word}\""),
            Feedback::Miss => write!(f, "Miss! Fix it and keep typing."),
            Feedback::AllClear => write!(f, "All clear!"),
        }
    }
}

/// The whole-game state, owned by the controller and lent to each component
#[derive(Debug, Clone)]
pub struct Session {
    pub mode: GameMode,
    pub status: SessionStatus,
    pub score: u32,
    pub remaining_secs: u32,
    /// `None` is the "no target" sentinel
    pub target: Option<String>,
    pub answered: HashSet<String>,
    pub last_detection_ms: Option<u64>,
    /// Typed text so far
    pub input: String,
    pub end_reason: Option<EndReason>,
}

impl Session {
    pub fn new(mode: GameMode, duration_secs: u32) -> Self {
        Self {
            mode,
            status: SessionStatus::Idle,
            score: 0,
            remaining_secs: duration_secs,
            target: None,
            answered: HashSet::new(),
            last_detection_ms: None,
            input: String::new(),
            end_reason: None,
        }
    }

    /// Clears every field and enters `Running` in the given mode
    pub fn begin(&mut self, mode: GameMode, duration_secs: u32) {
        *self = Session::new(mode, duration_secs);
        self.status = SessionStatus::Running;
    }

    pub fn finish(&mut self, reason: EndReason) {
        self.status = SessionStatus::Ended;
        self.end_reason = Some(reason);
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn target_label(&self) -> &str {
        self.target.as_deref().unwrap_or(NO_TARGET)
    }

    /// A target that may still be typed: set and not yet answered
    pub fn has_live_target(&self) -> bool {
        self.target
            .as_ref()
            .is_some_and(|t| !self.answered.contains(t))
    }

    pub fn set_target(&mut self, word: String) {
        self.target = Some(word);
        self.input.clear();
    }
}
