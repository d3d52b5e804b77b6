use itertools::Itertools;
use log::debug;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::session::{GameMode, Session};

/// Result of [`ChallengeTracker::consider_new_target`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// No draw was needed
    Kept,
    Drawn(String),
    /// Camera mode: nothing eligible, the current target stays
    NothingNew,
    /// Camera mode: nothing eligible and no live target, target is the sentinel
    NoTarget,
    /// List mode: every vocabulary entry has been answered
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputVerdict {
    /// Not running, or no target to type
    Ignored,
    Correct(String),
    Partial,
    Mismatch,
}

/// Owns the new-target policy and input matching for a [`Session`]
#[derive(Debug)]
pub struct ChallengeTracker<R: Rng = StdRng> {
    rng: R,
}

impl ChallengeTracker<StdRng> {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for ChallengeTracker<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> ChallengeTracker<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Draws a new target when forced, when there is none, or (camera mode)
    /// when the current one is no longer among `visible`.
    ///
    /// Answered words are never drawn. When nothing is eligible a camera
    /// target persists as long as it is still unanswered.
    pub fn consider_new_target(
        &mut self,
        session: &mut Session,
        candidates: &[String],
        visible: &[String],
        forced: bool,
    ) -> TargetOutcome {
        let lost_sight = session.mode == GameMode::Camera
            && session
                .target
                .as_ref()
                .is_some_and(|t| !visible.contains(t));

        if !(forced || session.target.is_none() || lost_sight) {
            return TargetOutcome::Kept;
        }

        let eligible: Vec<&String> = candidates
            .iter()
            .filter(|w| !session.answered.contains(*w))
            .unique()
            .collect();

        if let Some(word) = eligible.choose(&mut self.rng) {
            let word = (*word).clone();
            debug!(
                "new target {word:?} drawn from {} candidates",
                eligible.len()
            );
            session.set_target(word.clone());
            return TargetOutcome::Drawn(word);
        }

        match session.mode {
            GameMode::List => TargetOutcome::Exhausted,
            GameMode::Camera if session.has_live_target() => TargetOutcome::NothingNew,
            GameMode::Camera => {
                session.target = None;
                TargetOutcome::NoTarget
            }
        }
    }

    /// Matches the typed text against the target.
    ///
    /// A correct answer scores, records the word and clears the input; the
    /// caller is expected to force a new target afterwards. An already
    /// answered target is treated like no target at all.
    pub fn check_input(&self, session: &mut Session, typed: &str) -> InputVerdict {
        if !session.is_running() || !session.has_live_target() {
            return InputVerdict::Ignored;
        }
        let Some(target) = session.target.clone() else {
            return InputVerdict::Ignored;
        };

        if typed == target {
            session.answered.insert(target.clone());
            session.score += 1;
            session.input.clear();
            InputVerdict::Correct(target)
        } else if target.starts_with(typed) {
            session.input = typed.to_string();
            InputVerdict::Partial
        } else {
            session.input = typed.to_string();
            InputVerdict::Mismatch
        }
    }
}
