use crate::session::Session;

/// Default session length
pub const SESSION_DURATION_SECS: u32 = 60;

const PERIOD_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTick {
    /// Not due yet, or the clock is not running
    Idle,
    Ticked {
        remaining_secs: u32,
    },
    /// Reached zero. Reported once; the clock cancels itself.
    Expired,
}

/// 1 Hz countdown, driven by host timestamps and independent of the render
/// and detection cadence
#[derive(Debug, Default)]
pub struct SessionClock {
    next_fire_ms: Option<u64>,
}

impl SessionClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, now_ms: u64) {
        self.next_fire_ms = Some(now_ms + PERIOD_MS);
    }

    /// Safe to call repeatedly; a cancelled clock never fires
    pub fn cancel(&mut self) {
        self.next_fire_ms = None;
    }

    pub fn is_running(&self) -> bool {
        self.next_fire_ms.is_some()
    }

    /// Fires every whole second that has elapsed since the last firing
    pub fn poll(&mut self, now_ms: u64, session: &mut Session) -> ClockTick {
        let Some(mut next) = self.next_fire_ms else {
            return ClockTick::Idle;
        };
        if !session.is_running() {
            self.cancel();
            return ClockTick::Idle;
        }

        let mut fired = false;
        while now_ms >= next {
            fired = true;
            session.remaining_secs = session.remaining_secs.saturating_sub(1);
            if session.remaining_secs == 0 {
                self.cancel();
                return ClockTick::Expired;
            }
            next += PERIOD_MS;
        }
        self.next_fire_ms = Some(next);

        if fired {
            ClockTick::Ticked {
                remaining_secs: session.remaining_secs,
            }
        } else {
            ClockTick::Idle
        }
    }
}
