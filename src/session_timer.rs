//! Treatment session timer.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Stopped,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("cannot {action} a {from:?} timer")]
pub struct TimerError {
    pub from: TimerState,
    pub action: &'static str,
}

#[derive(Debug, Clone)]
pub struct SessionTimer {
    state: TimerState,
    // Time banked by finished running spans
    accumulated: Duration,
    running_since: Option<Instant>,
}

impl Default for SessionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTimer {
    pub fn new() -> Self {
        Self {
            state: TimerState::Idle,
            accumulated: Duration::ZERO,
            running_since: None,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn start(&mut self) -> Result<(), TimerError> {
        self.expect(TimerState::Idle, "start")?;
        self.running_since = Some(Instant::now());
        self.state = TimerState::Running;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), TimerError> {
        self.expect(TimerState::Running, "pause")?;
        self.bank();
        self.state = TimerState::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), TimerError> {
        self.expect(TimerState::Paused, "resume")?;
        self.running_since = Some(Instant::now());
        self.state = TimerState::Running;
        Ok(())
    }

    /// Stops from running or paused; the elapsed time is frozen afterwards.
    pub fn stop(&mut self) -> Result<Duration, TimerError> {
        if !matches!(self.state, TimerState::Running | TimerState::Paused) {
            return Err(TimerError { from: self.state, action: "stop" });
        }
        self.bank();
        self.state = TimerState::Stopped;
        Ok(self.accumulated)
    }

    /// Back to idle from any state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn elapsed(&self) -> Duration {
        match self.running_since {
            Some(since) => self.accumulated + since.elapsed(),
            None => self.accumulated,
        }
    }

    pub fn display(&self) -> String {
        format_elapsed(self.elapsed())
    }

    fn bank(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed();
        }
    }

    fn expect(&self, want: TimerState, action: &'static str) -> Result<(), TimerError> {
        if self.state == want {
            Ok(())
        } else {
            Err(TimerError { from: self.state, action })
        }
    }
}

/// `MM:SS`, or `H:MM:SS` from one hour on.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
