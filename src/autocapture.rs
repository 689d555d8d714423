// Arm-and-reconfirm auto-capture.
// Idle -> Armed{deadline} on the first framed reading; at the deadline the
// active mode's flag is read again: still framed fires one capture, anything
// else goes back to Idle. Only one deadline can be pending.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoState {
    Idle,
    Armed { deadline: Instant },
    Capturing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoEvent {
    /// Deadline reached and still framed: capture now.
    Fire,
    /// Deadline reached but no longer framed.
    Discarded,
}

#[derive(Debug, Clone)]
pub struct AutoCapture {
    enabled: bool,
    delay: Duration,
    state: AutoState,
}

impl AutoCapture {
    pub fn new(enabled: bool, delay: Duration) -> Self {
        Self { enabled, delay, state: AutoState::Idle }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> AutoState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, AutoState::Armed { .. })
    }

    /// Turning the feature off drops a pending deadline.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.cancel();
        }
    }

    /// Feed one fused reading for the active mode. Returns true when this
    /// reading armed a new deadline.
    pub fn observe(&mut self, framed: bool, now: Instant) -> bool {
        if !self.enabled || !framed || self.state != AutoState::Idle {
            return false;
        }
        self.state = AutoState::Armed { deadline: now + self.delay };
        log::debug!("auto-capture armed for {} ms", self.delay.as_millis());
        true
    }

    /// Check the pending deadline against the active mode's current flag.
    pub fn poll(&mut self, now: Instant, framed: bool) -> Option<AutoEvent> {
        let AutoState::Armed { deadline } = self.state else {
            return None;
        };
        if now < deadline {
            return None;
        }
        if framed {
            self.state = AutoState::Capturing;
            log::info!("auto-capture confirmed");
            Some(AutoEvent::Fire)
        } else {
            self.state = AutoState::Idle;
            log::debug!("auto-capture discarded: no longer framed");
            Some(AutoEvent::Discarded)
        }
    }

    /// The capture triggered by [`AutoEvent::Fire`] is done.
    pub fn finish_capture(&mut self) {
        if self.state == AutoState::Capturing {
            self.state = AutoState::Idle;
        }
    }

    pub fn cancel(&mut self) {
        if self.is_armed() {
            log::debug!("auto-capture canceled");
        }
        self.state = AutoState::Idle;
    }
}
