use crate::config::CameraConfig;
use std::fmt;
use std::time::Duration;

/// Where the photo sequence stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    /// Requesting the photo for a slot
    Shooting(usize),
    /// Pausing after a slot was filled so the goat can be turned
    Repositioning(usize),
    /// Every slot is filled
    Reviewing,
    /// Slots are being cleared to start over
    Retaking,
    Submitting,
    Submitted,
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapturePhase::Shooting(slot) => write!(f, "shooting({})", slot),
            CapturePhase::Repositioning(slot) => write!(f, "repositioning({})", slot),
            CapturePhase::Reviewing => write!(f, "reviewing"),
            CapturePhase::Retaking => write!(f, "retaking"),
            CapturePhase::Submitting => write!(f, "submitting"),
            CapturePhase::Submitted => write!(f, "submitted"),
        }
    }
}

/// Timing and retry limits of the photo sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapturePolicy {
    pub shot_count: usize,
    pub reposition_delay: Duration,
    pub retry_backoff: Duration,
    /// `None` retries a failing slot forever
    pub max_attempts: Option<u32>,
}

impl CapturePolicy {
    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            shot_count: config.shot_count,
            reposition_delay: config.reposition_delay(),
            retry_backoff: config.retry_backoff(),
            max_attempts: config.attempt_limit(),
        }
    }
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            shot_count: 4,
            reposition_delay: Duration::from_millis(1500),
            retry_backoff: Duration::from_secs(2),
            max_attempts: Some(5),
        }
    }
}

/// What to do after a failed capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShotDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Attempt state of the slot being shot; reset for every slot and every retake
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShotAttempt {
    pub shot_index: usize,
    pub consecutive_failures: u32,
}

impl ShotAttempt {
    pub fn new(shot_index: usize) -> Self {
        Self {
            shot_index,
            consecutive_failures: 0,
        }
    }

    /// Number of the next request for this slot, starting at 1
    pub fn next_attempt(&self) -> u32 {
        self.consecutive_failures + 1
    }

    pub fn record_failure(&mut self, policy: &CapturePolicy) -> ShotDecision {
        self.consecutive_failures += 1;
        match policy.max_attempts {
            Some(max) if self.consecutive_failures >= max => ShotDecision::GiveUp,
            _ => ShotDecision::RetryAfter(policy.retry_backoff),
        }
    }
}
