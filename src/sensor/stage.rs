use crate::device::{DeviceLink, PollOutcome, SensorReading};
use crate::draft::RegistrationDraftStore;
use crate::error::{DeviceError, Result, SmartGidError};
use crate::events::{EventBus, WizardEvent};
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorPhase {
    Idle,
    Polling,
    Success,
    TimedOut,
}

impl fmt::Display for SensorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorPhase::Idle => "idle",
            SensorPhase::Polling => "polling",
            SensorPhase::Success => "success",
            SensorPhase::TimedOut => "timed_out",
        };
        write!(f, "{}", name)
    }
}

/// State of one acquisition attempt; replaced on every retry
#[derive(Debug, Clone)]
pub struct AcquisitionAttempt {
    pub phase: SensorPhase,
    pub deadline_at: Instant,
    pub cancel: CancellationToken,
}

/// Reads tag, weight and height from the sensor station under an overall deadline
pub struct SensorAcquisitionStage {
    link: DeviceLink,
    bus: EventBus,
    deadline: Duration,
    session: CancellationToken,
    phase: SensorPhase,
    attempt: Option<AcquisitionAttempt>,
}

impl SensorAcquisitionStage {
    pub fn new(link: DeviceLink, bus: EventBus, deadline: Duration) -> Self {
        Self {
            link,
            bus,
            deadline,
            session: CancellationToken::new(),
            phase: SensorPhase::Idle,
            attempt: None,
        }
    }

    /// Tie the stage to a session token; cancelling it aborts any attempt
    pub fn with_session(mut self, session: CancellationToken) -> Self {
        self.session = session;
        self
    }

    pub fn phase(&self) -> SensorPhase {
        self.phase
    }

    pub fn attempt(&self) -> Option<&AcquisitionAttempt> {
        self.attempt.as_ref()
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Back to `Idle`, e.g. when the operator asks for a new scan
    pub fn reset(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            attempt.cancel.cancel();
        }
        self.phase = SensorPhase::Idle;
    }

    /// Poll until a reading arrives or the deadline passes.
    ///
    /// Only valid from `Idle`. A reading is written to `store` and the stage
    /// ends in `Success`; when the deadline passes first the in-flight poll is
    /// cancelled, nothing is written and the stage ends in `TimedOut`.
    pub async fn run(&mut self, store: &mut RegistrationDraftStore) -> Result<SensorReading> {
        if self.phase != SensorPhase::Idle {
            return Err(SmartGidError::invalid_transition(self.phase, "start a sensor scan"));
        }

        let cancel = self.session.child_token();
        let deadline_at = Instant::now() + self.deadline;
        self.attempt = Some(AcquisitionAttempt {
            phase: SensorPhase::Polling,
            deadline_at,
            cancel: cancel.clone(),
        });
        self.phase = SensorPhase::Polling;
        info!("Waiting up to {:?} for a sensor reading", self.deadline);

        let bus = self.bus.clone();
        let poll = self.link.poll_for_reading_observed(&cancel, |attempt, outcome| {
            bus.publish(WizardEvent::SensorPollAttempt {
                attempt,
                waiting: matches!(outcome, PollOutcome::Waiting),
            });
        });

        let outcome = tokio::select! {
            biased;
            _ = sleep_until(deadline_at) => None,
            result = poll => Some(result),
        };

        match outcome {
            None => {
                cancel.cancel();
                warn!("No sensor reading within {:?}", self.deadline);
                self.bus.publish(WizardEvent::SensorTimedOut {
                    deadline: self.deadline,
                });
                self.finish(SensorPhase::TimedOut);
                Err(SmartGidError::StageDeadlineExceeded {
                    deadline: self.deadline,
                })
            }
            Some(Ok(reading)) => {
                store.set_sensor_reading(reading.clone());
                self.bus.publish(WizardEvent::SensorReadingAcquired {
                    tag_id: reading.tag_id.clone(),
                    weight_kg: reading.weight_kg,
                    height_cm: reading.height_cm,
                });
                self.finish(SensorPhase::Success);
                Ok(reading)
            }
            Some(Err(DeviceError::Cancelled { .. })) => {
                self.finish(SensorPhase::Idle);
                Err(SmartGidError::Terminated)
            }
            Some(Err(e)) => {
                self.finish(SensorPhase::Idle);
                Err(e.into())
            }
        }
    }

    /// Start a fresh attempt after a timeout. The draft is not touched.
    pub async fn retry(&mut self, store: &mut RegistrationDraftStore) -> Result<SensorReading> {
        if self.phase != SensorPhase::TimedOut {
            return Err(SmartGidError::invalid_transition(self.phase, "retry the sensor scan"));
        }
        self.reset();
        self.run(store).await
    }

    fn finish(&mut self, phase: SensorPhase) {
        self.phase = phase;
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.phase = phase;
        }
    }
}
