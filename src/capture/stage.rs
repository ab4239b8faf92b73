use super::sequence::{CapturePhase, CapturePolicy, ShotAttempt, ShotDecision};
use crate::backend::{GoatRecord, GoatRepository};
use crate::device::{DeviceLink, ImagePayload};
use crate::draft::RegistrationDraftStore;
use crate::error::{Result, SmartGidError};
use crate::events::{EventBus, WizardEvent};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Takes the fixed sequence of goat photos, then hands the draft to the registry
pub struct CaptureSequenceStage {
    link: DeviceLink,
    bus: EventBus,
    policy: CapturePolicy,
    session: CancellationToken,
    phase: CapturePhase,
    attempt: ShotAttempt,
    submit_attempts: u32,
}

impl CaptureSequenceStage {
    pub fn new(link: DeviceLink, bus: EventBus, policy: CapturePolicy) -> Self {
        Self {
            link,
            bus,
            policy,
            session: CancellationToken::new(),
            phase: CapturePhase::Shooting(0),
            attempt: ShotAttempt::new(0),
            submit_attempts: 0,
        }
    }

    /// Abort the sequence when `session` is cancelled
    pub fn with_session(mut self, session: CancellationToken) -> Self {
        self.session = session;
        self
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn attempt(&self) -> ShotAttempt {
        self.attempt
    }

    pub fn policy(&self) -> &CapturePolicy {
        &self.policy
    }

    /// Shoot every empty slot in order and stop in `Reviewing`.
    ///
    /// Resumes at the first empty slot of the draft. When a slot runs out of
    /// attempts the stage stays on that slot; calling `run` again retries it.
    pub async fn run(&mut self, store: &mut RegistrationDraftStore) -> Result<()> {
        match self.phase {
            CapturePhase::Shooting(_) | CapturePhase::Repositioning(_) => {}
            CapturePhase::Reviewing => return Ok(()),
            other => return Err(SmartGidError::invalid_transition(other, "take photos")),
        }

        let session = self.session.clone();
        tokio::select! {
            _ = session.cancelled() => {
                info!("Photo sequence aborted");
                Err(SmartGidError::Terminated)
            }
            result = self.shoot_remaining(store) => result,
        }
    }

    async fn shoot_remaining(&mut self, store: &mut RegistrationDraftStore) -> Result<()> {
        let shot_count = store.draft().images.capacity();

        while let Some(slot) = store.draft().images.next_slot() {
            self.phase = CapturePhase::Shooting(slot);
            let payload = self.shoot(slot).await?;

            let bytes = payload.decoded_len();
            store.commit_image(slot, payload)?;
            self.bus.publish(WizardEvent::ShotCaptured { slot, bytes });

            if slot + 1 < shot_count {
                self.phase = CapturePhase::Repositioning(slot);
                self.bus.publish(WizardEvent::Repositioning {
                    next_slot: slot + 1,
                    delay: self.policy.reposition_delay,
                });
                sleep(self.policy.reposition_delay).await;
            }
        }

        self.phase = CapturePhase::Reviewing;
        self.bus.publish(WizardEvent::ReviewReady { shot_count });
        Ok(())
    }

    /// Request one slot until the camera delivers or the attempt limit is hit
    async fn shoot(&mut self, slot: usize) -> Result<ImagePayload> {
        self.attempt = ShotAttempt::new(slot);

        loop {
            let attempt = self.attempt.next_attempt();
            self.bus.publish(WizardEvent::ShotRequested { slot, attempt });

            let error = match self.link.request_capture().await {
                Ok(payload) => {
                    debug!("Photo {} taken on attempt {}", slot + 1, attempt);
                    return Ok(payload);
                }
                Err(e) => e,
            };

            self.bus.publish(WizardEvent::ShotFailed {
                slot,
                attempt,
                error: error.to_string(),
            });

            match self.attempt.record_failure(&self.policy) {
                ShotDecision::RetryAfter(backoff) => {
                    warn!("Photo {} failed ({}), retrying in {:?}", slot + 1, error, backoff);
                    sleep(backoff).await;
                }
                ShotDecision::GiveUp => {
                    return Err(SmartGidError::CaptureExhausted {
                        slot,
                        attempts: self.attempt.consecutive_failures,
                        last_error: error,
                    });
                }
            }
        }
    }

    /// Clear every slot and start again from the first.
    ///
    /// Also valid while `Submitting`: a submit is only in flight while its
    /// future is alive, so reaching this point means it was abandoned.
    pub fn retake_all(&mut self, store: &mut RegistrationDraftStore) -> Result<()> {
        match self.phase {
            CapturePhase::Submitted => {
                return Err(SmartGidError::invalid_transition(self.phase, "retake photos"))
            }
            CapturePhase::Retaking => {}
            _ => self.phase = CapturePhase::Retaking,
        }

        store.clear_images();
        self.attempt = ShotAttempt::new(0);
        self.submit_attempts = 0;
        self.bus.publish(WizardEvent::RetakeRequested);

        self.phase = CapturePhase::Shooting(0);
        info!("Retaking all {} photos", self.policy.shot_count);
        Ok(())
    }

    /// Send the draft to the registry.
    ///
    /// On failure the stage returns to `Reviewing` with photos and draft
    /// intact, so the same payload can be sent again.
    pub async fn submit(
        &mut self,
        store: &mut RegistrationDraftStore,
        repository: &dyn GoatRepository,
    ) -> Result<GoatRecord> {
        match self.phase {
            CapturePhase::Reviewing | CapturePhase::Submitting => {}
            other => return Err(SmartGidError::invalid_transition(other, "submit")),
        }

        self.phase = CapturePhase::Submitting;
        self.submit_attempts += 1;
        self.bus.publish(WizardEvent::SubmitStarted {
            attempt: self.submit_attempts,
        });

        match store.submit(repository).await {
            Ok(record) => {
                self.phase = CapturePhase::Submitted;
                self.bus.publish(WizardEvent::Submitted {
                    record_id: record.id.clone(),
                });
                Ok(record)
            }
            Err(e) => {
                self.phase = CapturePhase::Reviewing;
                self.bus.publish(WizardEvent::SubmitFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}
