use super::countdown::{CompletionCountdown, CountdownOutcome};
use super::step::{Step, WizardAction};
use crate::backend::{GoatRecord, GoatRepository};
use crate::capture::{CapturePhase, CapturePolicy, CaptureSequenceStage};
use crate::config::SmartGidConfig;
use crate::device::{DeviceLink, SensorReading};
use crate::draft::{GoatAttributes, RegistrationDraft, RegistrationDraftStore};
use crate::error::{Result, SmartGidError};
use crate::events::{EventBus, WizardEvent};
use crate::sensor::{SensorAcquisitionStage, SensorPhase};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Policy values of one wizard session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WizardSettings {
    pub sensor_deadline: Duration,
    pub capture: CapturePolicy,
    pub complete_countdown: Duration,
}

impl WizardSettings {
    pub fn from_config(config: &SmartGidConfig) -> Self {
        Self {
            sensor_deadline: config.sensor.deadline(),
            capture: CapturePolicy::from_config(&config.camera),
            complete_countdown: config.wizard.complete_countdown(),
        }
    }
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            sensor_deadline: Duration::from_secs(20),
            capture: CapturePolicy::default(),
            complete_countdown: Duration::from_secs(10),
        }
    }
}

/// Sequences the registration steps and owns the draft for the session
pub struct WizardController {
    step: Step,
    store: RegistrationDraftStore,
    repository: Arc<dyn GoatRepository>,
    bus: EventBus,
    settings: WizardSettings,
    session: CancellationToken,
    dismiss: CancellationToken,
    sensor: SensorAcquisitionStage,
    capture: CaptureSequenceStage,
}

impl WizardController {
    pub fn new(
        link: DeviceLink,
        repository: Arc<dyn GoatRepository>,
        store: RegistrationDraftStore,
        bus: EventBus,
        settings: WizardSettings,
    ) -> Self {
        let session = CancellationToken::new();
        let sensor =
            SensorAcquisitionStage::new(link.clone(), bus.clone(), settings.sensor_deadline)
                .with_session(session.child_token());
        let capture = CaptureSequenceStage::new(link, bus.clone(), settings.capture)
            .with_session(session.child_token());

        Self {
            step: Step::Start,
            store,
            repository,
            bus,
            settings,
            session,
            dismiss: CancellationToken::new(),
            sensor,
            capture,
        }
    }

    /// Continue a checkpointed draft at the first step with missing data
    pub fn resume(
        link: DeviceLink,
        repository: Arc<dyn GoatRepository>,
        store: RegistrationDraftStore,
        bus: EventBus,
        settings: WizardSettings,
    ) -> Self {
        let step = {
            let draft = store.draft();
            if draft.sensor.is_none() {
                Step::AcquireSensor
            } else if !draft.attributes.is_complete() {
                Step::EnterDetails
            } else {
                Step::Capture
            }
        };
        info!("Resuming registration at step {}", step);

        let mut controller = Self::new(link, repository, store, bus, settings);
        controller.step = step;
        controller
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn draft(&self) -> &RegistrationDraft {
        self.store.draft()
    }

    pub fn sensor_phase(&self) -> SensorPhase {
        self.sensor.phase()
    }

    pub fn capture_phase(&self) -> CapturePhase {
        self.capture.phase()
    }

    pub fn settings(&self) -> &WizardSettings {
        &self.settings
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Cancelling this token aborts whatever device loop is running
    pub fn session_token(&self) -> CancellationToken {
        self.session.clone()
    }

    pub fn start(&mut self) -> Result<()> {
        self.advance(WizardAction::Begin)
    }

    /// Scan the goat; a timed-out scan may be called again to retry it
    pub async fn acquire_sensor(&mut self) -> Result<SensorReading> {
        self.expect_step(Step::AcquireSensor, "scan the goat")?;

        // an abandoned scan leaves the stage mid-poll; start it over
        let result = if self.sensor.phase() == SensorPhase::TimedOut {
            self.sensor.retry(&mut self.store).await
        } else {
            self.sensor.reset();
            self.sensor.run(&mut self.store).await
        };

        let reading = result?;
        self.advance(WizardAction::SensorAcquired)?;
        self.store.save_quietly().await;
        Ok(reading)
    }

    /// Back to scanning; the entered details are kept
    pub async fn retry_scan(&mut self) -> Result<()> {
        self.advance(WizardAction::RetryScan)?;
        self.store.clear_sensor_reading();
        self.sensor.reset();
        self.store.save_quietly().await;
        Ok(())
    }

    /// Store the operator's details and move on to the photos.
    ///
    /// Incomplete details are kept in the draft but block the step change.
    /// From `Capture` this edits the details without changing step.
    pub async fn submit_details(&mut self, attributes: GoatAttributes) -> Result<()> {
        if self.step != Step::Capture {
            self.expect_step(Step::EnterDetails, "submit details")?;
        }

        let missing = attributes.missing_fields();
        self.store.set_attributes(attributes);
        self.store.save_quietly().await;

        if !missing.is_empty() {
            return Err(SmartGidError::ValidationFailed { missing });
        }
        if self.step == Step::EnterDetails {
            self.advance(WizardAction::DetailsSubmitted)?;
            self.store.save_quietly().await;
        }
        Ok(())
    }

    /// Take every missing photo
    pub async fn capture(&mut self) -> Result<()> {
        self.expect_step(Step::Capture, "take photos")?;
        let result = self.capture.run(&mut self.store).await;
        self.store.save_quietly().await;
        result
    }

    pub async fn retake(&mut self) -> Result<()> {
        self.expect_step(Step::Capture, "retake photos")?;
        self.capture.retake_all(&mut self.store)?;
        self.store.save_quietly().await;
        Ok(())
    }

    /// Submit the reviewed registration and show the completion screen
    pub async fn finish(&mut self) -> Result<GoatRecord> {
        self.expect_step(Step::Capture, "finish")?;
        let record = self
            .capture
            .submit(&mut self.store, self.repository.as_ref())
            .await?;
        self.advance(WizardAction::Submitted)?;
        self.dismiss = CancellationToken::new();
        Ok(record)
    }

    /// Leave the wizard, discarding the draft. Returns `false` when the
    /// operator did not confirm; nothing changes then.
    pub async fn terminate(&mut self, confirmed: bool) -> Result<bool> {
        self.step.apply(WizardAction::Terminate)?;
        if !confirmed {
            info!("Termination not confirmed, staying at {}", self.step);
            return Ok(false);
        }

        self.session.cancel();
        self.store.clear().await?;
        self.advance(WizardAction::Terminate)?;
        self.bus.publish(WizardEvent::Terminated {
            timestamp: SystemTime::now(),
        });
        warn!("Registration terminated by operator");
        Ok(true)
    }

    /// Token that ends the completion countdown early
    pub fn dismiss_handle(&self) -> CancellationToken {
        self.dismiss.clone()
    }

    /// Count down on the completion screen, then leave the wizard
    pub async fn complete_countdown(&mut self) -> Result<CountdownOutcome> {
        self.expect_step(Step::Complete, "close the completion screen")?;
        let countdown =
            CompletionCountdown::new(self.settings.complete_countdown, self.bus.clone());
        let outcome = countdown.run(&self.dismiss).await;
        self.advance(WizardAction::Exit)?;
        Ok(outcome)
    }

    fn expect_step(&self, expected: Step, action: &str) -> Result<()> {
        if self.step == expected {
            Ok(())
        } else {
            Err(SmartGidError::invalid_transition(self.step, action))
        }
    }

    fn advance(&mut self, action: WizardAction) -> Result<()> {
        let next = self.step.apply(action)?;
        self.bus.publish(WizardEvent::StepChanged {
            from: self.step,
            to: next,
        });
        self.step = next;
        Ok(())
    }
}
