use crate::error::{Result, SmartGidError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Screen of the registration wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Start,
    AcquireSensor,
    EnterDetails,
    Capture,
    Complete,
    /// The wizard was left, either after completion or by termination
    Exited,
}

/// Operator or stage action that moves the wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardAction {
    Begin,
    SensorAcquired,
    /// Go back to scanning, keeping the entered details
    RetryScan,
    DetailsSubmitted,
    Submitted,
    Terminate,
    Exit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Start => "start",
            Step::AcquireSensor => "acquire_sensor",
            Step::EnterDetails => "enter_details",
            Step::Capture => "capture",
            Step::Complete => "complete",
            Step::Exited => "exited",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for WizardAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WizardAction::Begin => "begin",
            WizardAction::SensorAcquired => "accept the sensor reading",
            WizardAction::RetryScan => "retry the scan",
            WizardAction::DetailsSubmitted => "submit details",
            WizardAction::Submitted => "complete the registration",
            WizardAction::Terminate => "terminate",
            WizardAction::Exit => "exit",
        };
        write!(f, "{}", name)
    }
}

impl Step {
    /// Next step for `action`, or `InvalidTransition`
    pub fn apply(self, action: WizardAction) -> Result<Step> {
        use Step::*;
        use WizardAction::*;

        let next = match (self, action) {
            (Start, Begin) => AcquireSensor,
            (AcquireSensor, SensorAcquired) => EnterDetails,
            (EnterDetails, RetryScan) => AcquireSensor,
            (EnterDetails, DetailsSubmitted) => Capture,
            (Capture, Submitted) => Complete,
            (Complete, Exit) => Exited,
            (Complete | Exited, Terminate) => {
                return Err(SmartGidError::invalid_transition(self, action.to_string()))
            }
            (_, Terminate) => Exited,
            _ => return Err(SmartGidError::invalid_transition(self, action.to_string())),
        };
        Ok(next)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, Step::Complete | Step::Exited)
    }

    /// 1-based position shown to the operator, `None` outside the main flow
    pub fn position(self) -> Option<(usize, usize)> {
        let index = match self {
            Step::Start => 1,
            Step::AcquireSensor => 2,
            Step::EnterDetails => 3,
            Step::Capture => 4,
            Step::Complete => 5,
            Step::Exited => return None,
        };
        Some((index, 5))
    }
}
