use std::time::Duration;
use thiserror::Error;

/// Failures of a single request to the sensor or camera device
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    #[error("{device} did not answer within {timeout:?}")]
    Timeout { device: String, timeout: Duration },

    #[error("{device} reported an internal error: {message}")]
    Rejected { device: String, message: String },

    #[error("{device} unreachable: {details}")]
    Transport { device: String, details: String },

    #[error("{device} sent a malformed response: {details}")]
    Malformed { device: String, details: String },

    #[error("Polling {device} was cancelled")]
    Cancelled { device: String },
}

impl DeviceError {
    pub fn transport<S: Into<String>, D: ToString>(device: S, details: D) -> Self {
        Self::Transport {
            device: device.into(),
            details: details.to_string(),
        }
    }

    pub fn malformed<S: Into<String>, D: ToString>(device: S, details: D) -> Self {
        Self::Malformed {
            device: device.into(),
            details: details.to_string(),
        }
    }

    /// Whether another attempt against the same device may succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, DeviceError::Cancelled { .. })
    }
}

/// Failures talking to the goat registry backend
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected backend response: {details}")]
    Decode { details: String },

    #[error("Backend unavailable: {details}")]
    Unavailable { details: String },
}

#[derive(Error, Debug)]
pub enum SmartGidError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("No sensor reading within {deadline:?}")]
    StageDeadlineExceeded { deadline: Duration },

    #[error("Camera failed {attempts} times on shot {slot}: {last_error}")]
    CaptureExhausted {
        slot: usize,
        attempts: u32,
        last_error: DeviceError,
    },

    #[error("Submitting the registration failed: {message}")]
    SubmitFailed { message: String },

    #[error("Missing required fields: {}", .missing.join(", "))]
    ValidationFailed { missing: Vec<&'static str> },

    #[error("Cannot {action} while in {state}")]
    InvalidTransition { state: String, action: String },

    #[error("Registration was terminated")]
    Terminated,

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl SmartGidError {
    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn invalid_transition<S: ToString, A: Into<String>>(state: S, action: A) -> Self {
        Self::InvalidTransition {
            state: state.to_string(),
            action: action.into(),
        }
    }

    /// Errors the operator can recover from with an explicit retry action
    pub fn is_recoverable(&self) -> bool {
        match self {
            SmartGidError::Device(e) => e.is_transient(),
            SmartGidError::StageDeadlineExceeded { .. }
            | SmartGidError::CaptureExhausted { .. }
            | SmartGidError::SubmitFailed { .. }
            | SmartGidError::ValidationFailed { .. }
            | SmartGidError::InvalidTransition { .. } => true,
            _ => false,
        }
    }

    /// Short message suitable for the operator console
    pub fn user_message(&self) -> String {
        match self {
            SmartGidError::StageDeadlineExceeded { deadline } => format!(
                "No tag detected in {}s. Check the goat is in the chute and press 'r' to scan again.",
                deadline.as_secs()
            ),
            SmartGidError::CaptureExhausted { slot, .. } => format!(
                "Camera did not respond for photo {}. Press 't' to restart the photo sequence.",
                slot + 1
            ),
            SmartGidError::SubmitFailed { message } => format!(
                "Could not save the goat ({}). Photos are kept, press 'f' to try again.",
                message
            ),
            SmartGidError::ValidationFailed { missing } => {
                format!("Please fill in: {}", missing.join(", "))
            }
            SmartGidError::Terminated => "Registration cancelled".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SmartGidError>;
