pub mod backend;
pub mod capture;
pub mod config;
pub mod console;
pub mod device;
pub mod draft;
pub mod error;
pub mod events;
pub mod sensor;
pub mod wizard;

pub use backend::{GoatRecord, GoatRepository, HttpGoatRepository, InMemoryGoatRepository};
pub use capture::{CapturePhase, CapturePolicy, CaptureSequenceStage};
pub use config::SmartGidConfig;
pub use device::{DeviceLink, ImagePayload, SensorReading};
pub use draft::{GoatAttributes, RegistrationDraft, RegistrationDraftStore};
pub use error::{BackendError, DeviceError, Result, SmartGidError};
pub use events::{EventBus, EventFilter, EventReceiver, WizardEvent};
pub use sensor::{SensorAcquisitionStage, SensorPhase};
pub use wizard::{Step, WizardController, WizardSettings};
