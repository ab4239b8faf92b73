mod stage;

pub use stage::{AcquisitionAttempt, SensorAcquisitionStage, SensorPhase};
