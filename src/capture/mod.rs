mod sequence;
mod stage;
#[cfg(test)]
mod tests;

pub use sequence::{CapturePhase, CapturePolicy, ShotAttempt, ShotDecision};
pub use stage::CaptureSequenceStage;
