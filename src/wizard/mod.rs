mod controller;
mod countdown;
mod step;

pub use controller::{WizardController, WizardSettings};
pub use countdown::{CompletionCountdown, CountdownOutcome};
pub use step::{Step, WizardAction};
