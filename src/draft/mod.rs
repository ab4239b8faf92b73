mod model;
mod store;
#[cfg(test)]
mod tests;

pub use model::{
    CapturedImage, Gender, GoatAttributes, ImageSequence, RegistrationDraft, KNOWN_BREEDS,
};
pub use store::RegistrationDraftStore;
