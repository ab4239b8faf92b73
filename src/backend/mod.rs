mod http;
mod memory;
mod model;
pub mod names;
mod repository;

pub use http::HttpGoatRepository;
pub use memory::InMemoryGoatRepository;
pub use model::{GoatRecord, GoatUpdate, NewGoat};
pub use names::NameSuggester;
pub use repository::GoatRepository;
