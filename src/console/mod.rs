mod keys;
mod prompt;
mod session;

pub use keys::{map_key, KeyboardConsole, OperatorCommand};
pub use prompt::{parse_birth_date, parse_health_tags, read_attributes, DATE_FORMAT};
pub use session::{say, RegistrationSession};
