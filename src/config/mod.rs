mod logging;
mod settings;

pub use logging::{init_logging, LoggingError};
pub use settings::{AuthSettings, EmailValidationSettings, JwtSettings, SecuritySettings};
