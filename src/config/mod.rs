pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{ConfigError, load_config};
pub use models::*;
pub use validation::{RouteValidator, ValidationError, ValidationResult};
