//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON) or ClientConfig built in code
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig::resolve() (defaults applied)
//!     → RetrySettings (immutable, Copy) handed to every layer
//! ```
//!
//! # Design Decisions
//! - Zero means "use the default", never "no wait"
//! - Field names match the JSON tags of existing deployments
//! - Validation returns all errors, not just the first

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError, ConfigFormat};
pub use schema::{ClientConfig, RetrySettings};
pub use validation::{validate_config, ValidationError};
