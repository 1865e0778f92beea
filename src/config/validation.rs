//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges on the resolved
//! settings and reports every problem at once.

use std::fmt;

use crate::config::schema::ClientConfig;

/// Upper bound on `max_rps`; the refill interval must stay above 1µs.
pub const MAX_RPS_LIMIT: u32 = 1_000_000;

/// Upper bound on `max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 100;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Name of the offending field.
    pub field: &'static str,
    /// Human readable description.
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, returning all errors found.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let settings = config.resolve();

    if config.max_rps > MAX_RPS_LIMIT {
        errors.push(ValidationError::new(
            "max_rps",
            format!("must be at most {}, got {}", MAX_RPS_LIMIT, config.max_rps),
        ));
    }

    if config.max_retries > MAX_RETRIES_LIMIT {
        errors.push(ValidationError::new(
            "max_retries",
            format!(
                "must be at most {}, got {}",
                MAX_RETRIES_LIMIT, config.max_retries
            ),
        ));
    }

    if settings.initial_backoff > settings.max_backoff {
        errors.push(ValidationError::new(
            "initial_backoff_ms",
            format!(
                "initial backoff {:?} exceeds max backoff {:?}",
                settings.initial_backoff, settings.max_backoff
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn backoff_ordering_checked_after_defaults() {
        // 5s initial against the 2s default cap.
        let config = ClientConfig {
            initial_backoff_ms: 5_000,
            ..Default::default()
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "initial_backoff_ms");
    }

    #[test]
    fn reports_all_errors() {
        let config = ClientConfig {
            max_rps: MAX_RPS_LIMIT + 1,
            max_retries: MAX_RETRIES_LIMIT + 1,
            initial_backoff_ms: 10,
            max_backoff_ms: 5,
            timeout_secs: 0,
        };
        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["max_rps", "max_retries", "initial_backoff_ms"]);
    }
}
