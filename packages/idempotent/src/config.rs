//! Idempotency guard configuration.

use serde::Deserialize;

use crate::IdempotencyError;

/// Configuration for the idempotency guard.
///
/// Fixed once the guard is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdempotentConfig {
    /// Upper bound on candidates fetched from each pool per scan.
    pub max_retrievals: usize,
    /// Queue assumed for descriptors without an explicit queue. Guarded jobs
    /// without one are routed here, whatever the client's own fallback is.
    pub default_queue: String,
    /// Keep the scan lock until the accepted job has been persisted.
    ///
    /// When `false` the lock is released as soon as the pools have been read,
    /// which leaves a window in which two equivalent submissions can both pass.
    pub serialize_creation: bool,
}

impl Default for IdempotentConfig {
    fn default() -> Self {
        Self {
            max_retrievals: 500,
            default_queue: "default".to_string(),
            serialize_creation: true,
        }
    }
}

impl IdempotentConfig {
    /// Default configuration with environment overrides.
    ///
    /// Reads `IDEMPOTENT_MAX_RETRIEVALS` and `IDEMPOTENT_DEFAULT_QUEUE`.
    pub fn from_env() -> Result<Self, IdempotencyError> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("IDEMPOTENT_MAX_RETRIEVALS") {
            config.max_retrievals = value.trim().parse().map_err(|e| {
                IdempotencyError::InvalidConfig(format!(
                    "IDEMPOTENT_MAX_RETRIEVALS={}: {}",
                    value, e
                ))
            })?;
        }

        if let Ok(value) = std::env::var("IDEMPOTENT_DEFAULT_QUEUE") {
            config.default_queue = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the per-pool scan bound.
    pub fn with_max_retrievals(mut self, max_retrievals: usize) -> Self {
        self.max_retrievals = max_retrievals;
        self
    }

    /// Set the queue for descriptors without one. Guarded jobs are also
    /// stored there.
    pub fn with_default_queue(mut self, queue: impl Into<String>) -> Self {
        self.default_queue = queue.into();
        self
    }

    /// See [`serialize_creation`](Self::serialize_creation).
    pub fn with_serialize_creation(mut self, serialize: bool) -> Self {
        self.serialize_creation = serialize;
        self
    }

    /// Reject a zero scan bound or an empty default queue.
    pub fn validate(&self) -> Result<(), IdempotencyError> {
        if self.max_retrievals == 0 {
            return Err(IdempotencyError::InvalidConfig(
                "max_retrievals must be positive".into(),
            ));
        }
        if self.default_queue.trim().is_empty() {
            return Err(IdempotencyError::InvalidConfig(
                "default_queue must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn defaults() {
        let config = IdempotentConfig::default();
        assert_eq!(config.max_retrievals, 500);
        assert_eq!(config.default_queue, "default");
        assert!(config.serialize_creation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_invalid_values() {
        let zero = IdempotentConfig::default().with_max_retrievals(0);
        assert!(matches!(
            zero.validate(),
            Err(IdempotencyError::InvalidConfig(_))
        ));

        let blank = IdempotentConfig::default().with_default_queue("  ");
        assert!(matches!(
            blank.validate(),
            Err(IdempotencyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: IdempotentConfig =
            serde_json::from_str(r#"{"max_retrievals": 100}"#).unwrap();
        assert_eq!(config.max_retrievals, 100);
        assert_eq!(config.default_queue, "default");
        assert!(config.serialize_creation);
    }
}
