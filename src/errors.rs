//! Error types for the service pool

use crate::config::ServiceType;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed error produced by provider construction callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("No resource available in pool '{unique_name}' after waiting {waited:?}")]
    PoolExhausted {
        unique_name: String,
        waited: Duration,
    },

    #[error("No configuration found for service provider type {0}")]
    ConfigurationNotFound(ServiceType),

    #[error("No configuration advertises scope '{0}'")]
    ScopeNotFound(String),

    #[error("No pool factory or configuration reader registered for service provider type {0}")]
    UnregisteredProvider(ServiceType),

    #[error("No service provider configurations provided")]
    NoConfigurations,

    #[error("Invalid configuration section '{section}': {reason}")]
    InvalidConfiguration {
        section: String,
        reason: String,
    },

    #[error("Unique name '{0}' is used by more than one configuration")]
    DuplicateUniqueName(String),

    #[error("Failed to construct resource '{unique_name}': {source}")]
    Construction {
        unique_name: String,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Operation was cancelled")]
    Cancelled,
}

impl PoolError {
    pub(crate) fn invalid(section: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            section: section.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn construction(unique_name: impl Into<String>, source: BoxError) -> Self {
        Self::Construction {
            unique_name: unique_name.into(),
            source: Arc::from(source),
        }
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_construction_error_keeps_source() {
        let err = PoolError::construction("openai0", "endpoint refused".into());

        assert!(err.to_string().contains("openai0"));
        assert_eq!(err.source().unwrap().to_string(), "endpoint refused");

        // Cloning shares the same underlying cause
        let cloned = err.clone();
        assert_eq!(cloned.to_string(), err.to_string());
    }

    #[test]
    fn test_exhausted_reports_wait() {
        let err = PoolError::PoolExhausted {
            unique_name: "azure".to_string(),
            waited: Duration::from_millis(1500),
        };
        assert!(err.to_string().contains("1.5s"));
    }
}
