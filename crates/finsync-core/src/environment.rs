//! Execution environment detection.
//!
//! Sync jobs only run for real in production; staging and development
//! deployments share the same queue topology but must never hit live
//! banking providers.

use crate::error::{Error, Result};

/// Deployment environment the pipeline is running in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionEnvironment {
    Production,
    Staging,
    #[default]
    Development,
}

impl ExecutionEnvironment {
    /// Read from `FINSYNC_ENV` (default: development).
    pub fn from_env() -> Self {
        match std::env::var("FINSYNC_ENV").as_deref() {
            Ok("production") => Self::Production,
            Ok("staging") => Self::Staging,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    /// Fail-fast guard for handlers that must only run in production.
    pub fn require_production(self) -> Result<()> {
        if self.is_production() {
            Ok(())
        } else {
            Err(Error::Config(format!(
                "sync jobs only run in production (current environment: {:?})",
                self
            )))
        }
    }
}

impl std::fmt::Display for ExecutionEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Staging => write!(f, "staging"),
            Self::Development => write!(f, "development"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_production() {
        assert!(ExecutionEnvironment::Production.require_production().is_ok());
        assert!(ExecutionEnvironment::Staging.require_production().is_err());
        assert!(ExecutionEnvironment::Development
            .require_production()
            .is_err());
    }

    #[test]
    fn test_guard_error_is_config() {
        let err = ExecutionEnvironment::Staging.require_production().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_display() {
        assert_eq!(ExecutionEnvironment::Production.to_string(), "production");
    }
}
