use thiserror::Error;

use crate::gate::CidrParseError;

/// Startup and configuration failures.
///
/// Nothing on the request path returns these: gate evaluation converts every
/// problem into a decision, and rotation converts fetch failures into a
/// logged warning.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid allow-list rule: {0}")]
    InvalidRule(#[from] CidrParseError),

    #[error("Failed to initialize secret source: {0}")]
    SecretSourceInit(String),
}

impl AppError {
    /// BSD sysexits code for this failure.
    pub fn exit_code(&self) -> exitcode::ExitCode {
        match self {
            AppError::ConfigError(_) | AppError::InvalidRule(_) => exitcode::CONFIG,
            AppError::SecretSourceInit(_) => exitcode::UNAVAILABLE,
        }
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            AppError::ConfigError("x".to_string()).exit_code(),
            exitcode::CONFIG
        );
        assert_eq!(
            AppError::InvalidRule(CidrParseError::InvalidPrefix {
                rule: "1.2.3.4/99".to_string()
            })
            .exit_code(),
            exitcode::CONFIG
        );
        assert_eq!(
            AppError::SecretSourceInit("x".to_string()).exit_code(),
            exitcode::UNAVAILABLE
        );
    }

    #[test]
    fn test_invalid_rule_message_names_rule() {
        let err: AppError = CidrParseError::InvalidAddress {
            rule: "300.1.1.1".to_string(),
        }
        .into();
        assert!(err.to_string().contains("300.1.1.1"));
    }
}
