// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API request failed: {0}")]
    Api(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Fieldless classification of an error, used to decide whether a retry
/// loop intercepts it or lets it propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Transport,
    Api,
    NotFound,
    Validation,
    Unknown,
}

/// Extracts an [`ErrorKind`] from an error value.
pub trait AsErrorKind {
    fn error_kind(&self) -> ErrorKind;
}

impl AsErrorKind for PollerError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            PollerError::Config(_) => ErrorKind::Config,
            PollerError::Transport(_) => ErrorKind::Transport,
            PollerError::Api(_) => ErrorKind::Api,
            PollerError::NotFound(_) => ErrorKind::NotFound,
            PollerError::Validation(_) => ErrorKind::Validation,
            PollerError::Unknown(_) => ErrorKind::Unknown,
        }
    }
}

pub type Result<T> = std::result::Result<T, PollerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            PollerError::Transport("reset".into()).error_kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            PollerError::NotFound("x".into()).error_kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            PollerError::Config("x".into()).error_kind(),
            ErrorKind::Config
        );
    }

    #[test]
    fn test_error_display() {
        let err = PollerError::NotFound("no entry matches 'boom'".into());
        assert_eq!(err.to_string(), "Not found: no entry matches 'boom'");
    }
}
