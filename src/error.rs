//! Custom error types for the application.
//!
//! `PsuError` is the single error type used across the library. Exchange
//! failures (`PortUnavailable`, `Timeout`, `EmptyResponse`, `Decode`, `Io`)
//! are produced while talking to the instrument and are folded into a
//! [`Reading::Failed`](crate::instrument::Reading) at the query boundary, so
//! they never escape a query. The remaining variants cover configuration,
//! port enumeration and operator input.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, PsuError>;

#[derive(Error, Debug)]
pub enum PsuError {
    #[error("could not open {port}: {reason}")]
    PortUnavailable { port: String, reason: String },

    #[error("timeout")]
    Timeout,

    #[error("empty response")]
    EmptyResponse,

    #[error("invalid response encoding: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Failed to enumerate serial ports: {0}")]
    Enumeration(String),

    #[error("Input closed before a valid answer was given")]
    InputClosed,

    #[error("Serial support not enabled. Rebuild with --features instrument_serial")]
    SerialFeatureDisabled,
}

impl PsuError {
    /// Map an I/O error from a live link onto the exchange taxonomy.
    pub fn from_link(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => PsuError::Timeout,
            _ => PsuError::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PsuError::PortUnavailable {
            port: "/dev/ttyUSB0".to_string(),
            reason: "No such file or directory".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "could not open /dev/ttyUSB0: No such file or directory"
        );
        assert_eq!(PsuError::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_timed_out_maps_to_timeout() {
        let err = PsuError::from_link(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "Operation timed out",
        ));
        assert!(matches!(err, PsuError::Timeout));

        let err = PsuError::from_link(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "gone",
        ));
        assert!(matches!(err, PsuError::Io(_)));
    }
}
