use thiserror::Error;

/// HTTP error classification
#[derive(Error, Debug, Clone)]
pub enum HttpErrorKind {
    #[error("Client error: {message}")]
    Client { message: String },
    #[error("Server error: {message}")]
    Server { message: String },
}

/// Snapshot and extraction errors.
///
/// Everything in here is a transient failure: the tick is skipped and the
/// next scheduled tick retries from scratch.
#[derive(Error, Debug, Clone)]
pub enum SnapshotError {
    #[error("Snapshot acquisition timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("Snapshot missing expected structure: {0}")]
    MissingStructure(String),
    #[error("Snapshot could not be decoded: {0}")]
    Decode(String),
}

/// Main crate error type
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// HTTP error with status code and classification
    #[error("HTTP error (status {status}): {kind}")]
    Http { status: u16, kind: HttpErrorKind },

    /// Transport-level request error (connect refused, reset, DNS)
    #[error("Generic request error: {0}")]
    GenericRequest(String),

    /// Snapshot acquisition or extraction failure
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Configuration rejected during validation
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The rendering collaborator could not be reached at startup
    #[error("Startup failure: {0}")]
    Startup(String),
}

impl Error {
    /// Create an HTTP client error
    pub fn client_error(status: u16, message: String) -> Self {
        Error::Http {
            status,
            kind: HttpErrorKind::Client { message },
        }
    }

    /// Create an HTTP server error
    pub fn server_error(status: u16, message: String) -> Self {
        Error::Http {
            status,
            kind: HttpErrorKind::Server { message },
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Whether a poll tick that hit this error should simply be retried on
    /// the next schedule.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Error::Config(_) | Error::Startup(_))
    }

    /// Whether this error is a snapshot acquisition timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Snapshot(SnapshotError::Timeout { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(Error::server_error(503, "busy".into()).is_transient());
        assert!(Error::GenericRequest("reset".into()).is_transient());
        assert!(Error::from(SnapshotError::Timeout { timeout_ms: 10 }).is_transient());
        assert!(!Error::config("bad").is_transient());
        assert!(!Error::Startup("down".into()).is_transient());
    }

    #[test]
    fn test_timeout_detection() {
        assert!(Error::from(SnapshotError::Timeout { timeout_ms: 10 }).is_timeout());
        assert!(!Error::from(SnapshotError::Decode("eof".into())).is_timeout());
    }

    #[test]
    fn test_display() {
        let err = Error::client_error(404, "not found".into());
        assert_eq!(
            err.to_string(),
            "HTTP error (status 404): Client error: not found"
        );
    }
}
