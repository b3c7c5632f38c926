//! Unified error types for ogmeta.
//!
//! Every variant renders with a stable code prefix so log lines can be
//! grouped without parsing the message.

use tokio_rusqlite::rusqlite;

/// Unified error type for fetch, extraction and cache operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// URL is not an absolute http(s) URL with a host.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// DNS, connect, TLS, timeout or body read failure.
    #[error("FETCH_TRANSPORT_ERROR: {0}")]
    FetchTransport(String),

    /// Server answered with a non-2xx status.
    #[error("FETCH_HTTP_ERROR: status {status}")]
    FetchHttp { status: u16 },

    /// Response is not HTML or XHTML.
    #[error("UNSUPPORTED_CONTENT_TYPE: {0}")]
    UnsupportedContentType(String),

    /// Document could not be parsed at all.
    #[error("PARSE_ERROR: {0}")]
    Parse(String),

    /// Database operation failed.
    #[error("STORAGE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("MIGRATION_FAILED: {0}")]
    MigrationFailed(String),

    /// Record violates the cache invariants (e.g. expires before it was fetched).
    #[error("INVALID_RECORD: {0}")]
    InvalidRecord(String),
}

impl Error {
    /// True for failures of the persistent store.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Database(_) | Error::MigrationFailed(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnsupportedContentType("application/pdf".to_string());
        assert!(err.to_string().contains("UNSUPPORTED_CONTENT_TYPE"));
        assert!(err.to_string().contains("application/pdf"));
    }

    #[test]
    fn test_http_error_display() {
        let err = Error::FetchHttp { status: 404 };
        assert_eq!(err.to_string(), "FETCH_HTTP_ERROR: status 404");
    }

    #[test]
    fn test_is_storage() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(err.is_storage());
        assert!(err.to_string().starts_with("STORAGE_ERROR"));
        assert!(!Error::Parse("binary".into()).is_storage());
    }
}
