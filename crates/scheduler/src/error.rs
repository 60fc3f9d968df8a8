//! Error information attached to failed jobs

use std::io;

/// Where a job failure originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorDomain {
    /// Filesystem and other OS-level I/O
    File,

    /// Failures reported by the document backend
    Document,
}

/// Error recorded on a job when it fails
///
/// Immutable once attached to a job; consumers read it after the "finished"
/// notification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct JobError {
    pub domain: ErrorDomain,
    pub code: i32,
    pub message: String,
}

impl JobError {
    pub fn new(domain: ErrorDomain, code: i32, message: impl Into<String>) -> Self {
        Self {
            domain,
            code,
            message: message.into(),
        }
    }

    /// Build a filesystem error, keeping the raw OS error code when there is one
    pub fn from_io(error: &io::Error, message: impl Into<String>) -> Self {
        Self::new(
            ErrorDomain::File,
            error.raw_os_error().unwrap_or(-1),
            message,
        )
    }
}

impl From<io::Error> for JobError {
    fn from(error: io::Error) -> Self {
        let message = error.to_string();
        Self::from_io(&error, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_message() {
        let error = JobError::new(ErrorDomain::Document, 3, "Document is encrypted");
        assert_eq!(error.to_string(), "Document is encrypted");
    }

    #[test]
    fn test_from_io_keeps_os_code() {
        let io_error = io::Error::from_raw_os_error(2);
        let error = JobError::from(io_error);

        assert_eq!(error.domain, ErrorDomain::File);
        assert_eq!(error.code, 2);
        assert!(!error.message.is_empty());
    }

    #[test]
    fn test_from_io_without_os_code() {
        let io_error = io::Error::new(io::ErrorKind::Other, "boom");
        let error = JobError::from_io(&io_error, "write failed: boom");

        assert_eq!(error.code, -1);
        assert_eq!(error.message, "write failed: boom");
    }
}
