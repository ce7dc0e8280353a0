use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::{atomic, Atomic};

/// Error kinds for corral operations.
///
/// Each kind names a category of failure so callers can react to the
/// category without parsing the message text.
///
/// # Examples
///
/// ```rust,ignore
/// use corral::errors::{CorralError, ErrorKind, CorralResult};
///
/// fn example() -> CorralResult<()> {
///     Err(CorralError::new("collection is locked", ErrorKind::InvalidState))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// A handle refers to an entity that is gone or was never registered
    InvalidReference,
    /// The requested entity or collection was not found
    NotFound,
    /// An admission gate vetoed the entity
    AdmissionRejected,
    /// The operation is not allowed in the current state (e.g. while locked)
    InvalidState,
    /// The operation is not valid for this target
    InvalidOperation,
    /// Input data could not be parsed
    ParseError,
    /// Generic IO error
    IOError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidReference => write!(f, "Invalid reference"),
            ErrorKind::NotFound => write!(f, "Not found"),
            ErrorKind::AdmissionRejected => write!(f, "Admission rejected"),
            ErrorKind::InvalidState => write!(f, "Invalid state"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::ParseError => write!(f, "Parse error"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom corral error type.
///
/// `CorralError` carries the error message, kind and optional cause.
/// It supports error chaining and backtraces for debugging.
///
/// # Examples
///
/// ```rust,ignore
/// use corral::errors::{CorralError, ErrorKind};
///
/// // Create a simple error
/// let err = CorralError::new("collection not found", ErrorKind::NotFound);
///
/// // Create an error with a cause
/// let cause = CorralError::new("IO failed", ErrorKind::IOError);
/// let err = CorralError::new_with_cause("load failed", ErrorKind::ParseError, cause);
/// ```
///
/// # Type alias
///
/// The `CorralResult<T>` type alias is equivalent to `Result<T, CorralError>` and is
/// used throughout the codebase for operations that can fail.
#[derive(Clone)]
pub struct CorralError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<CorralError>>,
    backtrace: Atomic<Backtrace>,
}

impl CorralError {
    /// Creates a new `CorralError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        CorralError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `CorralError` with a cause error.
    ///
    /// This creates an error chain where the cause error is preserved for debugging.
    pub fn new_with_cause(message: &str, error_type: ErrorKind, cause: CorralError) -> Self {
        CorralError {
            message: message.to_string(),
            error_kind: error_type,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&Box<CorralError>> {
        self.cause.as_ref()
    }
}

impl Display for CorralError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for CorralError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for CorralError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for corral operations.
///
/// `CorralResult<T>` is shorthand for `Result<T, CorralError>`.
/// All fallible corral operations return this type.
pub type CorralResult<T> = Result<T, CorralError>;

// From trait implementations for automatic error conversion
impl From<std::io::Error> for CorralError {
    fn from(err: std::io::Error) -> Self {
        let error_kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            _ => ErrorKind::IOError,
        };
        CorralError::new(&format!("IO error: {}", err), error_kind)
    }
}

#[cfg(feature = "serde")]
impl From<serde_json::Error> for CorralError {
    fn from(err: serde_json::Error) -> Self {
        CorralError::new(&format!("JSON error: {}", err), ErrorKind::ParseError)
    }
}

impl From<String> for CorralError {
    fn from(msg: String) -> Self {
        CorralError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for CorralError {
    fn from(msg: &str) -> Self {
        CorralError::new(msg, ErrorKind::InternalError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corral_error_new_creates_error() {
        let error = CorralError::new("An error occurred", ErrorKind::IOError);
        assert_eq!(error.message, "An error occurred");
        assert_eq!(error.error_kind, ErrorKind::IOError);
        assert!(error.cause.is_none());
    }

    #[test]
    fn corral_error_new_with_cause_creates_error() {
        let cause = CorralError::new("row 3 is malformed", ErrorKind::ParseError);
        let error = CorralError::new_with_cause("load failed", ErrorKind::ParseError, cause);
        assert_eq!(error.message, "load failed");
        assert_eq!(error.error_kind, ErrorKind::ParseError);
        assert!(error.cause.is_some());
    }

    #[test]
    fn corral_error_accessors() {
        let error = CorralError::new("collection is locked", ErrorKind::InvalidState);
        assert_eq!(error.message(), "collection is locked");
        assert_eq!(error.kind(), &ErrorKind::InvalidState);
        assert!(error.cause().is_none());
    }

    #[test]
    fn corral_error_display_formats_correctly() {
        let error = CorralError::new("An error occurred", ErrorKind::IOError);
        let formatted = format!("{}", error);
        assert_eq!(formatted, "An error occurred");
    }

    #[test]
    fn corral_error_debug_formats_with_cause() {
        let cause = CorralError::new("inner failure", ErrorKind::IOError);
        let error = CorralError::new_with_cause("An error occurred", ErrorKind::IOError, cause);
        let formatted = format!("{:?}", error);
        assert!(formatted.contains("An error occurred"));
        assert!(formatted.contains("Caused by:"));
    }

    #[test]
    fn corral_error_source_returns_cause() {
        let cause = CorralError::new("inner failure", ErrorKind::IOError);
        let error = CorralError::new_with_cause("An error occurred", ErrorKind::IOError, cause);
        assert!(error.source().is_some());

        let plain = CorralError::new("no cause", ErrorKind::NotFound);
        assert!(plain.source().is_none());
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(
            format!("{}", ErrorKind::AdmissionRejected),
            "Admission rejected"
        );
        assert_eq!(format!("{}", ErrorKind::InvalidReference), "Invalid reference");
        assert_eq!(format!("{}", ErrorKind::NotFound), "Not found");
        assert_eq!(format!("{}", ErrorKind::InvalidState), "Invalid state");
    }

    #[test]
    fn test_error_chain_with_different_kinds() {
        let root_cause = CorralError::new("File not found", ErrorKind::NotFound);
        let mid_level =
            CorralError::new_with_cause("Failed to read data", ErrorKind::IOError, root_cause);
        let top_level =
            CorralError::new_with_cause("Cannot load collection", ErrorKind::ParseError, mid_level);

        assert_eq!(top_level.kind(), &ErrorKind::ParseError);
        assert!(top_level.cause().is_some());

        if let Some(cause_box) = top_level.cause() {
            assert_eq!(cause_box.kind(), &ErrorKind::IOError);
        }
    }

    #[test]
    fn test_from_io_error_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let corral_err: CorralError = io_err.into();

        assert_eq!(corral_err.kind(), &ErrorKind::NotFound);
        assert!(corral_err.message().contains("IO error"));
    }

    #[test]
    fn test_from_io_error_other() {
        let io_err = std::io::Error::other("unknown io error");
        let corral_err: CorralError = io_err.into();

        assert_eq!(corral_err.kind(), &ErrorKind::IOError);
        assert!(corral_err.message().contains("IO error"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let corral_err: CorralError = json_err.into();

        assert_eq!(corral_err.kind(), &ErrorKind::ParseError);
        assert!(corral_err.message().contains("JSON error"));
    }

    #[test]
    fn test_from_string() {
        let msg = String::from("test error message");
        let corral_err: CorralError = msg.into();

        assert_eq!(corral_err.kind(), &ErrorKind::InternalError);
        assert_eq!(corral_err.message(), "test error message");
    }

    #[test]
    fn test_from_str() {
        let corral_err: CorralError = "test error message".into();

        assert_eq!(corral_err.kind(), &ErrorKind::InternalError);
        assert_eq!(corral_err.message(), "test error message");
    }

    #[test]
    fn test_question_mark_operator_with_from() {
        fn operation_that_fails_with_io() -> CorralResult<String> {
            let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
            Err(io_err)?
        }

        let result = operation_that_fails_with_io();
        assert!(result.is_err());

        if let Err(err) = result {
            assert_eq!(err.kind(), &ErrorKind::NotFound);
        }
    }
}
