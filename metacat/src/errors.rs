use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for metadata routing operations.
///
/// This enum represents all failure categories surfaced by the metadata
/// router, the filter engine, and the backend adapters. Each kind describes a
/// specific category of failure, enabling precise error handling by callers.
///
/// Validation kinds (`UnmanagedKey`, `CrossPluginFilter`,
/// `UnsupportedMetadataPlugin`, `InvalidFilter`) are always detected before
/// any backend call is made; no partial state changes occur when they are
/// returned.
///
/// # Examples
///
/// ```rust,ignore
/// use metacat::errors::{MetaError, ErrorKind, MetaResult};
///
/// fn example() -> MetaResult<()> {
///     Err(MetaError::new("key 'color' has no owning plugin", ErrorKind::UnmanagedKey))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Routing errors
    /// A write key has no owning plugin
    UnmanagedKey,
    /// A filter's keys span more than one plugin's ownership
    CrossPluginFilter,
    /// Caller named a plugin that is not registered
    UnsupportedMetadataPlugin,

    // Operation errors
    /// Operation not implemented by the resolved plugin
    UnsupportedOperation,
    /// Delete targeted a key absent from the owning store
    KeyNotFound,
    /// The addressed entity does not exist in the owning store
    EntityNotFound,

    // Filter errors
    /// Malformed filter syntax, illegal operator/wildcard combination,
    /// bad type coercion, or duplicate clause
    InvalidFilter,
    /// Recursive flag set against a plugin that forbids it
    RecursionUnsupported,

    // Backend errors
    /// Opaque failure surfaced from a backend adapter
    BackendError,

    // Configuration errors
    /// Registry or plugin configuration is invalid
    ConfigError,

    // Data errors
    /// A value has an invalid type for the targeted key
    InvalidDataType,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::UnmanagedKey => write!(f, "Unmanaged key"),
            ErrorKind::CrossPluginFilter => write!(f, "Cross-plugin filter"),
            ErrorKind::UnsupportedMetadataPlugin => write!(f, "Unsupported metadata plugin"),
            ErrorKind::UnsupportedOperation => write!(f, "Unsupported operation"),
            ErrorKind::KeyNotFound => write!(f, "Key not found"),
            ErrorKind::EntityNotFound => write!(f, "Entity not found"),
            ErrorKind::InvalidFilter => write!(f, "Invalid filter"),
            ErrorKind::RecursionUnsupported => write!(f, "Recursion unsupported"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::ConfigError => write!(f, "Configuration error"),
            ErrorKind::InvalidDataType => write!(f, "Invalid data type"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom error type for the metadata layer.
///
/// `MetaError` encapsulates error information including the error message,
/// kind, and optional cause. It supports error chaining and backtraces for
/// debugging. Every error message carries the offending key/group/plugin
/// context sufficient to fix the request without server-side inspection.
///
/// # Examples
///
/// ```rust,ignore
/// use metacat::errors::{MetaError, ErrorKind};
///
/// let err = MetaError::new("plugin 'ELASTIC' is not registered",
///     ErrorKind::UnsupportedMetadataPlugin);
///
/// let cause = MetaError::new("connection refused", ErrorKind::BackendError);
/// let err = MetaError::new_with_cause("bulk write failed", ErrorKind::BackendError, cause);
/// ```
#[derive(Clone)]
pub struct MetaError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<MetaError>>,
    backtrace: Atomic<Backtrace>,
}

impl MetaError {
    /// Creates a new `MetaError` with the specified message and error kind.
    ///
    /// # Arguments
    ///
    /// * `message` - A description of the error
    /// * `error_kind` - The category of error
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        MetaError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `MetaError` with a cause error.
    ///
    /// This creates an error chain where the cause error is preserved for
    /// debugging.
    ///
    /// # Arguments
    ///
    /// * `message` - A description of the error
    /// * `error_kind` - The category of error
    /// * `cause` - The underlying error that caused this error
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: MetaError) -> Self {
        MetaError {
            message: message.to_string(),
            error_kind,
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

    pub fn cause(&self) -> Option<&Box<MetaError>> {
        self.cause.as_ref()
    }
}

impl Display for MetaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for MetaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for MetaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for metadata operations.
///
/// `MetaResult<T>` is shorthand for `Result<T, MetaError>`. All fallible
/// operations in this crate return this type.
pub type MetaResult<T> = Result<T, MetaError>;

// From trait implementations for automatic error conversion
impl From<std::num::ParseIntError> for MetaError {
    fn from(err: std::num::ParseIntError) -> Self {
        MetaError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::InvalidDataType,
        )
    }
}

impl From<std::num::ParseFloatError> for MetaError {
    fn from(err: std::num::ParseFloatError) -> Self {
        MetaError::new(
            &format!("Float parsing error: {}", err),
            ErrorKind::InvalidDataType,
        )
    }
}

impl From<std::fmt::Error> for MetaError {
    fn from(err: std::fmt::Error) -> Self {
        MetaError::new(
            &format!("Formatting error: {}", err),
            ErrorKind::InternalError,
        )
    }
}

impl From<serde_json::Error> for MetaError {
    fn from(err: serde_json::Error) -> Self {
        MetaError::new(
            &format!("JSON error: {}", err),
            ErrorKind::InvalidFilter,
        )
    }
}

impl From<String> for MetaError {
    fn from(msg: String) -> Self {
        MetaError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for MetaError {
    fn from(msg: &str) -> Self {
        MetaError::new(msg, ErrorKind::InternalError)
    }
}
