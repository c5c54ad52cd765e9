//! Error types for the Vigil core library.
//!
//! Every failure surfaced by the monitor, the caches and the error handler is a
//! [`VigilError`]. Variants carry a stable code and map onto an [`ErrorType`]
//! taxonomy that recovery strategies and the humanizer match against.
//!
//! # Error Codes Reference
//!
//! | Code Range | Category | Description |
//! |------------|----------|-------------|
//! | E1001-E1099 | Input | Validation and configuration errors |
//! | E2001-E2099 | External | Remote API, connection and timeout errors |
//! | E3001-E3099 | Files | File operation and IO errors |
//! | E4001-E4099 | Storage | Database errors |
//! | E5001-E5099 | Metrics | Host sampling and snapshot errors |
//! | E9001-E9099 | General | Internal, runtime, serialization errors |
//! | E9100 | Wrapped | Errors re-raised with handling context |

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, info, warn};

pub type VigilResult<T> = Result<T, VigilError>;

/// How loudly an error should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Context information attached to a handled error.
///
/// Records where the failure happened and what the user was doing, so the
/// wrapped error can be surfaced with enough detail to act on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Module path of the failing call site
    pub module: String,
    /// Function or method name, when known
    pub function: Option<String>,
    /// Human description of the operation being performed
    pub operation: String,
    /// Source file and line of the call site
    pub location: Option<String>,
    /// Raw user input that triggered the operation
    pub user_input: Option<String>,
    /// File the operation was working on
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_info: BTreeMap<String, serde_json::Value>,
}

impl ErrorContext {
    pub fn new(module: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            operation: operation.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, file: &'static str, line: u32) -> Self {
        self.location = Some(format!("{}:{}", file, line));
        self
    }

    pub fn in_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn with_user_input(mut self, input: impl Into<String>) -> Self {
        self.user_input = Some(input.into());
        self
    }

    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.additional_info.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.module)?;
        if let Some(ref function) = self.function {
            write!(f, "::{}", function)?;
        }
        if let Some(ref location) = self.location {
            write!(f, " at {}", location)?;
        }
        write!(f, " ({})", self.operation)
    }
}

/// Macro to create an ErrorContext at the current source location.
#[macro_export]
macro_rules! error_context {
    ($op:expr) => {
        $crate::error::ErrorContext::new(module_path!(), $op).at(file!(), line!())
    };
}

/// Classification of errors used for recovery lookup and humanizing.
///
/// Types form a tree rooted at [`ErrorType::Base`]; a strategy registered for
/// a parent type also applies to its descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    Base,
    Os,
    FileNotFound,
    PermissionDenied,
    IsADirectory,
    Connection,
    Timeout,
    Validation,
    Configuration,
    Api,
    FileOperation,
    Database,
    Metrics,
    Serialization,
    Runtime,
    Internal,
}

impl ErrorType {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorType::Base => "VigilError",
            ErrorType::Os => "OSError",
            ErrorType::FileNotFound => "FileNotFoundError",
            ErrorType::PermissionDenied => "PermissionError",
            ErrorType::IsADirectory => "IsADirectoryError",
            ErrorType::Connection => "ConnectionError",
            ErrorType::Timeout => "TimeoutError",
            ErrorType::Validation => "ValidationError",
            ErrorType::Configuration => "ConfigurationError",
            ErrorType::Api => "ApiError",
            ErrorType::FileOperation => "FileOperationError",
            ErrorType::Database => "DatabaseError",
            ErrorType::Metrics => "MetricsError",
            ErrorType::Serialization => "SerializationError",
            ErrorType::Runtime => "RuntimeError",
            ErrorType::Internal => "InternalError",
        }
    }

    pub fn parent(&self) -> Option<ErrorType> {
        match self {
            ErrorType::Base => None,
            ErrorType::FileNotFound
            | ErrorType::PermissionDenied
            | ErrorType::IsADirectory
            | ErrorType::Connection
            | ErrorType::Timeout => Some(ErrorType::Os),
            ErrorType::Metrics => Some(ErrorType::Runtime),
            _ => Some(ErrorType::Base),
        }
    }

    /// This type followed by each of its ancestors, nearest first.
    pub fn lineage(&self) -> Vec<ErrorType> {
        let mut chain = vec![*self];
        let mut current = *self;
        while let Some(parent) = current.parent() {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    pub fn is_a(&self, other: ErrorType) -> bool {
        self.lineage().contains(&other)
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The main error type for the Vigil core library.
#[derive(Debug, Error)]
pub enum VigilError {
    // ========================================================================
    // Input Errors (E1001-E1099)
    // ========================================================================
    /// Bad input shape or value
    #[error("[E1001] Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        value: Option<String>,
    },

    /// Missing or invalid setting
    #[error("[E1002] Configuration error: {message}")]
    Configuration {
        message: String,
        config_key: Option<String>,
    },

    // ========================================================================
    // External Errors (E2001-E2099)
    // ========================================================================
    /// Remote API failure
    #[error("[E2001] API error: {message}")]
    ExternalService {
        message: String,
        api_name: Option<String>,
        status_code: Option<u16>,
    },

    /// Network connection failure
    #[error("[E2002] Connection error: {0}")]
    Connection(String),

    /// Operation did not complete in time
    #[error("[E2003] Operation timed out: {0}")]
    Timeout(String),

    // ========================================================================
    // File Errors (E3001-E3099)
    // ========================================================================
    /// Path missing, wrong type or not permitted
    #[error("[E3001] File operation failed: {message}")]
    FileOperation {
        message: String,
        file_path: Option<String>,
        operation: Option<String>,
    },

    /// IO error
    #[error("[E3002] IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Storage Errors (E4001-E4099)
    // ========================================================================
    /// Database query failed
    #[error("[E4001] Database error: {0}")]
    Database(String),

    // ========================================================================
    // Metrics Errors (E5001-E5099)
    // ========================================================================
    /// Host metrics collection failed
    #[error("[E5001] Metrics collection failed: {0}")]
    MetricsCollectionFailed(String),

    /// Writing a metrics snapshot failed
    #[error("[E5002] Failed to write metrics snapshot to '{path}': {message}")]
    SnapshotFailed { path: String, message: String },

    // ========================================================================
    // General Errors (E9001-E9099)
    // ========================================================================
    /// Internal error (catch-all for unexpected conditions)
    #[error("[E9001] Internal error: {0}")]
    Internal(String),

    /// Unclassified runtime failure
    #[error("[E9002] Runtime error: {0}")]
    Runtime(String),

    /// Serialization/deserialization error
    #[error("[E9003] Serialization error: {0}")]
    Serialization(String),

    /// Operation not supported on this platform
    #[error("[E9004] Operation not supported: {0}")]
    NotSupported(String),

    // ========================================================================
    // Wrapped Errors (E9100)
    // ========================================================================
    /// An error that went through the error handler and is re-raised with context
    #[error("[E9100] {message}")]
    Contextual {
        message: String,
        severity: Severity,
        context: Box<ErrorContext>,
        recovery: Option<String>,
        #[source]
        source: Box<VigilError>,
    },
}

impl VigilError {
    pub fn validation(
        message: impl Into<String>,
        field: impl Into<String>,
        value: impl fmt::Debug,
    ) -> Self {
        VigilError::Validation {
            message: message.into(),
            field: Some(field.into()),
            value: Some(format!("{:?}", value)),
        }
    }

    pub fn configuration(message: impl Into<String>, config_key: impl Into<String>) -> Self {
        VigilError::Configuration {
            message: message.into(),
            config_key: Some(config_key.into()),
        }
    }

    pub fn api(message: impl Into<String>, api_name: Option<&str>, status_code: Option<u16>) -> Self {
        VigilError::ExternalService {
            message: message.into(),
            api_name: api_name.map(str::to_string),
            status_code,
        }
    }

    pub fn file_operation(
        message: impl Into<String>,
        file_path: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        VigilError::FileOperation {
            message: message.into(),
            file_path: Some(file_path.into()),
            operation: Some(operation.into()),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        VigilError::Runtime(message.into())
    }

    /// The taxonomy entry used for recovery lookup.
    ///
    /// Wrapped errors report the type of the error they wrap.
    pub fn error_type(&self) -> ErrorType {
        match self {
            VigilError::Validation { .. } => ErrorType::Validation,
            VigilError::Configuration { .. } => ErrorType::Configuration,
            VigilError::ExternalService { .. } => ErrorType::Api,
            VigilError::Connection(_) => ErrorType::Connection,
            VigilError::Timeout(_) => ErrorType::Timeout,
            VigilError::FileOperation { .. } => ErrorType::FileOperation,
            VigilError::Io(err) => io_error_type(err),
            VigilError::Database(_) => ErrorType::Database,
            VigilError::MetricsCollectionFailed(_) | VigilError::SnapshotFailed { .. } => {
                ErrorType::Metrics
            }
            VigilError::Internal(_) => ErrorType::Internal,
            VigilError::Runtime(_) | VigilError::NotSupported(_) => ErrorType::Runtime,
            VigilError::Serialization(_) => ErrorType::Serialization,
            VigilError::Contextual { source, .. } => source.error_type(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.error_type().name()
    }

    /// The message without the error code prefix.
    pub fn detail(&self) -> String {
        match self {
            VigilError::Validation { message, .. }
            | VigilError::Configuration { message, .. }
            | VigilError::ExternalService { message, .. }
            | VigilError::FileOperation { message, .. }
            | VigilError::Contextual { message, .. } => message.clone(),
            VigilError::Connection(m)
            | VigilError::Timeout(m)
            | VigilError::Database(m)
            | VigilError::MetricsCollectionFailed(m)
            | VigilError::Internal(m)
            | VigilError::Runtime(m)
            | VigilError::Serialization(m)
            | VigilError::NotSupported(m) => m.clone(),
            VigilError::Io(err) => err.to_string(),
            VigilError::SnapshotFailed { path, message } => format!("{}: {}", path, message),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            VigilError::Configuration { .. }
            | VigilError::ExternalService { .. }
            | VigilError::Database(_) => Severity::High,
            VigilError::Internal(_) => Severity::Critical,
            VigilError::Contextual { severity, .. } => *severity,
            _ => Severity::Medium,
        }
    }

    /// Returns the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            VigilError::Validation { .. } => "E1001",
            VigilError::Configuration { .. } => "E1002",
            VigilError::ExternalService { .. } => "E2001",
            VigilError::Connection(_) => "E2002",
            VigilError::Timeout(_) => "E2003",
            VigilError::FileOperation { .. } => "E3001",
            VigilError::Io(_) => "E3002",
            VigilError::Database(_) => "E4001",
            VigilError::MetricsCollectionFailed(_) => "E5001",
            VigilError::SnapshotFailed { .. } => "E5002",
            VigilError::Internal(_) => "E9001",
            VigilError::Runtime(_) => "E9002",
            VigilError::Serialization(_) => "E9003",
            VigilError::NotSupported(_) => "E9004",
            VigilError::Contextual { .. } => "E9100",
        }
    }

    /// Returns true if retrying the operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            VigilError::Connection(_) | VigilError::Timeout(_) => true,
            VigilError::ExternalService { status_code, .. } => {
                matches!(status_code, Some(429) | Some(500..=599))
            }
            VigilError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            VigilError::Contextual { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Returns a short suggestion for how to resolve this error.
    pub fn user_suggestion(&self) -> Option<&'static str> {
        match self {
            VigilError::Configuration { .. } => {
                Some("Check vigil.toml or the VIGIL__* environment variables")
            }
            VigilError::ExternalService {
                status_code: Some(401),
                ..
            }
            | VigilError::ExternalService {
                status_code: Some(403),
                ..
            } => Some("Check the API key in the configuration"),
            VigilError::ExternalService {
                status_code: Some(429),
                ..
            } => Some("Wait for the rate limit to reset and try again"),
            VigilError::Connection(_) => Some("Check the network connection and try again"),
            VigilError::SnapshotFailed { .. } => {
                Some("Check that the metrics directory is writable")
            }
            VigilError::Contextual { source, .. } => source.user_suggestion(),
            _ => None,
        }
    }

    /// Log this error with a level matching its severity.
    pub fn log(&self) {
        let code = self.error_code();
        let suggestion = self.user_suggestion();

        match self.severity() {
            Severity::Critical | Severity::High => error!(
                error_code = %code,
                suggestion = suggestion,
                "Error occurred: {}",
                self
            ),
            Severity::Medium => warn!(
                error_code = %code,
                suggestion = suggestion,
                "Error occurred: {}",
                self
            ),
            Severity::Low => info!(error_code = %code, "Error occurred: {}", self),
        }
    }
}

fn io_error_type(err: &std::io::Error) -> ErrorType {
    use std::io::ErrorKind;

    // EISDIR on Linux and macOS
    #[cfg(unix)]
    if err.raw_os_error() == Some(21) {
        return ErrorType::IsADirectory;
    }

    match err.kind() {
        ErrorKind::NotFound => ErrorType::FileNotFound,
        ErrorKind::PermissionDenied => ErrorType::PermissionDenied,
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected => ErrorType::Connection,
        ErrorKind::TimedOut => ErrorType::Timeout,
        _ => ErrorType::Os,
    }
}

// ============================================================================
// From trait implementations for seamless error propagation
// ============================================================================

impl From<serde_json::Error> for VigilError {
    fn from(err: serde_json::Error) -> Self {
        VigilError::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for VigilError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => {
                VigilError::Timeout("Database pool acquire timed out".to_string())
            }
            sqlx::Error::Io(io) => VigilError::Io(io),
            other => VigilError::Database(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for VigilError {
    fn from(err: config::ConfigError) -> Self {
        VigilError::Configuration {
            message: err.to_string(),
            config_key: None,
        }
    }
}

impl From<crate::config::ConfigLoadError> for VigilError {
    fn from(err: crate::config::ConfigLoadError) -> Self {
        match err {
            crate::config::ConfigLoadError::InvalidValue { key, message } => {
                VigilError::configuration(message, key)
            }
            crate::config::ConfigLoadError::Io(io) => VigilError::Io(io),
            other => VigilError::Configuration {
                message: other.to_string(),
                config_key: None,
            },
        }
    }
}

// ============================================================================
// User-friendly error formatting for CLI
// ============================================================================

/// Format an error for CLI display with its suggestion.
pub struct CliErrorDisplay<'a> {
    error: &'a VigilError,
    show_suggestion: bool,
}

impl<'a> CliErrorDisplay<'a> {
    pub fn new(error: &'a VigilError) -> Self {
        Self {
            error,
            show_suggestion: true,
        }
    }

    pub fn without_suggestion(mut self) -> Self {
        self.show_suggestion = false;
        self
    }
}

impl<'a> fmt::Display for CliErrorDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.error)?;

        if let VigilError::Contextual { context, .. } = self.error {
            writeln!(f, "  While: {}", context.operation)?;
        }

        if self.show_suggestion {
            if let Some(suggestion) = self.error.user_suggestion() {
                writeln!(f)?;
                writeln!(f, "  Suggestion: {}", suggestion)?;
            }
        }

        if self.error.is_transient() {
            writeln!(f)?;
            writeln!(f, "  This error may be temporary. Try again shortly.")?;
        }

        Ok(())
    }
}
