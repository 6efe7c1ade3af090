// Centralized error handling module
// Error types with path and operation context for the mirroring engine

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Main error type for the mirroring engine
#[derive(Debug)]
pub enum MirrorError {
    /// The source root is missing at the start of a cycle
    MissingSource { path: PathBuf },

    /// Configuration values that cannot be used
    InvalidConfig { message: String },

    /// File system errors with context
    Io { path: Option<PathBuf>, operation: String, source: io::Error },

    /// The log file could not be opened
    LogFile { path: PathBuf, source: io::Error },
}

impl fmt::Display for MirrorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MirrorError::MissingSource { path } => {
                write!(f, "Source directory does not exist: {}", path.display())
            }
            MirrorError::InvalidConfig { message } => {
                write!(f, "Invalid configuration: {}", message)
            }
            // The io::Error is reported through `source()`, not repeated here
            MirrorError::Io { path, operation, .. } => {
                if let Some(p) = path {
                    write!(f, "I/O error while {} {}", operation, p.display())
                } else {
                    write!(f, "I/O error while {}", operation)
                }
            }
            MirrorError::LogFile { path, .. } => {
                write!(f, "Cannot open log file {}", path.display())
            }
        }
    }
}

impl std::error::Error for MirrorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MirrorError::Io { source, .. } => Some(source),
            MirrorError::LogFile { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl MirrorError {
    /// Create an Io error with context about the operation and optional path
    pub fn from_io_error(err: io::Error, operation: &str, path: Option<PathBuf>) -> Self {
        MirrorError::Io {
            path,
            operation: operation.to_string(),
            source: err,
        }
    }

    /// The underlying I/O error, if any
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            MirrorError::Io { source, .. } | MirrorError::LogFile { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for MirrorError {
    fn from(err: io::Error) -> Self {
        MirrorError::from_io_error(err, "unknown operation", None)
    }
}
