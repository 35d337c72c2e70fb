//! Error types for kernelplan

use thiserror::Error;

/// Result type alias for kernelplan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for kernelplan
///
/// Every variant is terminal for a build invocation: nothing downstream of a
/// failed stage runs, and no partial plan is produced.
#[derive(Error, Debug)]
pub enum Error {
    /// Neither a CUDA nor a ROCm runtime could be found
    #[error("No accelerator available: {0}")]
    NoAcceleratorFound(String),

    /// An installed device is below the minimum supported generation
    #[error("Unsupported hardware: device {index} has compute capability {code}, minimum supported is {minimum}")]
    UnsupportedHardware {
        /// Device index as reported by the runtime
        index: usize,
        /// Compute capability code of the offending device
        code: u32,
        /// Minimum supported code
        minimum: u32,
    },

    /// An explicit override contradicts what the host runtime reports
    #[error("Inconsistent override: {0}")]
    InconsistentOverride(String),

    /// Invalid build configuration
    #[error("Invalid build configuration: {0}")]
    InvalidConfig(String),

    /// Toolchain query failed
    #[error("Toolchain error: {0}")]
    Toolchain(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        /// What was being attempted
        context: String,
        /// Underlying error
        source: Box<Error>,
    },
}

impl Error {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }

    /// The innermost error, with all context layers removed
    pub fn root(&self) -> &Error {
        match self {
            Error::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if no accelerator runtime was found
    pub fn is_no_accelerator(&self) -> bool {
        matches!(self.root(), Error::NoAcceleratorFound(_))
    }

    /// Check if an installed device was rejected
    pub fn is_unsupported_hardware(&self) -> bool {
        matches!(self.root(), Error::UnsupportedHardware { .. })
    }

    /// Check if an override contradicted the detected runtime
    pub fn is_inconsistent_override(&self) -> bool {
        matches!(self.root(), Error::InconsistentOverride(_))
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context() {
        let err = Error::NoAcceleratorFound("nvcc not found".to_string());
        let with_ctx = err.with_context("probing accelerator runtime");

        match &with_ctx {
            Error::WithContext { context, source } => {
                assert_eq!(context, "probing accelerator runtime");
                assert!(matches!(**source, Error::NoAcceleratorFound(_)));
            }
            _ => panic!("Expected WithContext error"),
        }
        assert!(with_ctx.is_no_accelerator());
    }

    #[test]
    fn test_error_checks() {
        let hw = Error::UnsupportedHardware {
            index: 1,
            code: 70,
            minimum: 75,
        };
        assert!(hw.is_unsupported_hardware());
        assert!(!hw.is_no_accelerator());
        assert!(Error::InconsistentOverride("rocm".into()).is_inconsistent_override());
    }

    #[test]
    fn test_unsupported_hardware_message() {
        let err = Error::UnsupportedHardware {
            index: 0,
            code: 61,
            minimum: 75,
        };
        assert_eq!(
            err.to_string(),
            "Unsupported hardware: device 0 has compute capability 61, minimum supported is 75"
        );
    }

    #[test]
    fn test_io_result_context() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = res.context("reading README.md").unwrap_err();
        assert!(err.to_string().starts_with("reading README.md: I/O error"));
    }
}
