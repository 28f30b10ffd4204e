//! Error types for stream pipelines.

use std::sync::Arc;

/// The main error type for stream pipelines.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A stage task panicked while running a user function
    #[error("Stage '{stage}' panicked: {message}")]
    StageFault { stage: String, message: String },

    /// A processor failed to transform an item; wraps whatever `process` or
    /// `finish` returned
    #[error("Processor error: {0}")]
    Processor(Arc<dyn std::error::Error + Send + Sync>),

    /// A sink failed to accept an item or to finish; wraps whatever `write`
    /// or `finish` returned
    #[error("Sink error: {0}")]
    Sink(Arc<dyn std::error::Error + Send + Sync>),

    /// The pipeline was cancelled before the operation completed
    #[error("Pipeline was cancelled")]
    Cancelled,

    /// The stream already reported its end and cannot be read again
    #[error("Stream was already consumed")]
    AlreadyConsumed,

    /// A channel was closed unexpectedly
    #[error("Channel was closed unexpectedly")]
    ChannelClosed,

    /// An operation was called with an argument it cannot work with
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),

    /// Multiple errors occurred (several stages faulted)
    #[error("Multiple errors occurred: {}", display_all(.0))]
    Multiple(Vec<Error>),
}

fn display_all(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| format!("[{}]", e))
        .collect::<Vec<_>>()
        .join(", ")
}

// Convenience constructors
impl Error {
    /// Create a processor error from any error type
    pub fn processor<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Processor(Arc::new(error))
    }

    /// Create a sink error from any error type
    pub fn sink<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Sink(Arc::new(error))
    }

    /// Create a stage fault
    pub fn stage_fault(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Error::StageFault {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    /// Fold a list of errors into one, `None` when the list is empty.
    pub(crate) fn aggregate(mut errors: Vec<Error>) -> Option<Error> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Error::Multiple(errors)),
        }
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Error {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Error::Custom(e.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Helper trait for converting errors into our Error type
pub trait IntoError<T> {
    fn into_processor_error(self) -> Result<T>;
    fn into_sink_error(self) -> Result<T>;
}

impl<T, E> IntoError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_processor_error(self) -> Result<T> {
        self.map_err(Error::processor)
    }

    fn into_sink_error(self) -> Result<T> {
        self.map_err(Error::sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate() {
        assert!(Error::aggregate(vec![]).is_none());
        assert!(matches!(
            Error::aggregate(vec![Error::Cancelled]),
            Some(Error::Cancelled)
        ));

        let many = Error::aggregate(vec![Error::custom("a"), Error::custom("b")]).unwrap();
        assert_eq!(many.to_string(), "Multiple errors occurred: [a], [b]");
    }

    #[test]
    fn test_stage_fault_display() {
        let err = Error::stage_fault("stream.map#1", "boom");
        assert_eq!(err.to_string(), "Stage 'stream.map#1' panicked: boom");
    }

    #[test]
    fn test_into_processor_error() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        let err = res.into_processor_error().unwrap_err();
        assert!(matches!(err, Error::Processor(_)));
        assert_eq!(err.to_string(), "Processor error: disk");
    }
}
