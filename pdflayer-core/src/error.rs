//! Error taxonomy
//!
//! Every failure is surfaced to the immediate caller. Errors are `Clone`
//! because a settled engine resolution is shared by every caller that
//! joined it.

use std::sync::Arc;
use thiserror::Error;

/// Boxed error returned by host-supplied loaders and engines
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared cause attached to an [`Error`]
pub type Cause = Arc<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The default bundled engine could not be loaded
    #[error("document engine is not available: {message}")]
    EngineUnavailable {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    /// A custom engine loader failed or produced an unusable value
    #[error("engine resolution failed: {message}")]
    EngineResolution {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    /// Page number outside `[1, num_pages]`
    #[error("invalid page number {page}, must be between 1 and {num_pages}")]
    PageOutOfRange { page: u32, num_pages: u32 },

    /// Drawing surface dimensions must both be positive
    #[error("invalid surface dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The drawing surface was never created or has been destroyed
    #[error("drawing surface is not initialized")]
    SurfaceNotInitialized,

    /// A browser or native graphics capability is required but absent
    #[error("unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    /// The engine failed while opening or reading a document
    #[error("engine error: {message}")]
    Engine {
        message: String,
        #[source]
        source: Option<Cause>,
    },

    /// Encoding a rendered surface failed
    #[error("encode error: {0}")]
    Encode(String),

    /// Configuration could not be read or parsed
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn engine(message: impl Into<String>) -> Self {
        Error::Engine {
            message: message.into(),
            source: None,
        }
    }

    pub fn engine_with_source(message: impl Into<String>, source: BoxError) -> Self {
        Error::Engine {
            message: message.into(),
            source: Some(Arc::from(source)),
        }
    }

    pub fn unavailable(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Error::EngineUnavailable {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    pub fn resolution(message: impl Into<String>, source: Option<BoxError>) -> Self {
        Error::EngineResolution {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::UnsupportedEnvironment(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_resolution_error_keeps_cause() {
        let cause: BoxError = "loader exploded".into();
        let err = Error::resolution("custom loader failed", Some(cause));

        assert!(err.to_string().contains("custom loader failed"));
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("loader exploded"));
    }

    #[test]
    fn test_page_out_of_range_message() {
        let err = Error::PageOutOfRange { page: 3, num_pages: 2 };
        assert_eq!(err.to_string(), "invalid page number 3, must be between 1 and 2");
    }
}
