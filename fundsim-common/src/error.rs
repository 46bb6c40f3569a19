//! File and payload errors shared by fundsim services.
//!
//! Loading NAV histories from disk fails in one of two ways, either the file
//! cannot be read or its JSON cannot be decoded. Both carry the path being
//! processed through [`ResultExt::context`], and callers look through the
//! context with [`Error::root`] to classify the failure.

use thiserror::Error;

/// Result type alias using the shared error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An inner failure annotated with what was being done
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error beneath any number of context layers.
    pub fn root(&self) -> &Error {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the underlying file does not exist.
    pub fn is_missing_file(&self) -> bool {
        matches!(self.root(), Self::Io(io) if io.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Attach context while converting into [`Error`].
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}
