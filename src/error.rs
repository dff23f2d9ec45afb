//! Error types shared by the detection pipeline.
//!
//! Each stage returns a [`Result`] carrying an [`AuditError`]. Nothing is
//! retried; the binary logs whatever reaches the top and writes no output.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of one pipeline stage.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Credentials could not be resolved or the API client could not be built.
    #[error("setup failed: {0}")]
    Setup(String),

    /// A detection option is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The log-query API returned an error while paginating.
    #[error("failed to fetch authentication log page {page}")]
    Fetch {
        page: usize,
        #[source]
        source: BoxError,
    },

    /// An event record is missing a required field or has the wrong type.
    #[error("unexpected event shape: {0}")]
    DataShape(String),

    /// Nothing survived the multi-location filter, so there is nothing to
    /// compare and nothing to write.
    #[error("no users logged in from more than one location in the lookback window")]
    NoMultiLocationUsers,

    /// Writing the review file or flag export failed.
    #[error("failed to write results to {path}")]
    Sink {
        path: String,
        #[source]
        source: BoxError,
    },
}

impl AuditError {
    pub fn fetch(page: usize, source: impl Into<BoxError>) -> Self {
        Self::Fetch {
            page,
            source: source.into(),
        }
    }

    pub fn sink(path: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Sink {
            path: path.into(),
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
