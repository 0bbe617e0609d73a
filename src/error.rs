//! Error taxonomy for the pipeline.
//!
//! Every stage fails fast: the first error aborts the whole run. The variants
//! mirror the stages, so the caller can tell from the error alone how far the
//! pipeline got before stopping.

use thiserror::Error;

use crate::decode::DecodeError;

#[derive(Debug, Error)]
pub enum Error {
    /// A mandatory request field is missing or empty. Raised before any I/O.
    #[error("invalid request: {0}")]
    Input(String),

    /// The access token does not resolve to a user on the hosting platform.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Tarball download or extraction failed; no model call was made.
    #[error("snapshot acquisition failed")]
    Snapshot(#[source] anyhow::Error),

    /// The model response could not be parsed into the expected shape.
    #[error("model response could not be decoded")]
    Decode(#[from] DecodeError),

    /// Stage one produced nothing usable (empty selection, gateway failure).
    #[error("file selection stage failed")]
    Selection(#[source] anyhow::Error),

    /// Stage two produced nothing usable (invalid entries, gateway failure).
    #[error("change generation stage failed")]
    Generation(#[source] anyhow::Error),

    /// Writing decoded changes into the working directory failed.
    #[error("patch application failed")]
    Patch(#[source] anyhow::Error),

    /// A hosting-platform step of the publish sequence failed. Partial Git
    /// state (an orphan branch) may remain; see `publish`.
    #[error("publishing failed")]
    Publish(#[source] anyhow::Error),

    /// Appending to the conversation log failed. The pull request already
    /// exists at this point, so callers log this instead of failing the run.
    #[error("conversation record append failed")]
    Record(#[source] anyhow::Error),
}

impl Error {
    pub fn selection(message: impl Into<String>) -> Self {
        Error::Selection(anyhow::anyhow!(message.into()))
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Error::Generation(anyhow::anyhow!(message.into()))
    }
}
