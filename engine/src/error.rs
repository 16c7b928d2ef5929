//! Error taxonomy for the reconciler and its collaborators.
//!
//! Permission loss and control loss are not errors here: they are state
//! transitions recorded in [`crate::ReconcilerState`]. What remains are
//! failures the caller has to see.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use quickproxy_types::ProxyConfigError;

/// Marker the browser puts in rejections caused by missing private-window access.
const PRIVATE_BROWSING_MARKER: &str = "private browsing";

/// Persist or load failure of the settings store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings store I/O failed at {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("settings record is malformed: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("settings record could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

/// Failure reported by the live proxy subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("proxy settings rejected: {message}")]
    Rejected { message: String },
    #[error("proxy subsystem unavailable: {0}")]
    Unavailable(String),
}

impl ProxyError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Whether the rejection was caused by missing private-window access.
    #[must_use]
    pub fn is_private_browsing(&self) -> bool {
        match self {
            Self::Rejected { message } => message
                .to_ascii_lowercase()
                .contains(PRIVATE_BROWSING_MARKER),
            Self::Unavailable(_) => false,
        }
    }
}

/// Errors surfaced to callers of the reconciler operations.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
}

/// Errors from the options editor save path.
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error(transparent)]
    Invalid(#[from] ProxyConfigError),
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error("no proxy settings have been stored yet")]
    NotInitialized,
}
