//! Upload session states.

use crate::transfer::{CancelToken, FileSource};
use crate::FileDeckError;

/// Internal state of an upload session.
///
/// Per-state data lives in the variants, so "transferring without a file"
/// or "a token without a transfer" cannot be expressed.
#[derive(Debug)]
pub(crate) enum SessionState {
    NoFileSelected,
    FileSelected(FileSource),
    /// Waiting for the write location; the token already exists so the
    /// user can abort before any byte moves.
    Preparing { name: String, cancel: CancelToken },
    Transferring {
        name: String,
        progress: f64,
        cancel: CancelToken,
    },
}

impl SessionState {
    pub(crate) fn status(&self) -> UploadStatus {
        match self {
            SessionState::NoFileSelected => UploadStatus::NoFileSelected,
            SessionState::FileSelected(source) => UploadStatus::FileSelected {
                name: source.name().to_string(),
                size: source.len(),
            },
            SessionState::Preparing { name, .. } => UploadStatus::Preparing { name: name.clone() },
            SessionState::Transferring { name, progress, .. } => UploadStatus::Transferring {
                name: name.clone(),
                progress: *progress,
            },
        }
    }

    pub(crate) fn cancel_token(&self) -> Option<&CancelToken> {
        match self {
            SessionState::Preparing { cancel, .. } | SessionState::Transferring { cancel, .. } => {
                Some(cancel)
            }
            _ => None,
        }
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.cancel_token().is_some()
    }
}

/// Observable snapshot of an upload session.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadStatus {
    NoFileSelected,
    FileSelected { name: String, size: u64 },
    Preparing { name: String },
    Transferring { name: String, progress: f64 },
}

impl UploadStatus {
    /// Progress percentage; 0 unless transferring.
    pub fn progress(&self) -> f64 {
        match self {
            UploadStatus::Transferring { progress, .. } => *progress,
            _ => 0.0,
        }
    }

    /// Whether a transfer is being prepared or running.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            UploadStatus::Preparing { .. } | UploadStatus::Transferring { .. }
        )
    }
}

/// How a started transfer settled.
#[derive(Debug)]
pub enum UploadOutcome {
    Uploaded { name: String, size: u64 },
    Cancelled { name: String },
    Failed { name: String, error: FileDeckError },
}

impl UploadOutcome {
    pub fn name(&self) -> &str {
        match self {
            UploadOutcome::Uploaded { name, .. }
            | UploadOutcome::Cancelled { name }
            | UploadOutcome::Failed { name, .. } => name,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self, UploadOutcome::Uploaded { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadOutcome::Cancelled { .. })
    }
}

/// Calls that are not valid in the session's current state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// `start_transfer` without a selected file.
    #[error("no file selected")]
    NoFileSelected,

    /// A transfer is already being prepared or running.
    #[error("a transfer is already in progress")]
    TransferInProgress,
}
