//! User-visible notifications.
//!
//! Each terminal outcome of a file manager action is pushed to a
//! [`Notifier`] exactly once. The CLI logs them; a UI would show them.

use std::fmt;

use tokio::sync::mpsc;

/// An outcome the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The file was uploaded and committed.
    Uploaded { name: String },
    /// The upload was cancelled by the user.
    UploadCancelled { name: String },
    /// The upload failed (broker or transfer error).
    UploadFailed { name: String, reason: String },
    /// The object was deleted.
    Deleted { key: String },
    /// The object could not be deleted.
    DeleteFailed { key: String, reason: String },
    /// No download location could be obtained.
    DownloadFailed { key: String, reason: String },
}

impl Notification {
    /// Whether this notification reports a failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Notification::UploadFailed { .. }
                | Notification::DeleteFailed { .. }
                | Notification::DownloadFailed { .. }
        )
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::Uploaded { name } => write!(f, "File uploaded successfully: {name}"),
            Notification::UploadCancelled { name } => write!(f, "Upload cancelled: {name}"),
            Notification::UploadFailed { name, reason } => {
                write!(f, "Error uploading file {name}: {reason}")
            }
            Notification::Deleted { key } => write!(f, "File deleted successfully: {key}"),
            Notification::DeleteFailed { key, reason } => {
                write!(f, "Error deleting file {key}: {reason}")
            }
            Notification::DownloadFailed { key, reason } => {
                write!(f, "Error downloading file {key}: {reason}")
            }
        }
    }
}

/// Receives notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl Notifier for mpsc::UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        if self.send(notification).is_err() {
            tracing::debug!("notification receiver dropped");
        }
    }
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        if notification.is_failure() {
            tracing::warn!("{}", notification);
        } else {
            tracing::info!("{}", notification);
        }
    }
}
