//! Upload session management.

mod controller;
mod state;

pub use controller::UploadController;
pub use state::{SessionError, UploadOutcome, UploadStatus};
