//! File transfer for FileDeck.
//!
//! This module provides the client side of the byte transfer:
//! - The local file selected for upload
//! - A cancellation token shared with the executor
//! - The HTTP executor with chunk-level progress

mod cancel;
mod executor;
mod source;

pub use cancel::CancelToken;
pub use executor::{
    ignore_progress, progress_fraction, HttpTransferExecutor, ProgressFn, TransferError,
    TransferExecutor, TransferResult,
};
pub use source::{FileSource, DEFAULT_MIME_TYPE};
