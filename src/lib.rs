//! FileDeck - signed-URL file manager
//!
//! A client for uploading files through one-time signed locations, with
//! progress reporting and cancellation, a registry view over the object
//! store, and a small broker service backed by local disk.

pub mod client;
pub mod config;
pub mod error;
pub mod file;
pub mod logging;
pub mod notify;
pub mod session;
pub mod transfer;
pub mod upload;
pub mod web;

pub use client::{
    ApiClient, BrokerError, HttpBroker, ObjectRegistry, RegistryError, SignedLocation,
    SignedUrlBroker,
};
pub use config::Config;
pub use error::{FileDeckError, Result};
pub use file::FileObject;
pub use notify::{LogNotifier, Notification, Notifier};
pub use session::{CurrentSession, SessionProvider, SharedSession};
pub use transfer::{
    CancelToken, FileSource, HttpTransferExecutor, TransferError, TransferExecutor,
};
pub use upload::{SessionError, UploadController, UploadOutcome, UploadStatus};
