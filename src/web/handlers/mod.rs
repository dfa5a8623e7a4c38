//! API handlers for the broker service.

pub mod files;
pub mod objects;

pub use files::*;
pub use objects::*;

use crate::file::{ObjectStore, UrlSigner};

/// Application state shared across handlers.
#[derive(Debug)]
pub struct AppState {
    pub store: ObjectStore,
    pub signer: UrlSigner,
}

impl AppState {
    pub fn new(store: ObjectStore, signer: UrlSigner) -> Self {
        Self { store, signer }
    }
}

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}
