//! Broker and object-store HTTP service.
//!
//! Implements the broker API the client talks to (`/api/upload`,
//! `/api/files`) plus the signed `/objects/*key` locations it issues, on
//! top of the local-disk [`crate::file::ObjectStore`].

pub mod cors;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
