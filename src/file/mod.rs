//! Stored objects and the local object store behind the broker service.

mod object;
mod signer;
mod storage;

pub use object::FileObject;
pub use signer::{SignatureError, SignedMethod, SignedParams, UrlSigner, OBJECTS_PATH};
pub use storage::{ObjectStore, StoredMeta, MAX_STORED_NAME_LENGTH};
