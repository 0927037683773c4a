//! services/portal/src/stores/mod.rs
//!
//! The dependency-injected store objects: the class-library mirror with its
//! upload/deletion pipelines, and the role & session gate.

pub mod library;
pub mod session;

pub use library::{LibraryStore, UploadRequest, MAX_UPLOAD_BYTES, SUPPORTED_CONTENT_TYPE};
pub use session::{SessionPhase, SessionStore};
