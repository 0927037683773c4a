//! services/portal/src/lib.rs
//!
//! The classroom-materials portal core: dependency-injected stores mirroring
//! the remote document collection, the role & session gate, and the
//! per-document assistant conversation manager, with REST adapters for the
//! hosted backends.

pub mod adapters;
pub mod bootstrap;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod error;
pub mod stores;

pub use bootstrap::Portal;
pub use chat::{Conversation, DocumentContext, CONTEXT_CHAR_LIMIT, SUGGESTED_PROMPTS};
pub use config::{Config, ConfigError};
pub use error::PortalError;
pub use stores::{
    LibraryStore, SessionPhase, SessionStore, UploadRequest, MAX_UPLOAD_BYTES,
    SUPPORTED_CONTENT_TYPE,
};
