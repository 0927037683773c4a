//! crates/studyhall_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of the hosted backends (document database, blob
//! storage, identity provider, generative-language API).

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::domain::{
    Announcement, AnnouncementDraft, ClassMembers, DocumentDraft, DocumentRecord,
    ExtractedContent, Identity, UserProfile, UserRole,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., the
/// metadata store, blob storage, or the identity provider's REST surface).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A live stream of full-collection snapshots, newest record first.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = PortResult<Vec<DocumentRecord>>> + Send>>;

/// A stream of session-change events carrying the current identity or none.
pub type SessionStream = Pin<Box<dyn Stream<Item = Option<Identity>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The remote collection of document metadata records.
///
/// The store is the source of truth: identifiers are assigned on `create`,
/// and `subscribe` delivers authoritative snapshots that local mirrors are
/// reconciled to.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Opens a live subscription ordered by creation date descending.
    async fn subscribe(&self) -> PortResult<SnapshotStream>;

    /// Persists a new record and returns it with its store-assigned id.
    async fn create_document(&self, draft: DocumentDraft) -> PortResult<DocumentRecord>;

    async fn delete_document(&self, id: &str) -> PortResult<()>;
}

/// The class-stream backend: announcements and the per-class member roster.
#[async_trait]
pub trait ClassStreamStore: Send + Sync {
    /// Fetches every announcement, newest first.
    async fn list_announcements(&self) -> PortResult<Vec<Announcement>>;

    /// Persists a new announcement and returns it with its store-assigned id.
    async fn create_announcement(&self, draft: AnnouncementDraft) -> PortResult<Announcement>;

    async fn delete_announcement(&self, id: &str) -> PortResult<()>;

    /// The roster of one class group. `Ok(None)` when no roster record
    /// exists for the class.
    async fn fetch_members(&self, class_id: &str) -> PortResult<Option<ClassMembers>>;
}

/// The per-identity profile records backing the role & session gate.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Writes the profile record at signup with the caller-chosen role.
    /// The role is immutable afterwards.
    async fn create_profile(&self, identity: &Identity, role: UserRole) -> PortResult<()>;

    /// Fetches the profile for an identity. `Ok(None)` means no profile
    /// record exists yet (the transient no-role state).
    async fn fetch_profile(&self, identity: &Identity) -> PortResult<Option<UserProfile>>;

    async fn set_display_name(&self, identity: &Identity, name: &str) -> PortResult<()>;

    async fn delete_profile(&self, identity: &Identity) -> PortResult<()>;
}

/// Durable blob storage for uploaded files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores the bytes at `path` and returns a durable retrieval locator.
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> PortResult<String>;

    /// Deletes the blob at `path`. Returns `PortError::NotFound` when the
    /// object is already absent so callers can decide to tolerate it.
    async fn delete(&self, path: &str) -> PortResult<()>;
}

/// The external identity provider (email + password accounts).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> PortResult<Identity>;

    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Identity>;

    async fn sign_out(&self) -> PortResult<()>;

    /// Re-verifies the password for an already-authenticated identity and
    /// returns a fresh identity (new token) on success.
    async fn reauthenticate(&self, identity: &Identity, password: &str) -> PortResult<Identity>;

    /// Sets a new password; the caller must have re-authenticated first.
    async fn change_password(&self, identity: &Identity, new_password: &str)
        -> PortResult<Identity>;

    async fn delete_identity(&self, identity: &Identity) -> PortResult<()>;

    /// Session-change events. Yields the current identity (or none)
    /// immediately on subscription, then again after every change.
    fn session_events(&self) -> SessionStream;
}

/// Role vocabulary of the external generation API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Model,
}

/// One prior exchange turn, in the shape the generation API expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

/// The external generative text API.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Generates a reply to `message` given the prior `history` and an
    /// optional context block, using the model named by `model_id`.
    async fn generate(
        &self,
        model_id: &str,
        history: &[ChatTurn],
        message: &str,
        context: Option<&str>,
    ) -> PortResult<String>;
}

/// Extracts plain text and a page count from an uploaded binary file.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8]) -> PortResult<ExtractedContent>;
}
