//! crates/studyhall_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any backend or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One class group a document can belong to. Statically enumerated by
/// process-wide configuration; never created or mutated at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassGroup {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// The role chosen at signup. Immutable for the lifetime of the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    Teacher,
    Student,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Student => "student",
        }
    }

    /// Parses the wire representation used by the profile store.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "teacher" => Some(Self::Teacher),
            "student" => Some(Self::Student),
            _ => None,
        }
    }
}

/// An authenticated identity as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: String,
    /// Bearer token for provider-side operations on this identity.
    pub id_token: String,
}

/// The profile record backing the role & session gate. `display_name` stays
/// `None` until the profile-completion step has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub role: UserRole,
    pub display_name: Option<String>,
}

/// Processing lifecycle of a document record.
///
/// The retrieval locator and storage path only exist once the blob upload has
/// succeeded, so they live inside the `Processed` variant rather than as
/// optional fields on the record itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingState {
    Uploading,
    Processed {
        /// Durable URL usable to fetch the stored blob.
        locator: String,
        /// Path of the blob inside the blob store, used for deletion.
        storage_path: String,
    },
    Errored {
        reason: String,
    },
}

/// A study document's metadata record — the central entity of the portal.
///
/// The `id` is assigned by the remote store on creation and is never
/// client-generated before persistence; `DocumentDraft` is the pre-creation
/// shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub id: String,
    pub class_id: String,
    pub title: String,
    pub file_name: String,
    pub subject: String,
    pub subject_code: Option<String>,
    pub description: String,
    pub page_count: u32,
    /// Human-readable size, e.g. "1.4 MB".
    pub size_label: String,
    pub created_at: DateTime<Utc>,
    pub state: ProcessingState,
    pub extracted_text: Option<String>,
    pub uploaded_by: String,
    /// Academic session label, e.g. "2024-2025".
    pub session_label: Option<String>,
}

impl DocumentRecord {
    pub fn is_processed(&self) -> bool {
        matches!(self.state, ProcessingState::Processed { .. })
    }

    /// The durable retrieval URL, present only once processed.
    pub fn locator(&self) -> Option<&str> {
        match &self.state {
            ProcessingState::Processed { locator, .. } => Some(locator),
            _ => None,
        }
    }

    /// The blob-store path, present only once processed.
    pub fn storage_path(&self) -> Option<&str> {
        match &self.state {
            ProcessingState::Processed { storage_path, .. } => Some(storage_path),
            _ => None,
        }
    }
}

/// A document record before the remote store has assigned it an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDraft {
    pub class_id: String,
    pub title: String,
    pub file_name: String,
    pub subject: String,
    pub subject_code: Option<String>,
    pub description: String,
    pub page_count: u32,
    pub size_label: String,
    pub created_at: DateTime<Utc>,
    pub state: ProcessingState,
    pub extracted_text: Option<String>,
    pub uploaded_by: String,
    pub session_label: Option<String>,
}

impl DocumentDraft {
    /// Completes the draft with the identifier the remote store assigned.
    pub fn into_record(self, id: String) -> DocumentRecord {
        DocumentRecord {
            id,
            class_id: self.class_id,
            title: self.title,
            file_name: self.file_name,
            subject: self.subject,
            subject_code: self.subject_code,
            description: self.description,
            page_count: self.page_count,
            size_label: self.size_label,
            created_at: self.created_at,
            state: self.state,
            extracted_text: self.extracted_text,
            uploaded_by: self.uploaded_by,
            session_label: self.session_label,
        }
    }
}

/// One announcement on a class group's stream.
///
/// Like documents, the `id` is assigned by the remote store on creation;
/// `AnnouncementDraft` is the pre-creation shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub id: String,
    pub class_id: String,
    /// Display name of the posting teacher.
    pub author: String,
    pub content: String,
    pub comment_count: u32,
    pub created_at: DateTime<Utc>,
}

/// An announcement before the remote store has assigned it an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncementDraft {
    pub class_id: String,
    pub author: String,
    pub content: String,
    pub comment_count: u32,
    pub created_at: DateTime<Utc>,
}

impl AnnouncementDraft {
    /// Completes the draft with the identifier the remote store assigned.
    pub fn into_record(self, id: String) -> Announcement {
        Announcement {
            id,
            class_id: self.class_id,
            author: self.author,
            content: self.content,
            comment_count: self.comment_count,
            created_at: self.created_at,
        }
    }
}

/// The member roster of one class group, by display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMembers {
    pub class_id: String,
    pub teachers: Vec<String>,
    pub students: Vec<String>,
}

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

/// One message in an open-document assistant conversation. Append-only and
/// discarded when the document view closes; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Text and page count produced by the content extraction service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub text: String,
    pub page_count: u32,
}
