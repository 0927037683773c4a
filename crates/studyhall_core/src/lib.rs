pub mod domain;
pub mod ports;

pub use domain::{
    Announcement, AnnouncementDraft, ChatRole, ClassGroup, ClassMembers, ConversationMessage,
    DocumentDraft, DocumentRecord, ExtractedContent, Identity, ProcessingState, UserProfile,
    UserRole,
};
pub use ports::{
    BlobStore, ChatTurn, ClassStreamStore, DocumentStore, GenerativeModel, IdentityProvider,
    PortError, PortResult, ProfileStore, SessionStream, SnapshotStream, TextExtractor, TurnRole,
};
