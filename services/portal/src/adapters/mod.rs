//! services/portal/src/adapters/mod.rs
//!
//! Concrete implementations of the core service ports against the hosted
//! backends: document metadata (Firestore REST), blob storage, identity
//! provider, generative text API, and PDF text extraction.

pub mod firestore;
pub mod gemini;
pub mod identity;
pub mod pdf;
pub mod storage;

pub use firestore::FirestoreAdapter;
pub use gemini::GeminiAdapter;
pub use identity::IdentityToolkitAdapter;
pub use pdf::PdfExtractor;
pub use storage::FirebaseStorageAdapter;
