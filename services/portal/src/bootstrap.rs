//! services/portal/src/bootstrap.rs
//!
//! The composition root: wires configuration, the backend adapters and the
//! dependency-injected stores into one `Portal` handle for the UI shell.

use crate::adapters::{
    FirebaseStorageAdapter, FirestoreAdapter, GeminiAdapter, IdentityToolkitAdapter, PdfExtractor,
};
use crate::chat::{Conversation, DocumentContext};
use crate::config::Config;
use crate::error::PortalError;
use crate::stores::{LibraryStore, SessionStore};
use std::sync::Arc;
use studyhall_core::domain::DocumentRecord;
use studyhall_core::ports::GenerativeModel;
use tracing::info;

/// The fully wired application core handed to the UI shell.
pub struct Portal {
    pub config: Arc<Config>,
    pub library: Arc<LibraryStore>,
    pub session: Arc<SessionStore>,
    model: Arc<dyn GenerativeModel>,
}

impl Portal {
    /// Builds every adapter and store from configuration. Subscriptions are
    /// not opened yet; call [`Portal::attach`] once the shell is ready.
    pub fn from_config(config: Config) -> Self {
        let config = Arc::new(config);

        // --- Backend adapters ---
        let firestore = Arc::new(FirestoreAdapter::new(
            &config.project_id,
            config.api_key.clone(),
            config.poll_interval,
        ));
        let storage = Arc::new(FirebaseStorageAdapter::new(config.storage_bucket.clone()));
        let identity = Arc::new(IdentityToolkitAdapter::new(config.api_key.clone()));
        let extractor = Arc::new(PdfExtractor::new());
        let model: Arc<dyn GenerativeModel> =
            Arc::new(GeminiAdapter::new(config.gemini_api_key.clone()));

        // --- Stores ---
        let library = Arc::new(LibraryStore::new(
            firestore.clone(),
            storage,
            extractor,
            firestore.clone(),
        ));
        let session = Arc::new(SessionStore::new(identity, firestore));

        Self {
            config,
            library,
            session,
            model,
        }
    }

    /// Opens the live subscriptions backing both stores.
    pub async fn attach(&self) -> Result<(), PortalError> {
        self.session.attach();
        self.library.attach().await?;
        info!("Portal attached; stores are live.");
        Ok(())
    }

    /// Tears both stores down (sign-out / shutdown path).
    pub fn detach(&self) {
        self.library.detach();
        self.session.detach();
    }

    /// Starts an assistant conversation scoped to one open document.
    pub fn open_conversation(&self, record: &DocumentRecord) -> Conversation {
        Conversation::new(
            self.model.clone(),
            self.config.primary_model.clone(),
            self.config.fallback_model.clone(),
            DocumentContext::from_record(record),
        )
    }
}
