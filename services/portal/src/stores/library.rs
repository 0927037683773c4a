//! services/portal/src/stores/library.rs
//!
//! The class-library store: an in-memory mirror of the remote document
//! collection plus the upload and deletion pipelines that mutate it, and the
//! class stream (announcements and the member roster).
//!
//! The remote store is the source of truth. The mirror is a pure projection:
//! every snapshot delivered by the subscription replaces the whole arena.
//! Pipelines additionally push an optimistic copy of their own writes so the
//! UI reflects them before the next snapshot arrives; because the arena is
//! keyed by record id, the authoritative copy supersedes the optimistic one
//! instead of duplicating it.

use crate::error::PortalError;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use studyhall_core::domain::{
    Announcement, AnnouncementDraft, ClassMembers, DocumentDraft, DocumentRecord, ProcessingState,
};
use studyhall_core::ports::{
    BlobStore, ClassStreamStore, DocumentStore, PortError, TextExtractor,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// The one supported document type.
pub const SUPPORTED_CONTENT_TYPE: &str = "application/pdf";

/// Fixed upload ceiling: files over 10 MiB are rejected before any network
/// call. Exactly 10 MiB is accepted.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

//=========================================================================================
// Upload Request
//=========================================================================================

/// Everything the upload pipeline needs, gathered by the upload form.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub class_id: String,
    pub subject: String,
    pub subject_code: Option<String>,
    pub description: String,
    pub session_label: Option<String>,
    /// Display name of the uploading teacher.
    pub uploaded_by: String,
}

//=========================================================================================
// LibraryStore
//=========================================================================================

/// Dependency-injected store mirroring the remote document collection.
///
/// Constructed at session start and torn down with [`LibraryStore::detach`].
/// Views read through [`LibraryStore::current`] and register for change
/// notification through [`LibraryStore::changes`] — an explicit observer
/// registration, not ambient re-render magic.
pub struct LibraryStore {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    extractor: Arc<dyn TextExtractor>,
    stream_store: Arc<dyn ClassStreamStore>,
    /// Arena keyed by record id; dedupe across the optimistic and
    /// authoritative paths is structural.
    records: RwLock<BTreeMap<String, DocumentRecord>>,
    announcements: RwLock<BTreeMap<String, Announcement>>,
    revision: watch::Sender<u64>,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl LibraryStore {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        extractor: Arc<dyn TextExtractor>,
        stream_store: Arc<dyn ClassStreamStore>,
    ) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            documents,
            blobs,
            extractor,
            stream_store,
            records: RwLock::new(BTreeMap::new()),
            announcements: RwLock::new(BTreeMap::new()),
            revision,
            subscription: Mutex::new(None),
        }
    }

    /// Opens the live subscription and spawns the consumer task that keeps
    /// the arena reconciled to the remote collection. Also primes the
    /// announcement list.
    pub async fn attach(self: &Arc<Self>) -> Result<(), PortalError> {
        if let Err(e) = self.refresh_announcements().await {
            // Announcements are secondary content; the attach still succeeds.
            warn!("Initial announcement fetch failed: {}", e);
        }

        let mut stream = self.documents.subscribe().await?;
        // The task holds a Weak so an attached store can still be dropped;
        // the upgrade failing is the task's stop signal.
        let store = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(snapshot) = stream.next().await {
                let Some(store) = store.upgrade() else {
                    break;
                };
                match snapshot {
                    Ok(records) => store.apply_snapshot(records),
                    // Subscription errors are logged and the stream is left
                    // to deliver the next snapshot; there is no retry policy.
                    Err(e) => error!("Library subscription delivered an error: {}", e),
                }
            }
            info!("Library subscription stream ended.");
        });

        let mut slot = self.subscription.lock().expect("subscription lock poisoned");
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
        Ok(())
    }

    /// Stops the subscription consumer. Part of session teardown.
    pub fn detach(&self) {
        if let Some(handle) = self
            .subscription
            .lock()
            .expect("subscription lock poisoned")
            .take()
        {
            handle.abort();
        }
    }

    /// Synchronous snapshot of the mirrored records, newest first.
    pub fn current(&self) -> Vec<DocumentRecord> {
        let records = self.records.read().expect("records lock poisoned");
        let mut list: Vec<DocumentRecord> = records.values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    /// The mirrored records belonging to one class group, newest first.
    pub fn for_class(&self, class_id: &str) -> Vec<DocumentRecord> {
        self.current()
            .into_iter()
            .filter(|r| r.class_id == class_id)
            .collect()
    }

    /// Registers an observer; the value increments on every arena change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Replaces the arena with an authoritative snapshot.
    fn apply_snapshot(&self, snapshot: Vec<DocumentRecord>) {
        {
            let mut records = self.records.write().expect("records lock poisoned");
            records.clear();
            for record in snapshot {
                records.insert(record.id.clone(), record);
            }
        }
        self.notify();
    }

    fn notify(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    //=====================================================================================
    // Upload Pipeline
    //=====================================================================================

    /// Validates, extracts, uploads and records a new study document.
    ///
    /// Validation happens before any network call. Extraction failure is
    /// non-fatal and degrades to an empty text body. A failure of the blob
    /// upload or the metadata write aborts the pipeline with no partial
    /// record; the caller does not retry automatically.
    pub async fn add_document(&self, request: UploadRequest) -> Result<DocumentRecord, PortalError> {
        // 1. Validate before touching the network.
        validate_upload(&request)?;

        info!(
            file_name = %request.file_name,
            class_id = %request.class_id,
            "Upload pipeline started."
        );

        // 2. Extract text and page count; degrade gracefully on failure.
        let content = match self.extractor.extract(&request.bytes).await {
            Ok(content) => content,
            Err(e) => {
                let err = PortalError::Extraction(e.to_string());
                warn!("{}; continuing without text.", err);
                studyhall_core::domain::ExtractedContent {
                    text: String::new(),
                    page_count: 1,
                }
            }
        };

        // 3. Store the binary and obtain the durable retrieval locator.
        let created_at = chrono::Utc::now();
        let storage_path = format!(
            "materials/{}/{}_{}",
            request.class_id,
            created_at.timestamp_millis(),
            request.file_name
        );
        let locator = self
            .blobs
            .put(&storage_path, &request.bytes, &request.content_type)
            .await
            .map_err(PortalError::Upload)?;

        // 4. Persist the metadata record; the store assigns the id.
        let draft = DocumentDraft {
            class_id: request.class_id,
            title: derive_title(&request.file_name),
            file_name: request.file_name,
            subject: request.subject,
            subject_code: request.subject_code,
            description: request.description,
            page_count: content.page_count,
            size_label: size_label(request.bytes.len()),
            created_at,
            state: ProcessingState::Processed {
                locator,
                storage_path,
            },
            extracted_text: if content.text.is_empty() {
                None
            } else {
                Some(content.text)
            },
            uploaded_by: request.uploaded_by,
            session_label: request.session_label,
        };
        let record = self
            .documents
            .create_document(draft)
            .await
            .map_err(PortalError::Upload)?;

        // 5. Optimistic insert so the UI reflects the record before the next
        //    authoritative snapshot. Superseded, not duplicated, by the
        //    snapshot because the arena is keyed by id.
        {
            let mut records = self.records.write().expect("records lock poisoned");
            records.insert(record.id.clone(), record.clone());
        }
        self.notify();

        info!(id = %record.id, "Upload pipeline finished.");
        Ok(record)
    }

    //=====================================================================================
    // Deletion Pipeline
    //=====================================================================================

    /// Removes a document record and its stored blob.
    ///
    /// A blob that is already absent is tolerated (log-and-continue); the
    /// blob step is therefore idempotent on retry.
    pub async fn delete_document(&self, id: &str) -> Result<(), PortalError> {
        // The blob path has to be read before the record disappears.
        let storage_path = {
            let records = self.records.read().expect("records lock poisoned");
            records
                .get(id)
                .and_then(|r| r.storage_path().map(str::to_owned))
        };

        self.documents
            .delete_document(id)
            .await
            .map_err(PortalError::Deletion)?;

        if let Some(path) = storage_path {
            match self.blobs.delete(&path).await {
                Ok(()) => {}
                Err(PortError::NotFound(_)) => {
                    warn!(path = %path, "Blob already absent during deletion; continuing.");
                }
                Err(e) => return Err(PortalError::Deletion(e)),
            }
        }

        // Remove the local mirror entry last; the next snapshot would drop
        // it anyway.
        {
            let mut records = self.records.write().expect("records lock poisoned");
            records.remove(id);
        }
        self.notify();

        info!(id = %id, "Deletion pipeline finished.");
        Ok(())
    }

    //=====================================================================================
    // Class Stream (announcements + member roster)
    //=====================================================================================

    /// Replaces the announcement list with the remote one.
    pub async fn refresh_announcements(&self) -> Result<(), PortalError> {
        let remote = self.stream_store.list_announcements().await?;
        {
            let mut announcements = self
                .announcements
                .write()
                .expect("announcements lock poisoned");
            announcements.clear();
            for announcement in remote {
                announcements.insert(announcement.id.clone(), announcement);
            }
        }
        self.notify();
        Ok(())
    }

    /// The mirrored announcements for one class group, newest first.
    pub fn announcements_for(&self, class_id: &str) -> Vec<Announcement> {
        let announcements = self
            .announcements
            .read()
            .expect("announcements lock poisoned");
        let mut list: Vec<Announcement> = announcements
            .values()
            .filter(|a| a.class_id == class_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    /// Posts an announcement to a class stream. Blank content is rejected
    /// before any network call.
    pub async fn post_announcement(
        &self,
        class_id: &str,
        author: &str,
        content: &str,
    ) -> Result<Announcement, PortalError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(PortalError::Validation(
                "Announcement content cannot be empty.".to_string(),
            ));
        }

        let draft = AnnouncementDraft {
            class_id: class_id.to_string(),
            author: author.to_string(),
            content: content.to_string(),
            comment_count: 0,
            created_at: chrono::Utc::now(),
        };
        let announcement = self.stream_store.create_announcement(draft).await?;

        {
            let mut announcements = self
                .announcements
                .write()
                .expect("announcements lock poisoned");
            announcements.insert(announcement.id.clone(), announcement.clone());
        }
        self.notify();

        info!(id = %announcement.id, class_id = %class_id, "Announcement posted.");
        Ok(announcement)
    }

    pub async fn delete_announcement(&self, id: &str) -> Result<(), PortalError> {
        self.stream_store.delete_announcement(id).await?;
        {
            let mut announcements = self
                .announcements
                .write()
                .expect("announcements lock poisoned");
            announcements.remove(id);
        }
        self.notify();
        Ok(())
    }

    /// The member roster of one class group, fetched on demand.
    pub async fn members_of(&self, class_id: &str) -> Result<Option<ClassMembers>, PortalError> {
        Ok(self.stream_store.fetch_members(class_id).await?)
    }
}

impl Drop for LibraryStore {
    fn drop(&mut self) {
        self.detach();
    }
}

//=========================================================================================
// Pure helpers
//=========================================================================================

fn validate_upload(request: &UploadRequest) -> Result<(), PortalError> {
    if request.content_type != SUPPORTED_CONTENT_TYPE {
        return Err(PortalError::Validation(format!(
            "Unsupported file type '{}'; only PDF documents can be uploaded.",
            request.content_type
        )));
    }
    if request.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(PortalError::Validation(
            "File is larger than the 10 MB upload limit.".to_string(),
        ));
    }
    Ok(())
}

/// Derives a display title from a file name: extension stripped, underscores
/// replaced with spaces.
pub fn derive_title(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    };
    stem.replace('_', " ")
}

/// Human-readable size string, e.g. "1.4 MB".
pub fn size_label(byte_len: usize) -> String {
    format!("{:.1} MB", byte_len as f64 / (1024.0 * 1024.0))
}
