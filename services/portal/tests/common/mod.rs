//! services/portal/tests/common/mod.rs
//!
//! In-memory stub adapters for the integration tests. Each stub records the
//! calls it receives so the tests can assert on the traffic (or the absence
//! of it) as well as on the outcomes.

// Each test binary compiles this module separately and uses a subset of it.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use studyhall_core::domain::{
    Announcement, AnnouncementDraft, ClassMembers, DocumentDraft, DocumentRecord,
    ExtractedContent, Identity, UserProfile, UserRole,
};
use studyhall_core::ports::{
    BlobStore, ChatTurn, ClassStreamStore, DocumentStore, GenerativeModel, IdentityProvider,
    PortError, PortResult, ProfileStore, SessionStream, SnapshotStream, TextExtractor,
};
use tokio::sync::{mpsc, watch};

/// Initializes test logging once; safe to call from every test.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

//=========================================================================================
// Document store stub
//=========================================================================================

pub struct StubDocumentStore {
    remote: Mutex<Vec<DocumentRecord>>,
    next_id: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    snapshot_tx: Mutex<Option<mpsc::UnboundedSender<PortResult<Vec<DocumentRecord>>>>>,
    snapshot_rx: Mutex<Option<mpsc::UnboundedReceiver<PortResult<Vec<DocumentRecord>>>>>,
}

impl StubDocumentStore {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            remote: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            create_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            snapshot_tx: Mutex::new(Some(tx)),
            snapshot_rx: Mutex::new(Some(rx)),
        })
    }

    /// The records as the remote store currently holds them.
    pub fn remote_records(&self) -> Vec<DocumentRecord> {
        self.remote.lock().unwrap().clone()
    }

    /// Delivers the remote collection as an authoritative snapshot.
    pub fn emit_remote_snapshot(&self) {
        let snapshot = self.remote_records();
        if let Some(tx) = &*self.snapshot_tx.lock().unwrap() {
            let _ = tx.send(Ok(snapshot));
        }
    }

    /// Delivers an arbitrary snapshot (e.g. a stale one).
    pub fn emit_snapshot(&self, records: Vec<DocumentRecord>) {
        if let Some(tx) = &*self.snapshot_tx.lock().unwrap() {
            let _ = tx.send(Ok(records));
        }
    }
}

#[async_trait]
impl DocumentStore for StubDocumentStore {
    async fn subscribe(&self) -> PortResult<SnapshotStream> {
        let mut rx = self
            .snapshot_rx
            .lock()
            .unwrap()
            .take()
            .expect("subscribe called twice on stub");
        Ok(Box::pin(async_stream::stream! {
            while let Some(snapshot) = rx.recv().await {
                yield snapshot;
            }
        }))
    }

    async fn create_document(&self, draft: DocumentDraft) -> PortResult<DocumentRecord> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let id = format!("doc-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let record = draft.into_record(id);
        self.remote.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn delete_document(&self, id: &str) -> PortResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut remote = self.remote.lock().unwrap();
        let before = remote.len();
        remote.retain(|r| r.id != id);
        if remote.len() == before {
            return Err(PortError::NotFound(format!("no document {}", id)));
        }
        Ok(())
    }
}

//=========================================================================================
// Class-stream store stub
//=========================================================================================

pub struct StubStreamStore {
    announcements: Mutex<Vec<Announcement>>,
    rosters: Mutex<HashMap<String, ClassMembers>>,
    next_id: AtomicUsize,
    pub create_calls: AtomicUsize,
}

impl StubStreamStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            announcements: Mutex::new(Vec::new()),
            rosters: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            create_calls: AtomicUsize::new(0),
        })
    }

    pub fn remote_announcements(&self) -> Vec<Announcement> {
        self.announcements.lock().unwrap().clone()
    }

    pub fn seed_roster(&self, members: ClassMembers) {
        self.rosters
            .lock()
            .unwrap()
            .insert(members.class_id.clone(), members);
    }
}

#[async_trait]
impl ClassStreamStore for StubStreamStore {
    async fn list_announcements(&self) -> PortResult<Vec<Announcement>> {
        let mut list = self.remote_announcements();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn create_announcement(&self, draft: AnnouncementDraft) -> PortResult<Announcement> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let id = format!("ann-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let announcement = draft.into_record(id);
        self.announcements.lock().unwrap().push(announcement.clone());
        Ok(announcement)
    }

    async fn delete_announcement(&self, id: &str) -> PortResult<()> {
        let mut announcements = self.announcements.lock().unwrap();
        let before = announcements.len();
        announcements.retain(|a| a.id != id);
        if announcements.len() == before {
            return Err(PortError::NotFound(format!("no announcement {}", id)));
        }
        Ok(())
    }

    async fn fetch_members(&self, class_id: &str) -> PortResult<Option<ClassMembers>> {
        Ok(self.rosters.lock().unwrap().get(class_id).cloned())
    }
}

//=========================================================================================
// Blob store stub
//=========================================================================================

pub struct StubBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    pub put_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl StubBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            blobs: Mutex::new(HashMap::new()),
            put_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(path)
    }

    /// Drops a blob behind the store's back (missing-blob scenarios).
    pub fn vanish(&self, path: &str) {
        self.blobs.lock().unwrap().remove(path);
    }
}

#[async_trait]
impl BlobStore for StubBlobStore {
    async fn put(&self, path: &str, bytes: &[u8], _content_type: &str) -> PortResult<String> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(format!("https://blobs.test/{}?alt=media&token=tok", path))
    }

    async fn delete(&self, path: &str) -> PortResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.blobs.lock().unwrap().remove(path).is_none() {
            return Err(PortError::NotFound(format!("no blob at {}", path)));
        }
        Ok(())
    }
}

//=========================================================================================
// Text extractor stub
//=========================================================================================

pub struct StubExtractor {
    result: Mutex<Option<PortResult<ExtractedContent>>>,
}

impl StubExtractor {
    /// Always succeeds with the given text and page count.
    pub fn succeeding(text: &str, page_count: u32) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Some(Ok(ExtractedContent {
                text: text.to_string(),
                page_count,
            }))),
        })
    }

    /// Always fails, as an unparseable document would.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Some(Err(PortError::Unexpected(
                "Failed to parse PDF document.".into(),
            )))),
        })
    }
}

#[async_trait]
impl TextExtractor for StubExtractor {
    async fn extract(&self, _bytes: &[u8]) -> PortResult<ExtractedContent> {
        match &*self.result.lock().unwrap() {
            Some(Ok(content)) => Ok(content.clone()),
            Some(Err(PortError::Unexpected(msg))) => Err(PortError::Unexpected(msg.clone())),
            _ => Err(PortError::Unexpected("unconfigured stub".into())),
        }
    }
}

//=========================================================================================
// Identity provider + profile store stubs (shared operation log)
//=========================================================================================

pub struct StubIdentityProvider {
    passwords: Mutex<HashMap<String, String>>,
    events: watch::Sender<Option<Identity>>,
    pub op_log: Arc<Mutex<Vec<String>>>,
}

impl StubIdentityProvider {
    pub fn new(op_log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        let (events, _) = watch::channel(None);
        Arc::new(Self {
            passwords: Mutex::new(HashMap::new()),
            events,
            op_log,
        })
    }

    pub fn with_account(email: &str, password: &str) -> Arc<Self> {
        let stub = Self::new(Arc::new(Mutex::new(Vec::new())));
        stub.passwords
            .lock()
            .unwrap()
            .insert(email.to_string(), password.to_string());
        stub
    }

    pub fn password_of(&self, email: &str) -> Option<String> {
        self.passwords.lock().unwrap().get(email).cloned()
    }

    /// Simulates an externally restored session.
    pub fn publish(&self, identity: Option<Identity>) {
        self.events.send_replace(identity);
    }

    fn identity_for(email: &str) -> Identity {
        Identity {
            uid: format!("uid-{}", email),
            email: email.to_string(),
            id_token: format!("token-{}", email),
        }
    }
}

#[async_trait]
impl IdentityProvider for StubIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> PortResult<Identity> {
        match self.passwords.lock().unwrap().get(email) {
            Some(stored) if stored == password => {}
            Some(_) => return Err(PortError::Unauthorized("INVALID_PASSWORD".into())),
            None => return Err(PortError::Unauthorized("EMAIL_NOT_FOUND".into())),
        }
        let identity = Self::identity_for(email);
        self.events.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Identity> {
        let mut passwords = self.passwords.lock().unwrap();
        if passwords.contains_key(email) {
            return Err(PortError::Unauthorized("EMAIL_EXISTS".into()));
        }
        passwords.insert(email.to_string(), password.to_string());
        drop(passwords);
        let identity = Self::identity_for(email);
        self.events.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> PortResult<()> {
        self.events.send_replace(None);
        Ok(())
    }

    async fn reauthenticate(&self, identity: &Identity, password: &str) -> PortResult<Identity> {
        match self.passwords.lock().unwrap().get(&identity.email) {
            Some(stored) if stored == password => Ok(Self::identity_for(&identity.email)),
            _ => Err(PortError::Unauthorized("INVALID_PASSWORD".into())),
        }
    }

    async fn change_password(
        &self,
        identity: &Identity,
        new_password: &str,
    ) -> PortResult<Identity> {
        self.passwords
            .lock()
            .unwrap()
            .insert(identity.email.clone(), new_password.to_string());
        Ok(Self::identity_for(&identity.email))
    }

    async fn delete_identity(&self, identity: &Identity) -> PortResult<()> {
        self.op_log.lock().unwrap().push("delete_identity".into());
        self.passwords.lock().unwrap().remove(&identity.email);
        self.events.send_replace(None);
        Ok(())
    }

    fn session_events(&self) -> SessionStream {
        let mut rx = self.events.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                let current = rx.borrow_and_update().clone();
                yield current;
                if rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}

pub struct StubProfileStore {
    profiles: Mutex<HashMap<String, UserProfile>>,
    pub op_log: Arc<Mutex<Vec<String>>>,
}

impl StubProfileStore {
    pub fn new(op_log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            profiles: Mutex::new(HashMap::new()),
            op_log,
        })
    }

    pub fn profile_of(&self, uid: &str) -> Option<UserProfile> {
        self.profiles.lock().unwrap().get(uid).cloned()
    }

    /// Seeds an existing profile, optionally already named.
    pub fn seed(&self, identity: &Identity, role: UserRole, name: Option<&str>) {
        self.profiles.lock().unwrap().insert(
            identity.uid.clone(),
            UserProfile {
                uid: identity.uid.clone(),
                email: identity.email.clone(),
                role,
                display_name: name.map(str::to_owned),
            },
        );
    }
}

#[async_trait]
impl ProfileStore for StubProfileStore {
    async fn create_profile(&self, identity: &Identity, role: UserRole) -> PortResult<()> {
        self.seed(identity, role, None);
        Ok(())
    }

    async fn fetch_profile(&self, identity: &Identity) -> PortResult<Option<UserProfile>> {
        Ok(self.profiles.lock().unwrap().get(&identity.uid).cloned())
    }

    async fn set_display_name(&self, identity: &Identity, name: &str) -> PortResult<()> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .get_mut(&identity.uid)
            .ok_or_else(|| PortError::NotFound(format!("no profile {}", identity.uid)))?;
        profile.display_name = Some(name.to_string());
        Ok(())
    }

    async fn delete_profile(&self, identity: &Identity) -> PortResult<()> {
        self.op_log.lock().unwrap().push("delete_profile".into());
        self.profiles.lock().unwrap().remove(&identity.uid);
        Ok(())
    }
}

//=========================================================================================
// Generative model stub
//=========================================================================================

/// One captured `generate` invocation.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub model_id: String,
    pub history: Vec<ChatTurn>,
    pub message: String,
    pub context: Option<String>,
}

pub struct ScriptedModel {
    /// Scripted outcomes per model id, consumed front-to-back.
    scripts: Mutex<HashMap<String, VecDeque<PortResult<String>>>>,
    pub requests: Mutex<Vec<CapturedRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn script(&self, model_id: &str, outcome: PortResult<String>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(model_id.to_string())
            .or_default()
            .push_back(outcome);
    }

    pub fn captured(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(
        &self,
        model_id: &str,
        history: &[ChatTurn],
        message: &str,
        context: Option<&str>,
    ) -> PortResult<String> {
        self.requests.lock().unwrap().push(CapturedRequest {
            model_id: model_id.to_string(),
            history: history.to_vec(),
            message: message.to_string(),
            context: context.map(str::to_owned),
        });
        self.scripts
            .lock()
            .unwrap()
            .get_mut(model_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(PortError::Unexpected(format!("no script for {}", model_id))))
    }
}

//=========================================================================================
// Shared fixtures
//=========================================================================================

/// A valid upload request for a small PDF.
pub fn sample_upload() -> portal_lib::UploadRequest {
    portal_lib::UploadRequest {
        file_name: "unit_3_signals.pdf".into(),
        content_type: "application/pdf".into(),
        bytes: vec![0u8; 2048],
        class_id: "cse-3rd".into(),
        subject: "Signals".into(),
        subject_code: Some("ES-EC301".into()),
        description: "Lecture notes".into(),
        session_label: Some("2025-2026".into()),
        uploaded_by: "Dr. Rao".into(),
    }
}
