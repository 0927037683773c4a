//! services/portal/src/adapters/firestore.rs
//!
//! This module contains the document-metadata adapter, the concrete
//! implementation of the `DocumentStore` and `ProfileStore` ports against
//! the Firestore REST v1 API.
//!
//! The REST surface has no push listener, so `subscribe` is a polling loop
//! that re-runs the ordered collection query at a fixed interval and yields
//! each result as a full authoritative snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::time::Duration;
use studyhall_core::domain::{
    Announcement, AnnouncementDraft, ClassMembers, DocumentDraft, DocumentRecord, Identity,
    ProcessingState, UserProfile, UserRole,
};
use studyhall_core::ports::{
    ClassStreamStore, DocumentStore, PortError, PortResult, ProfileStore, SnapshotStream,
};
use tracing::warn;

const MATERIALS_COLLECTION: &str = "materials";
const USERS_COLLECTION: &str = "users";
const ANNOUNCEMENTS_COLLECTION: &str = "announcements";
const MEMBERS_COLLECTION: &str = "members";

/// Overall deadline for any single metadata request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A metadata-store adapter that implements the `DocumentStore` and
/// `ProfileStore` ports over Firestore REST.
#[derive(Clone)]
pub struct FirestoreAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    poll_interval: Duration,
}

impl FirestoreAdapter {
    /// Creates a new `FirestoreAdapter` for a backend project.
    pub fn new(project_id: &str, api_key: String, poll_interval: Duration) -> Self {
        Self {
            http: http_client(REQUEST_TIMEOUT),
            base_url: format!(
                "https://firestore.googleapis.com/v1/projects/{}/databases/(default)/documents",
                project_id
            ),
            api_key,
            poll_interval,
        }
    }

    /// Constructor with an explicit endpoint, for emulators.
    pub fn with_base_url(base_url: String, api_key: String, poll_interval: Duration) -> Self {
        Self {
            http: http_client(REQUEST_TIMEOUT),
            base_url,
            api_key,
            poll_interval,
        }
    }

    /// One ordered full-collection fetch; the body of the polling loop.
    async fn fetch_snapshot(&self) -> PortResult<Vec<DocumentRecord>> {
        let url = format!("{}:runQuery?key={}", self.base_url, self.api_key);
        let query = json!({
            "structuredQuery": {
                "from": [{ "collectionId": MATERIALS_COLLECTION }],
                "orderBy": [{
                    "field": { "fieldPath": "createdAt" },
                    "direction": "DESCENDING"
                }]
            }
        });

        let response = self
            .http
            .post(&url)
            .json(&query)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let response = check_status(response).await?;
        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let Some(document) = row.get("document") else {
                continue;
            };
            match decode_document(document) {
                Ok(record) => records.push(record),
                // A malformed record degrades to a warning rather than
                // poisoning the whole snapshot.
                Err(e) => warn!("Skipping undecodable document record: {}", e),
            }
        }
        Ok(records)
    }
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for FirestoreAdapter {
    async fn subscribe(&self) -> PortResult<SnapshotStream> {
        let adapter = self.clone();
        let interval = self.poll_interval;
        Ok(Box::pin(async_stream::stream! {
            loop {
                yield adapter.fetch_snapshot().await;
                tokio::time::sleep(interval).await;
            }
        }))
    }

    async fn create_document(&self, draft: DocumentDraft) -> PortResult<DocumentRecord> {
        let url = format!(
            "{}/{}?key={}",
            self.base_url, MATERIALS_COLLECTION, self.api_key
        );
        let body = json!({ "fields": encode_draft(&draft) });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let response = check_status(response).await?;
        let document: Value = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let id = document_id(&document).ok_or_else(|| {
            PortError::Unexpected("Created document carries no name/id.".to_string())
        })?;
        Ok(draft.into_record(id))
    }

    async fn delete_document(&self, id: &str) -> PortResult<()> {
        let url = format!(
            "{}/{}/{}?key={}",
            self.base_url, MATERIALS_COLLECTION, id, self.api_key
        );
        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }
}

//=========================================================================================
// `ProfileStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileStore for FirestoreAdapter {
    async fn create_profile(&self, identity: &Identity, role: UserRole) -> PortResult<()> {
        // PATCH creates the document when absent (set semantics).
        let url = format!(
            "{}/{}/{}?key={}",
            self.base_url, USERS_COLLECTION, identity.uid, self.api_key
        );
        let body = json!({
            "fields": {
                "email": { "stringValue": identity.email },
                "role": { "stringValue": role.as_str() },
                "createdAt": { "timestampValue": Utc::now().to_rfc3339() },
            }
        });
        let response = self
            .http
            .patch(&url)
            .bearer_auth(&identity.id_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }

    async fn fetch_profile(&self, identity: &Identity) -> PortResult<Option<UserProfile>> {
        let url = format!(
            "{}/{}/{}?key={}",
            self.base_url, USERS_COLLECTION, identity.uid, self.api_key
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&identity.id_token)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        let document: Value = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let fields = document.get("fields").cloned().unwrap_or(json!({}));
        let Some(role) = string_field(&fields, "role").and_then(|r| UserRole::parse(&r)) else {
            // A record without a readable role is treated the same as a
            // missing record: the transient no-role state.
            return Ok(None);
        };
        Ok(Some(UserProfile {
            uid: identity.uid.clone(),
            email: string_field(&fields, "email").unwrap_or_else(|| identity.email.clone()),
            role,
            display_name: string_field(&fields, "name"),
        }))
    }

    async fn set_display_name(&self, identity: &Identity, name: &str) -> PortResult<()> {
        let url = format!(
            "{}/{}/{}?updateMask.fieldPaths=name&key={}",
            self.base_url, USERS_COLLECTION, identity.uid, self.api_key
        );
        let body = json!({
            "fields": { "name": { "stringValue": name } }
        });
        let response = self
            .http
            .patch(&url)
            .bearer_auth(&identity.id_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }

    async fn delete_profile(&self, identity: &Identity) -> PortResult<()> {
        let url = format!(
            "{}/{}/{}?key={}",
            self.base_url, USERS_COLLECTION, identity.uid, self.api_key
        );
        let response = self
            .http
            .delete(&url)
            .bearer_auth(&identity.id_token)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }
}

//=========================================================================================
// `ClassStreamStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ClassStreamStore for FirestoreAdapter {
    async fn list_announcements(&self) -> PortResult<Vec<Announcement>> {
        let url = format!("{}:runQuery?key={}", self.base_url, self.api_key);
        let query = json!({
            "structuredQuery": {
                "from": [{ "collectionId": ANNOUNCEMENTS_COLLECTION }],
                "orderBy": [{
                    "field": { "fieldPath": "date" },
                    "direction": "DESCENDING"
                }]
            }
        });

        let response = self
            .http
            .post(&url)
            .json(&query)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let response = check_status(response).await?;
        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let mut announcements = Vec::new();
        for row in rows {
            let Some(document) = row.get("document") else {
                continue;
            };
            match decode_announcement(document) {
                Ok(announcement) => announcements.push(announcement),
                Err(e) => warn!("Skipping undecodable announcement: {}", e),
            }
        }
        Ok(announcements)
    }

    async fn create_announcement(&self, draft: AnnouncementDraft) -> PortResult<Announcement> {
        let url = format!(
            "{}/{}?key={}",
            self.base_url, ANNOUNCEMENTS_COLLECTION, self.api_key
        );
        let body = json!({ "fields": encode_announcement(&draft) });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let response = check_status(response).await?;
        let document: Value = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let id = document_id(&document).ok_or_else(|| {
            PortError::Unexpected("Created announcement carries no name/id.".to_string())
        })?;
        Ok(draft.into_record(id))
    }

    async fn delete_announcement(&self, id: &str) -> PortResult<()> {
        let url = format!(
            "{}/{}/{}?key={}",
            self.base_url, ANNOUNCEMENTS_COLLECTION, id, self.api_key
        );
        let response = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        check_status(response).await?;
        Ok(())
    }

    async fn fetch_members(&self, class_id: &str) -> PortResult<Option<ClassMembers>> {
        // One roster document per class, keyed by the class id.
        let url = format!(
            "{}/{}/{}?key={}",
            self.base_url, MEMBERS_COLLECTION, class_id, self.api_key
        );
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        let document: Value = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let fields = document.get("fields").cloned().unwrap_or(json!({}));
        Ok(Some(ClassMembers {
            class_id: class_id.to_string(),
            teachers: string_list_field(&fields, "teachers"),
            students: string_list_field(&fields, "students"),
        }))
    }
}

//=========================================================================================
// Wire encoding/decoding (Firestore value envelopes)
//=========================================================================================

/// Encodes a draft into the Firestore `fields` map.
fn encode_draft(draft: &DocumentDraft) -> Value {
    let mut fields = serde_json::Map::new();
    let mut put_string = |name: &str, value: &str| {
        fields.insert(name.to_string(), json!({ "stringValue": value }));
    };

    put_string("classId", &draft.class_id);
    put_string("title", &draft.title);
    put_string("fileName", &draft.file_name);
    put_string("subject", &draft.subject);
    if let Some(code) = &draft.subject_code {
        put_string("subjectCode", code);
    }
    put_string("description", &draft.description);
    put_string("size", &draft.size_label);
    put_string("uploadedBy", &draft.uploaded_by);
    if let Some(session) = &draft.session_label {
        put_string("session", session);
    }
    match &draft.state {
        ProcessingState::Uploading => put_string("status", "Uploading"),
        ProcessingState::Processed {
            locator,
            storage_path,
        } => {
            put_string("status", "Processed");
            put_string("url", locator);
            put_string("storagePath", storage_path);
        }
        ProcessingState::Errored { reason } => {
            put_string("status", "Error");
            put_string("errorReason", reason);
        }
    }
    if let Some(text) = &draft.extracted_text {
        put_string("textContent", text);
    }

    // Integer values travel as strings on the wire.
    fields.insert(
        "pages".to_string(),
        json!({ "integerValue": draft.page_count.to_string() }),
    );
    fields.insert(
        "createdAt".to_string(),
        json!({ "timestampValue": draft.created_at.to_rfc3339() }),
    );
    Value::Object(fields)
}

/// Decodes one Firestore document into a `DocumentRecord`.
fn decode_document(document: &Value) -> PortResult<DocumentRecord> {
    let id = document_id(document)
        .ok_or_else(|| PortError::Unexpected("Document carries no name/id.".to_string()))?;
    let fields = document
        .get("fields")
        .ok_or_else(|| PortError::Unexpected(format!("Document {} has no fields.", id)))?;

    let require = |name: &str| {
        string_field(fields, name)
            .ok_or_else(|| PortError::Unexpected(format!("Document {} missing '{}'.", id, name)))
    };

    let status = require("status")?;
    let state = match status.as_str() {
        "Uploading" => ProcessingState::Uploading,
        "Processed" => ProcessingState::Processed {
            locator: require("url")?,
            storage_path: require("storagePath")?,
        },
        "Error" => ProcessingState::Errored {
            reason: string_field(fields, "errorReason").unwrap_or_default(),
        },
        other => {
            return Err(PortError::Unexpected(format!(
                "Document {} has unknown status '{}'.",
                id, other
            )))
        }
    };

    Ok(DocumentRecord {
        class_id: require("classId")?,
        title: require("title")?,
        file_name: string_field(fields, "fileName").unwrap_or_default(),
        subject: string_field(fields, "subject").unwrap_or_default(),
        subject_code: string_field(fields, "subjectCode"),
        description: string_field(fields, "description").unwrap_or_default(),
        page_count: integer_field(fields, "pages").unwrap_or(1),
        size_label: string_field(fields, "size").unwrap_or_default(),
        created_at: timestamp_field(fields, "createdAt")
            .ok_or_else(|| PortError::Unexpected(format!("Document {} missing createdAt.", id)))?,
        state,
        extracted_text: string_field(fields, "textContent"),
        uploaded_by: string_field(fields, "uploadedBy").unwrap_or_default(),
        session_label: string_field(fields, "session"),
        id,
    })
}

/// Encodes an announcement draft into the Firestore `fields` map.
fn encode_announcement(draft: &AnnouncementDraft) -> Value {
    json!({
        "classId": { "stringValue": draft.class_id },
        "author": { "stringValue": draft.author },
        "content": { "stringValue": draft.content },
        "comments": { "integerValue": draft.comment_count.to_string() },
        "date": { "timestampValue": draft.created_at.to_rfc3339() },
    })
}

/// Decodes one Firestore document into an `Announcement`.
fn decode_announcement(document: &Value) -> PortResult<Announcement> {
    let id = document_id(document)
        .ok_or_else(|| PortError::Unexpected("Announcement carries no name/id.".to_string()))?;
    let fields = document
        .get("fields")
        .ok_or_else(|| PortError::Unexpected(format!("Announcement {} has no fields.", id)))?;

    Ok(Announcement {
        class_id: string_field(fields, "classId")
            .ok_or_else(|| PortError::Unexpected(format!("Announcement {} missing classId.", id)))?,
        author: string_field(fields, "author").unwrap_or_default(),
        content: string_field(fields, "content").unwrap_or_default(),
        comment_count: integer_field(fields, "comments").unwrap_or(0),
        created_at: timestamp_field(fields, "date").ok_or_else(|| {
            PortError::Unexpected(format!("Announcement {} missing date.", id))
        })?,
        id,
    })
}

/// The record id is the last segment of the resource name.
fn document_id(document: &Value) -> Option<String> {
    document
        .get("name")
        .and_then(Value::as_str)
        .and_then(|name| name.rsplit('/').next())
        .map(str::to_owned)
}

fn string_field(fields: &Value, name: &str) -> Option<String> {
    fields
        .get(name)
        .and_then(|v| v.get("stringValue"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

fn integer_field(fields: &Value, name: &str) -> Option<u32> {
    fields
        .get(name)
        .and_then(|v| v.get("integerValue"))
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
}

fn string_list_field(fields: &Value, name: &str) -> Vec<String> {
    fields
        .get(name)
        .and_then(|v| v.pointer("/arrayValue/values"))
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.get("stringValue").and_then(Value::as_str))
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn timestamp_field(fields: &Value, name: &str) -> Option<DateTime<Utc>> {
    fields
        .get(name)
        .and_then(|v| v.get("timestampValue"))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

/// Maps a non-success HTTP status to the generic port error.
async fn check_status(response: reqwest::Response) -> PortResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(match status {
        reqwest::StatusCode::NOT_FOUND => PortError::NotFound(body),
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            PortError::Unauthorized(body)
        }
        _ => PortError::Unexpected(format!("HTTP {}: {}", status, body)),
    })
}
