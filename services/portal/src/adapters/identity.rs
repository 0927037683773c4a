//! services/portal/src/adapters/identity.rs
//!
//! This module contains the identity-provider adapter, the concrete
//! implementation of the `IdentityProvider` port against the Identity
//! Toolkit REST API (email + password accounts).
//!
//! The adapter is also the source of session-change events: every sign-in,
//! sign-up and sign-out is published on a watch channel that backs
//! `session_events()`.

use crate::adapters::firestore::http_client;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use studyhall_core::domain::Identity;
use studyhall_core::ports::{IdentityProvider, PortError, PortResult, SessionStream};
use tokio::sync::watch;

/// Overall deadline for any single identity request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An identity adapter that implements the `IdentityProvider` port.
pub struct IdentityToolkitAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    events: watch::Sender<Option<Identity>>,
}

impl IdentityToolkitAdapter {
    /// Creates a new `IdentityToolkitAdapter`.
    pub fn new(api_key: String) -> Self {
        Self::with_base_url("https://identitytoolkit.googleapis.com".to_string(), api_key)
    }

    /// Constructor with an explicit endpoint, for emulators.
    pub fn with_base_url(base_url: String, api_key: String) -> Self {
        let (events, _) = watch::channel(None);
        Self {
            http: http_client(REQUEST_TIMEOUT),
            base_url,
            api_key,
            events,
        }
    }

    fn endpoint(&self, operation: &str) -> String {
        format!(
            "{}/v1/accounts:{}?key={}",
            self.base_url, operation, self.api_key
        )
    }

    /// Issues one Identity Toolkit call and surfaces the provider's error
    /// message verbatim on failure.
    async fn call(&self, operation: &str, body: Value) -> PortResult<Value> {
        let response = self
            .http
            .post(self.endpoint(operation))
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if status.is_success() {
            return Ok(payload);
        }

        let message = payload
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN_ERROR")
            .to_string();
        Err(match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::BAD_REQUEST => {
                PortError::Unauthorized(message)
            }
            reqwest::StatusCode::NOT_FOUND => PortError::NotFound(message),
            _ => PortError::Unexpected(message),
        })
    }

    fn decode_identity(&self, payload: &Value, fallback_email: &str) -> PortResult<Identity> {
        let uid = payload
            .get("localId")
            .and_then(Value::as_str)
            .ok_or_else(|| PortError::Unexpected("Provider response has no localId.".into()))?;
        let id_token = payload
            .get("idToken")
            .and_then(Value::as_str)
            .ok_or_else(|| PortError::Unexpected("Provider response has no idToken.".into()))?;
        let email = payload
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or(fallback_email);
        Ok(Identity {
            uid: uid.to_string(),
            email: email.to_string(),
            id_token: id_token.to_string(),
        })
    }

    fn publish(&self, identity: Option<Identity>) {
        // send_replace so publishing works with zero subscribers.
        self.events.send_replace(identity);
    }
}

//=========================================================================================
// `IdentityProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityProvider for IdentityToolkitAdapter {
    async fn sign_in(&self, email: &str, password: &str) -> PortResult<Identity> {
        let payload = self
            .call(
                "signInWithPassword",
                json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true
                }),
            )
            .await?;
        let identity = self.decode_identity(&payload, email)?;
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Identity> {
        let payload = self
            .call(
                "signUp",
                json!({
                    "email": email,
                    "password": password,
                    "returnSecureToken": true
                }),
            )
            .await?;
        let identity = self.decode_identity(&payload, email)?;
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> PortResult<()> {
        // The REST surface is stateless; signing out only clears the local
        // session and notifies listeners.
        self.publish(None);
        Ok(())
    }

    async fn reauthenticate(&self, identity: &Identity, password: &str) -> PortResult<Identity> {
        // Re-authentication is a fresh password sign-in for the same email.
        let payload = self
            .call(
                "signInWithPassword",
                json!({
                    "email": identity.email,
                    "password": password,
                    "returnSecureToken": true
                }),
            )
            .await?;
        self.decode_identity(&payload, &identity.email)
    }

    async fn change_password(
        &self,
        identity: &Identity,
        new_password: &str,
    ) -> PortResult<Identity> {
        let payload = self
            .call(
                "update",
                json!({
                    "idToken": identity.id_token,
                    "password": new_password,
                    "returnSecureToken": true
                }),
            )
            .await?;
        self.decode_identity(&payload, &identity.email)
    }

    async fn delete_identity(&self, identity: &Identity) -> PortResult<()> {
        self.call("delete", json!({ "idToken": identity.id_token }))
            .await?;
        self.publish(None);
        Ok(())
    }

    fn session_events(&self) -> SessionStream {
        let mut receiver = self.events.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                let current = receiver.borrow_and_update().clone();
                yield current;
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        })
    }
}
