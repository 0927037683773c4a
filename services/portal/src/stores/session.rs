//! services/portal/src/stores/session.rs
//!
//! The role & session gate: resolves an authenticated identity to a role and
//! profile-completeness flag, and gates which views are reachable.
//!
//! One store instance spans one session: constructed before sign-in, torn
//! down at sign-out. The phase machine is
//! `Unauthenticated -> Authenticating -> { NoRole, NoProfile, Ready }`.

use crate::error::PortalError;
use futures::StreamExt;
use std::sync::{Arc, Mutex, RwLock};
use studyhall_core::domain::{Identity, UserProfile, UserRole};
use studyhall_core::ports::{IdentityProvider, ProfileStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

//=========================================================================================
// SessionPhase
//=========================================================================================

/// Where the current session sits in the gate's state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    Authenticating,
    /// Authenticated but no profile record was found. Role assignment is
    /// expected to already exist for any signup path, so this is a
    /// transient state; views block on a waiting indicator.
    NoRole { identity: Identity },
    /// Authenticated with a role but no display name; every role-specific
    /// view stays behind the forced profile-completion step.
    NoProfile { identity: Identity, role: UserRole },
    Ready {
        identity: Identity,
        profile: UserProfile,
    },
}

impl SessionPhase {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::NoRole { identity }
            | Self::NoProfile { identity, .. }
            | Self::Ready { identity, .. } => Some(identity),
            _ => None,
        }
    }

    pub fn role(&self) -> Option<UserRole> {
        match self {
            Self::NoProfile { role, .. } => Some(*role),
            Self::Ready { profile, .. } => Some(profile.role),
            _ => None,
        }
    }

    /// True when the forced profile-completion flow must run: a role exists
    /// but the display name is still unset.
    pub fn needs_profile_completion(&self) -> bool {
        matches!(self, Self::NoProfile { .. })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

//=========================================================================================
// SessionStore
//=========================================================================================

/// Dependency-injected session store wrapping the identity provider and the
/// profile records.
pub struct SessionStore {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    phase: RwLock<SessionPhase>,
    /// Currently selected class group for the signed-in user's views.
    active_class: RwLock<Option<String>>,
    revision: watch::Sender<u64>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(identity: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            identity,
            profiles,
            phase: RwLock::new(SessionPhase::Unauthenticated),
            active_class: RwLock::new(None),
            revision,
            listener: Mutex::new(None),
        }
    }

    /// Spawns the consumer of the provider's session-change events so that
    /// externally-restored sessions also resolve to a phase.
    pub fn attach(self: &Arc<Self>) {
        let mut events = self.identity.session_events();
        // The task holds a Weak so an attached store can still be dropped;
        // the upgrade failing is the task's stop signal.
        let store = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let Some(store) = store.upgrade() else {
                    break;
                };
                match event {
                    Some(identity) => {
                        if let Err(e) = store.resolve(identity).await {
                            error!("Failed to resolve session phase: {}", e);
                        }
                    }
                    None => store.set_phase(SessionPhase::Unauthenticated),
                }
            }
        });

        let mut slot = self.listener.lock().expect("listener lock poisoned");
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    /// Stops the event consumer. Part of session teardown.
    pub fn detach(&self) {
        if let Some(handle) = self.listener.lock().expect("listener lock poisoned").take() {
            handle.abort();
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase.read().expect("phase lock poisoned").clone()
    }

    /// Registers an observer; the value increments on every phase change.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn set_active_class(&self, class_id: &str) {
        *self.active_class.write().expect("class lock poisoned") = Some(class_id.to_string());
        self.notify();
    }

    pub fn active_class(&self) -> Option<String> {
        self.active_class.read().expect("class lock poisoned").clone()
    }

    fn set_phase(&self, next: SessionPhase) {
        *self.phase.write().expect("phase lock poisoned") = next;
        self.notify();
    }

    fn notify(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    fn current_identity(&self) -> Result<Identity, PortalError> {
        self.phase()
            .identity()
            .cloned()
            .ok_or_else(|| PortalError::Auth("No authenticated user.".to_string()))
    }

    /// Fetches the role and name for an identity and derives the phase.
    async fn resolve(&self, identity: Identity) -> Result<(), PortalError> {
        let next = match self.profiles.fetch_profile(&identity).await {
            Ok(Some(profile)) => {
                if profile.display_name.is_none() {
                    SessionPhase::NoProfile {
                        identity,
                        role: profile.role,
                    }
                } else {
                    SessionPhase::Ready { identity, profile }
                }
            }
            Ok(None) => {
                warn!(uid = %identity.uid, "No profile record for identity; blocking on NoRole.");
                SessionPhase::NoRole { identity }
            }
            Err(e) => {
                // Keep the identity usable; the next event re-resolves.
                warn!("Profile fetch failed: {}", e);
                SessionPhase::NoRole { identity }
            }
        };
        self.set_phase(next);
        Ok(())
    }

    //=====================================================================================
    // Sign-in / Sign-up / Sign-out
    //=====================================================================================

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), PortalError> {
        self.set_phase(SessionPhase::Authenticating);
        let identity = self
            .identity
            .sign_in(email, password)
            .await
            .map_err(|e| self.fail_auth(e))?;
        self.resolve(identity).await
    }

    /// Signs up with a caller-chosen role and writes the profile record.
    /// The role is immutable afterwards; the display name stays unset until
    /// the profile-completion step.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<(), PortalError> {
        self.set_phase(SessionPhase::Authenticating);
        let identity = self
            .identity
            .sign_up(email, password)
            .await
            .map_err(|e| self.fail_auth(e))?;
        self.profiles
            .create_profile(&identity, role)
            .await
            .map_err(|e| PortalError::Auth(e.to_string()))?;
        self.resolve(identity).await
    }

    pub async fn sign_out(&self) -> Result<(), PortalError> {
        self.identity
            .sign_out()
            .await
            .map_err(|e| PortalError::Auth(e.to_string()))?;
        *self.active_class.write().expect("class lock poisoned") = None;
        self.set_phase(SessionPhase::Unauthenticated);
        info!("Signed out.");
        Ok(())
    }

    fn fail_auth(&self, e: studyhall_core::ports::PortError) -> PortalError {
        self.set_phase(SessionPhase::Unauthenticated);
        PortalError::Auth(e.to_string())
    }

    //=====================================================================================
    // Profile operations
    //=====================================================================================

    /// Sets the display name. Used by both the forced profile-completion
    /// step and the settings page.
    pub async fn update_display_name(&self, name: &str) -> Result<(), PortalError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PortalError::Validation(
                "Display name cannot be empty.".to_string(),
            ));
        }
        let identity = self.current_identity()?;
        self.profiles
            .set_display_name(&identity, name)
            .await
            .map_err(|e| PortalError::Auth(e.to_string()))?;
        self.resolve(identity).await
    }

    /// Changes the account password. Requires re-authentication with the
    /// current password first; a mismatch surfaces as a
    /// re-authentication failure.
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), PortalError> {
        let identity = self.current_identity()?;
        let fresh = self
            .identity
            .reauthenticate(&identity, current_password)
            .await
            .map_err(|e| PortalError::Reauthentication(e.to_string()))?;
        let updated = self
            .identity
            .change_password(&fresh, new_password)
            .await
            .map_err(|e| PortalError::Auth(e.to_string()))?;
        // Keep the refreshed token for subsequent provider operations.
        self.refresh_identity(updated);
        Ok(())
    }

    /// Deletes the account. Requires re-authentication; the profile record
    /// is deleted before the identity so a failure cannot leave a profile
    /// without an owning identity (which could leak data). An identity
    /// without a profile is the preferred orphan.
    pub async fn delete_account(&self, current_password: &str) -> Result<(), PortalError> {
        let identity = self.current_identity()?;
        let fresh = self
            .identity
            .reauthenticate(&identity, current_password)
            .await
            .map_err(|e| PortalError::Reauthentication(e.to_string()))?;
        self.profiles
            .delete_profile(&fresh)
            .await
            .map_err(|e| PortalError::Auth(e.to_string()))?;
        self.identity
            .delete_identity(&fresh)
            .await
            .map_err(|e| PortalError::Auth(e.to_string()))?;
        *self.active_class.write().expect("class lock poisoned") = None;
        self.set_phase(SessionPhase::Unauthenticated);
        info!("Account deleted.");
        Ok(())
    }

    /// Swaps the identity inside the current phase for a re-issued one.
    fn refresh_identity(&self, fresh: Identity) {
        let mut phase = self.phase.write().expect("phase lock poisoned");
        match &mut *phase {
            SessionPhase::NoRole { identity }
            | SessionPhase::NoProfile { identity, .. }
            | SessionPhase::Ready { identity, .. } => *identity = fresh,
            _ => {}
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.detach();
    }
}
