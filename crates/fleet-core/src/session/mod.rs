//! Dashboard sign-in sessions.
//!
//! A [`SessionGate`] tracks who is signed in and persists that to one of two
//! [`SessionStorage`] tiers: a durable one used when "remember me" is set and
//! a tab-scoped one otherwise. Each tier has its own expiry window.

mod provider;
mod storage;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use provider::{HttpIdentityProvider, IdentityProvider, NoopIdentityProvider};
pub use storage::{FileSessionStorage, MemorySessionStorage, SessionStorage};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Not signed in")]
    NotAuthenticated,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Session storage error: {0}")]
    Storage(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
    #[error("Verification failed: {0}")]
    Verification(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Profile returned by a completed third-party sign-in.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FederatedProfile {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl fmt::Debug for FederatedProfile {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("FederatedProfile")
            .field("uid", &self.uid)
            .field("display_name", &self.display_name)
            .field("email", &self.email)
            .field("photo_url", &self.photo_url)
            .field("provider", &self.provider)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Identity {
    Local { username: String },
    Federated(FederatedProfile),
}

impl Identity {
    /// Name to show in the dashboard header.
    pub fn display_name(&self) -> &str {
        match self {
            Self::Local { username } => username,
            Self::Federated(profile) => profile
                .display_name
                .as_deref()
                .or(profile.email.as_deref())
                .unwrap_or(&profile.uid),
        }
    }

    pub fn provider(&self) -> &str {
        match self {
            Self::Local { .. } => "local",
            Self::Federated(profile) => &profile.provider,
        }
    }
}

/// Persisted as one flat blob: identity fields, `loginTime`, `rememberMe`
/// and `provider` (`"local"` for local sign-ins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "StoredSession", try_from = "StoredSession")]
pub struct Session {
    pub identity: Identity,
    pub login_time: DateTime<Utc>,
    pub remember_me: bool,
}

impl Session {
    pub fn age_at(&self, now: DateTime<Utc>) -> TimeDelta {
        now.signed_duration_since(self.login_time)
    }
}

const LOCAL_PROVIDER: &str = "local";

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    login_time: DateTime<Utc>,
    remember_me: bool,
    provider: String,
}

impl From<Session> for StoredSession {
    fn from(session: Session) -> Self {
        let mut stored = Self {
            username: None,
            uid: None,
            display_name: None,
            email: None,
            photo_url: None,
            access_token: None,
            login_time: session.login_time,
            remember_me: session.remember_me,
            provider: LOCAL_PROVIDER.to_string(),
        };
        match session.identity {
            Identity::Local { username } => stored.username = Some(username),
            Identity::Federated(profile) => {
                stored.uid = Some(profile.uid);
                stored.display_name = profile.display_name;
                stored.email = profile.email;
                stored.photo_url = profile.photo_url;
                stored.access_token = profile.access_token;
                stored.provider = profile.provider;
            }
        }
        stored
    }
}

impl TryFrom<StoredSession> for Session {
    type Error = String;

    fn try_from(stored: StoredSession) -> Result<Self, Self::Error> {
        let identity = match (stored.uid, stored.username) {
            (Some(uid), _) => Identity::Federated(FederatedProfile {
                uid,
                display_name: stored.display_name,
                email: stored.email,
                photo_url: stored.photo_url,
                provider: stored.provider,
                access_token: stored.access_token,
            }),
            (None, Some(username)) if stored.provider == LOCAL_PROVIDER => {
                Identity::Local { username }
            }
            _ => {
                return Err(format!(
                    "session for provider '{}' has no identity",
                    stored.provider
                ))
            }
        };
        Ok(Self {
            identity,
            login_time: stored.login_time,
            remember_me: stored.remember_me,
        })
    }
}

/// How long a session stays valid in each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindows {
    pub durable: TimeDelta,
    pub tab: TimeDelta,
}

impl Default for SessionWindows {
    fn default() -> Self {
        Self {
            durable: TimeDelta::hours(24),
            tab: TimeDelta::hours(8),
        }
    }
}

/// Checks a username/password pair for local sign-in.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// Accepts exactly one configured username/password pair.
#[derive(Clone)]
pub struct StaticCredentialVerifier {
    username: String,
    password: String,
}

impl StaticCredentialVerifier {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for StaticCredentialVerifier {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StaticCredentialVerifier")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl CredentialVerifier for StaticCredentialVerifier {
    fn verify(&self, username: &str, password: &str) -> bool {
        !self.username.is_empty() && self.username == username.trim() && self.password == password
    }
}

/// Sign-in state machine: anonymous until a local or federated login.
pub struct SessionGate<P = NoopIdentityProvider> {
    durable: Arc<dyn SessionStorage>,
    tab: Arc<dyn SessionStorage>,
    verifier: Arc<dyn CredentialVerifier>,
    provider: P,
    windows: SessionWindows,
    current: Mutex<Option<Session>>,
}

impl<P> fmt::Debug for SessionGate<P> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SessionGate")
            .field("windows", &self.windows)
            .field("current", &self.lock_current().as_ref())
            .finish_non_exhaustive()
    }
}

impl SessionGate<NoopIdentityProvider> {
    pub fn new(
        durable: Arc<dyn SessionStorage>,
        tab: Arc<dyn SessionStorage>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            durable,
            tab,
            verifier,
            provider: NoopIdentityProvider,
            windows: SessionWindows::default(),
            current: Mutex::new(None),
        }
    }
}

impl<P: IdentityProvider> SessionGate<P> {
    #[must_use]
    pub fn with_provider<Q: IdentityProvider>(self, provider: Q) -> SessionGate<Q> {
        SessionGate {
            durable: self.durable,
            tab: self.tab,
            verifier: self.verifier,
            provider,
            windows: self.windows,
            current: self.current,
        }
    }

    #[must_use]
    pub const fn with_windows(mut self, windows: SessionWindows) -> Self {
        self.windows = windows;
        self
    }

    /// The signed-in session, if any.
    pub fn state(&self) -> Option<Session> {
        self.lock_current().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock_current().is_some()
    }

    pub fn login_local(
        &self,
        username: &str,
        password: &str,
        remember_me: bool,
    ) -> AuthResult<Session> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        if !self.verifier.verify(username, password) {
            tracing::warn!("Rejected local sign-in for '{}'", username);
            return Err(AuthError::InvalidCredentials);
        }

        let session = Session {
            identity: Identity::Local {
                username: username.to_string(),
            },
            login_time: Utc::now(),
            remember_me,
        };
        self.establish(session)
    }

    /// Record a sign-in that an external provider already completed.
    pub fn login_federated(
        &self,
        profile: FederatedProfile,
        remember_me: bool,
    ) -> AuthResult<Session> {
        if profile.uid.trim().is_empty() {
            return Err(AuthError::Verification(
                "provider result has no user id".to_string(),
            ));
        }
        let session = Session {
            identity: Identity::Federated(profile),
            login_time: Utc::now(),
            remember_me,
        };
        self.establish(session)
    }

    pub fn restore_on_load(&self) -> Option<Session> {
        self.restore_on_load_at(Utc::now())
    }

    /// Pick up a persisted session, durable tier first.
    ///
    /// Sessions older than their tier's window are cleared and skipped.
    pub fn restore_on_load_at(&self, now: DateTime<Utc>) -> Option<Session> {
        let tiers = [
            ("durable", &self.durable, self.windows.durable),
            ("tab", &self.tab, self.windows.tab),
        ];

        for (tier, storage, window) in tiers {
            let stored = match storage.load_session() {
                Ok(stored) => stored,
                Err(error) => {
                    tracing::warn!("Discarding unreadable {} session: {}", tier, error);
                    clear_quietly(storage.as_ref(), tier);
                    continue;
                }
            };
            let Some(session) = stored else {
                continue;
            };

            if session.age_at(now) > window {
                tracing::info!("Stored {} session expired; clearing it", tier);
                clear_quietly(storage.as_ref(), tier);
                continue;
            }

            tracing::info!(
                "Restored {} session for {}",
                tier,
                session.identity.display_name()
            );
            *self.lock_current() = Some(session.clone());
            return Some(session);
        }
        None
    }

    /// Sign out everywhere.
    ///
    /// Provider sign-out failures are logged; local state is cleared anyway.
    pub async fn logout(&self) -> AuthResult<()> {
        let previous = self.lock_current().take();

        if let Some(Session {
            identity: Identity::Federated(profile),
            ..
        }) = &previous
        {
            if let Err(error) = self.provider.sign_out(profile).await {
                tracing::warn!("Identity provider sign-out failed: {}", error);
            }
        }

        let durable = self.durable.clear_session();
        let tab = self.tab.clear_session();
        if let Some(session) = previous {
            tracing::info!("Signed out {}", session.identity.display_name());
        }
        durable.and(tab)
    }

    /// Reset the login time of the current session to now.
    pub fn refresh(&self) -> AuthResult<Session> {
        let mut current = self.lock_current();
        let Some(session) = current.as_mut() else {
            return Err(AuthError::NotAuthenticated);
        };
        session.login_time = Utc::now();
        let refreshed = session.clone();
        drop(current);

        self.tier(refreshed.remember_me).save_session(&refreshed)?;
        tracing::debug!("Refreshed session for {}", refreshed.identity.display_name());
        Ok(refreshed)
    }

    fn establish(&self, session: Session) -> AuthResult<Session> {
        self.tier(session.remember_me).save_session(&session)?;
        clear_quietly(
            self.tier(!session.remember_me).as_ref(),
            if session.remember_me { "tab" } else { "durable" },
        );
        tracing::info!(
            "Signed in {} via {}",
            session.identity.display_name(),
            session.identity.provider()
        );
        *self.lock_current() = Some(session.clone());
        Ok(session)
    }

    const fn tier(&self, remember_me: bool) -> &Arc<dyn SessionStorage> {
        if remember_me {
            &self.durable
        } else {
            &self.tab
        }
    }
}

impl<P> SessionGate<P> {
    fn lock_current(&self) -> MutexGuard<'_, Option<Session>> {
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn clear_quietly(storage: &dyn SessionStorage, tier: &str) {
    if let Err(error) = storage.clear_session() {
        tracing::warn!("Failed to clear {} session: {}", tier, error);
    }
}
