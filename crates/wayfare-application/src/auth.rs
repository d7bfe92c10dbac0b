//! Auth/token lifecycle manager.
//!
//! Owns the [`Session`] and drives the lifecycle state machine:
//!
//! ```text
//! anonymous -> authenticating -> authenticated -> refreshing -> authenticated
//!                                      |                |
//!                                      v                v
//!                                  anonymous        anonymous
//! ```
//!
//! Login/register persist the session through the storage adapter; a
//! background task refreshes the access token silently before it expires;
//! a 401 (surfaced as a `SessionExpired` bus event by the HTTP pipeline)
//! clears the session. The request that hit the 401 is NOT replayed; its
//! caller sees the error, and recovery happens through the refresh path.

use std::sync::{Arc, Mutex, RwLock};

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinHandle;
use wayfare_client::{ApiClient, endpoints::auth as auth_endpoints};
use wayfare_core::bus::EventBus;
use wayfare_core::error::{Result, WayfareError};
use wayfare_core::event::{AppEvent, EventKind, LogoutReason, NoticeLevel};
use wayfare_core::model::User;
use wayfare_core::session::{Session, TokenProvider};
use wayfare_core::storage::{KeyValueStore, KeyValueStoreExt, keys};

/// Lifecycle states of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
}

/// Shared, synchronously readable session slot.
///
/// The HTTP pipeline reads the bearer token through this handle on every
/// request; the auth manager is the only writer. Locks are held for reads
/// and swaps only, never across await points.
#[derive(Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Session> {
        self.inner.read().expect("session lock poisoned").clone()
    }

    pub fn set(&self, session: Option<Session>) {
        *self.inner.write().expect("session lock poisoned") = session;
    }
}

impl TokenProvider for SessionHandle {
    fn access_token(&self) -> Option<String> {
        self.inner
            .read()
            .expect("session lock poisoned")
            .as_ref()
            .map(|session| session.access_token.clone())
    }
}

/// Sign-in credentials.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Sign-up payload.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Credential-exchange response shared by login and register.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthPayload {
    user: User,
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshPayload {
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Cadence settings for the silent-refresh task.
#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    pub check_interval: std::time::Duration,
    pub lead_time: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            check_interval: std::time::Duration::from_secs(60),
            lead_time: Duration::minutes(5),
        }
    }
}

/// The auth lifecycle manager.
pub struct AuthManager {
    api: ApiClient,
    handle: SessionHandle,
    storage: Arc<dyn KeyValueStore>,
    bus: EventBus,
    state: RwLock<AuthState>,
    last_error: RwLock<Option<String>>,
    policy: RefreshPolicy,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl AuthManager {
    pub fn new(
        api: ApiClient,
        handle: SessionHandle,
        storage: Arc<dyn KeyValueStore>,
        bus: EventBus,
        policy: RefreshPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            api,
            handle,
            storage,
            bus,
            state: RwLock::new(AuthState::Anonymous),
            last_error: RwLock::new(None),
            policy,
            refresh_task: Mutex::new(None),
        })
    }

    pub fn state(&self) -> AuthState {
        *self.state.read().expect("auth state lock poisoned")
    }

    pub fn session(&self) -> Option<Session> {
        self.handle.get()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().expect("auth error lock poisoned").clone()
    }

    fn set_state(&self, state: AuthState) {
        *self.state.write().expect("auth state lock poisoned") = state;
    }

    fn set_error(&self, error: Option<String>) {
        *self.last_error.write().expect("auth error lock poisoned") = error;
    }

    /// Reacts to the HTTP pipeline's 401 signal: any `SessionExpired` event
    /// clears the local session. Call once after construction.
    pub fn bind_session_expiry(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        self.bus.on(EventKind::SessionExpired, move |_| {
            if manager.state() != AuthState::Anonymous {
                manager.clear_session(LogoutReason::SessionExpired);
            }
            Ok(())
        });
    }

    /// Signs in and persists the session.
    pub async fn login(&self, credentials: Credentials) -> Result<User> {
        self.set_state(AuthState::Authenticating);
        self.set_error(None);

        let result: Result<AuthPayload> =
            self.api.post(&auth_endpoints::login(), &credentials).await;

        match result {
            Ok(payload) => {
                let user = self.commit_session(payload);
                self.bus.emit(AppEvent::LoginSuccess { user: user.clone() });
                self.bus
                    .emit(AppEvent::notify(NoticeLevel::Success, "Signed in"));
                Ok(user)
            }
            Err(error) => {
                self.set_state(AuthState::Anonymous);
                self.set_error(Some(error.user_message()));
                Err(error)
            }
        }
    }

    /// Creates an account; a successful registration is also a login.
    pub async fn register(&self, registration: Registration) -> Result<User> {
        self.set_state(AuthState::Authenticating);
        self.set_error(None);

        let result: Result<AuthPayload> = self
            .api
            .post(&auth_endpoints::register(), &registration)
            .await;

        match result {
            Ok(payload) => {
                let user = self.commit_session(payload);
                self.bus
                    .emit(AppEvent::RegisterSuccess { user: user.clone() });
                self.bus.emit(AppEvent::LoginSuccess { user: user.clone() });
                self.bus
                    .emit(AppEvent::notify(NoticeLevel::Success, "Welcome to Wayfare"));
                Ok(user)
            }
            Err(error) => {
                self.set_state(AuthState::Anonymous);
                self.set_error(Some(error.user_message()));
                Err(error)
            }
        }
    }

    fn commit_session(&self, payload: AuthPayload) -> User {
        let mut session = Session::new(&payload.user, payload.token, payload.refresh_token);
        if !payload.permissions.is_empty() {
            session.permissions = payload.permissions;
        }

        self.storage.set_as(keys::AUTH_TOKEN, &session.access_token);
        if let Some(refresh_token) = &session.refresh_token {
            self.storage.set_as(keys::REFRESH_TOKEN, refresh_token);
        }
        self.storage.set_as(keys::USER_INFO, &payload.user);
        self.storage
            .set_as(keys::USER_PERMISSIONS, &session.permissions);
        self.storage
            .set_as(keys::LAST_LOGIN_TIME, &Utc::now().to_rfc3339());

        self.handle.set(Some(session));
        self.set_state(AuthState::Authenticated);
        payload.user
    }

    /// Signs out: best-effort server invalidation, unconditional local clear.
    pub async fn logout(&self) {
        if let Err(error) = self.api.post::<serde_json::Value, _>(
            &auth_endpoints::logout(),
            &json!({}),
        )
        .await
        {
            // Local cleanup must not be blocked by the server call.
            tracing::warn!(%error, "server-side logout failed, clearing locally");
        }
        self.clear_session(LogoutReason::UserInitiated);
    }

    /// Exchanges the refresh token for fresh tokens.
    ///
    /// A failed exchange destroys the session: with the refresh token
    /// rejected there is nothing left to recover with.
    pub async fn refresh(&self) -> Result<()> {
        let Some(session) = self.handle.get() else {
            return Err(WayfareError::auth("no session to refresh"));
        };
        let Some(refresh_token) = session.refresh_token.clone() else {
            self.clear_session(LogoutReason::RefreshFailed);
            return Err(WayfareError::auth("no refresh token available"));
        };

        self.set_state(AuthState::Refreshing);

        let result: Result<RefreshPayload> = self
            .api
            .post(
                &auth_endpoints::refresh(),
                &json!({ "refreshToken": refresh_token }),
            )
            .await;

        match result {
            Ok(payload) => {
                let refreshed =
                    session.with_refreshed_tokens(payload.token, payload.refresh_token);
                self.storage
                    .set_as(keys::AUTH_TOKEN, &refreshed.access_token);
                if let Some(refresh_token) = &refreshed.refresh_token {
                    self.storage.set_as(keys::REFRESH_TOKEN, refresh_token);
                }
                self.handle.set(Some(refreshed));
                self.set_state(AuthState::Authenticated);
                tracing::debug!("access token refreshed");
                Ok(())
            }
            Err(error) => {
                self.clear_session(LogoutReason::RefreshFailed);
                Err(error)
            }
        }
    }

    /// Restores a persisted session at startup.
    ///
    /// A restored token already inside the refresh lead time is refreshed
    /// immediately; when that fails the session is cleared and `false`
    /// returned.
    pub async fn restore(&self) -> bool {
        let token: Option<String> = self.storage.get_or(keys::AUTH_TOKEN, None);
        let user: Option<User> = self.storage.get_or(keys::USER_INFO, None);
        let (Some(token), Some(user)) = (token, user) else {
            return false;
        };

        let refresh_token: Option<String> = self.storage.get_or(keys::REFRESH_TOKEN, None);
        let permissions: Vec<String> = self.storage.get_or(keys::USER_PERMISSIONS, Vec::new());

        let mut session = Session::new(&user, token, refresh_token);
        if !permissions.is_empty() {
            session.permissions = permissions;
        }
        let expiring = session.is_expiring_within(self.policy.lead_time, Utc::now());

        self.handle.set(Some(session));
        self.set_state(AuthState::Authenticated);
        self.bus.emit(AppEvent::LoginSuccess { user });

        if expiring && self.refresh().await.is_err() {
            return false;
        }
        true
    }

    fn clear_session(&self, reason: LogoutReason) {
        self.handle.set(None);
        self.set_state(AuthState::Anonymous);
        self.storage.remove(keys::AUTH_TOKEN);
        self.storage.remove(keys::REFRESH_TOKEN);
        self.storage.remove(keys::USER_INFO);
        self.storage.remove(keys::USER_PERMISSIONS);
        self.bus.emit(AppEvent::Logout { reason });
    }

    /// Starts the silent-refresh background task: every tick it checks the
    /// token against the lead-time threshold and refreshes when due.
    /// Replaces a previously running task.
    pub fn spawn_silent_refresh(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.policy.check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if manager.state() != AuthState::Authenticated {
                    continue;
                }
                let due = manager
                    .handle
                    .get()
                    .is_some_and(|s| s.is_expiring_within(manager.policy.lead_time, Utc::now()));
                if due {
                    if let Err(error) = manager.refresh().await {
                        tracing::warn!(%error, "silent token refresh failed");
                    }
                }
            }
        });

        let mut slot = self.refresh_task.lock().expect("refresh task lock poisoned");
        if let Some(previous) = slot.replace(task) {
            previous.abort();
        }
    }

    /// Stops the silent-refresh task if one is running.
    pub fn stop_silent_refresh(&self) {
        if let Some(task) = self
            .refresh_task
            .lock()
            .expect("refresh task lock poisoned")
            .take()
        {
            task.abort();
        }
    }
}

impl Drop for AuthManager {
    fn drop(&mut self) {
        self.stop_silent_refresh();
    }
}
