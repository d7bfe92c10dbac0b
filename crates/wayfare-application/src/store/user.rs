//! User profile and preference store.
//!
//! Profile data mirrors the server; settings are purely local and persist
//! through the storage adapter. On startup [`UserStore::restore`] rebuilds
//! both from storage so the UI renders without waiting for the network.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use wayfare_client::{ApiClient, endpoints::auth};
use wayfare_core::bus::EventBus;
use wayfare_core::error::{Result, WayfareError};
use wayfare_core::event::{AppEvent, NoticeLevel};
use wayfare_core::model::{User, UserSettings};
use wayfare_core::storage::{KeyValueStore, KeyValueStoreExt, keys};

/// Per-operation loading flags for profile actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserLoading {
    pub profile: bool,
    pub update: bool,
    pub password: bool,
}

/// Client-set profile fields.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordChange<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

/// State container for the signed-in user's profile and settings.
#[derive(Clone)]
pub struct UserStore {
    api: ApiClient,
    bus: EventBus,
    storage: Arc<dyn KeyValueStore>,
    user: Arc<RwLock<Option<User>>>,
    settings: Arc<RwLock<UserSettings>>,
    loading: Arc<RwLock<UserLoading>>,
}

impl UserStore {
    pub fn new(api: ApiClient, bus: EventBus, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            api,
            bus,
            storage,
            user: Arc::new(RwLock::new(None)),
            settings: Arc::new(RwLock::new(UserSettings::default())),
            loading: Arc::new(RwLock::new(UserLoading::default())),
        }
    }

    pub async fn current_user(&self) -> Option<User> {
        self.user.read().await.clone()
    }

    pub async fn settings(&self) -> UserSettings {
        self.settings.read().await.clone()
    }

    pub async fn loading(&self) -> UserLoading {
        *self.loading.read().await
    }

    pub async fn has_permission(&self, permission: &str) -> bool {
        self.user
            .read()
            .await
            .as_ref()
            .is_some_and(|user| user.has_permission(permission))
    }

    pub async fn is_admin(&self) -> bool {
        self.user.read().await.as_ref().is_some_and(User::is_admin)
    }

    /// Rebuilds profile and settings from storage. Returns whether a
    /// persisted profile was found.
    pub async fn restore(&self) -> bool {
        let stored: Option<User> = self.storage.get_or(keys::USER_INFO, None);
        let settings: UserSettings = self.storage.get_or(keys::USER_SETTINGS, UserSettings::default());
        *self.settings.write().await = settings;
        match stored {
            Some(user) => {
                *self.user.write().await = Some(user);
                true
            }
            None => false,
        }
    }

    /// Fetches the canonical profile from the server and persists it.
    pub async fn fetch_profile(&self) -> Result<User> {
        self.loading.write().await.profile = true;

        let result: Result<User> = self.api.get(&auth::profile(), Vec::new()).await;

        self.loading.write().await.profile = false;
        match result {
            Ok(user) => {
                self.storage.set_as(keys::USER_INFO, &user);
                *self.user.write().await = Some(user.clone());
                Ok(user)
            }
            Err(error) => Err(error),
        }
    }

    /// Pushes profile changes and commits the server's canonical record.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User> {
        self.loading.write().await.update = true;

        let result: Result<User> = self.api.put(&auth::profile(), &update).await;

        self.loading.write().await.update = false;
        match result {
            Ok(user) => {
                self.storage.set_as(keys::USER_INFO, &user);
                *self.user.write().await = Some(user.clone());
                self.bus.emit(AppEvent::ProfileUpdated { user: user.clone() });
                self.bus
                    .emit(AppEvent::notify(NoticeLevel::Success, "Profile updated"));
                Ok(user)
            }
            Err(error) => Err(error),
        }
    }

    /// Changes the account password. The new password is validated locally
    /// first; a validation failure never reaches the network layer.
    pub async fn change_password(&self, current: &str, new: &str) -> Result<()> {
        if new.len() < 8 {
            return Err(WayfareError::validation(
                "newPassword",
                "password must be at least 8 characters",
            ));
        }
        if new == current {
            return Err(WayfareError::validation(
                "newPassword",
                "new password must differ from the current one",
            ));
        }

        self.loading.write().await.password = true;

        let result: Result<()> = self
            .api
            .post(
                &auth::password(),
                &PasswordChange {
                    current_password: current,
                    new_password: new,
                },
            )
            .await;

        self.loading.write().await.password = false;
        match result {
            Ok(()) => {
                self.bus
                    .emit(AppEvent::notify(NoticeLevel::Success, "Password changed"));
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// Replaces the local settings and persists them.
    pub async fn update_settings(&self, settings: UserSettings) {
        self.storage.set_as(keys::USER_SETTINGS, &settings);
        *self.settings.write().await = settings;
    }

    /// Clears profile state and the persisted keys (logout path).
    pub async fn reset(&self) {
        *self.user.write().await = None;
        *self.settings.write().await = UserSettings::default();
        self.storage.remove(keys::USER_INFO);
        self.storage.remove(keys::USER_SETTINGS);
        self.storage.remove(keys::USER_PERMISSIONS);
    }
}
