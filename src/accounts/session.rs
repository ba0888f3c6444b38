//! Typed per-client session state.
//!
//! Everything lives under one key of the `tower_sessions::Session`. Handlers
//! load an [`AccountSession`], hand `&mut` to the service layer and save it
//! back before responding. The user fields are a display cache of the row as
//! seen at login (or at the caller's last self-update); mutations never read
//! them as a source of truth.

use serde::{Deserialize, Serialize};
use tower_sessions::{session, Session};
use uuid::Uuid;

use super::repo_types::{Role, User};

pub const SESSION_KEY: &str = "account";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSession {
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
    pub role: Option<Role>,
    pub password_hash: Option<String>,
    #[serde(default)]
    pub editing: bool,
    /// One-shot notice shown by the next rendered view.
    pub message: Option<String>,
}

impl AccountSession {
    pub async fn load(session: &Session) -> Result<Self, session::Error> {
        Ok(session.get::<Self>(SESSION_KEY).await?.unwrap_or_default())
    }

    pub async fn save(&self, session: &Session) -> Result<(), session::Error> {
        session.insert(SESSION_KEY, self).await
    }

    pub fn sign_in(&mut self, user: &User) {
        self.user_id = Some(user.id);
        self.role = Some(user.role());
        self.refresh_from(user);
    }

    /// Copies the display fields of `user` into the cache.
    pub fn refresh_from(&mut self, user: &User) {
        self.username = Some(user.username.clone());
        self.email = Some(user.email.clone());
        self.image_url = Some(user.image_url.clone());
        self.password_hash = Some(user.password_hash.clone());
    }

    /// Drops the role, the notice and edit mode. Identity fields stay put.
    pub fn sign_out(&mut self) {
        self.role = None;
        self.message = None;
        self.editing = false;
    }

    pub fn flash(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn take_message(&mut self) -> Option<String> {
        self.message.take()
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_some_and(Role::is_admin)
    }
}
