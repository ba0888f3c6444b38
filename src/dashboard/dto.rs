use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::accounts::repo_types::{Role, User};

/// Data behind the login and registration pages.
#[derive(Debug, Serialize)]
pub struct FormView {
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HomeView {
    pub username: Option<String>,
    pub signed_in: bool,
    pub is_admin: bool,
}

/// The caller's own profile, rendered from the session cache.
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub user_id: Option<Uuid>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub image_url: Option<String>,
    pub role: Option<Role>,
    pub editing: bool,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UsersView {
    pub users: Vec<PublicUser>,
    pub editing: bool,
    pub message: Option<String>,
}

/// Public part of a user row.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub image_url: String,
    pub role: Role,
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            role: u.role(),
            id: u.id,
            username: u.username,
            email: u.email,
            image_url: u.image_url,
            created_at: u.created_at,
        }
    }
}
