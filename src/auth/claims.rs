use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::repo_types::Role;

/// JWT payload carried by the `token` cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,         // user ID
    pub username: String,
    pub email: String,
    pub role: Role,
    pub image_url: String,
    pub iat: usize,        // issued at (unix timestamp)
    pub exp: usize,        // expires at (unix timestamp)
    pub iss: String,       // issuer
    pub aud: String,       // audience
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
