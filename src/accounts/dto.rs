use bytes::Bytes;
use serde::Deserialize;

/// Multipart form shared by registration and profile edit.
#[derive(Debug, Default)]
pub struct AccountForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub image: Option<ImageUpload>,
}

#[derive(Debug)]
pub struct ImageUpload {
    pub body: Bytes,
    pub content_type: String,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Input to registration once any upload has been stored.
#[derive(Debug)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Reference of the stored upload, if one was sent.
    pub image_url: Option<String>,
}

/// Input to a profile edit. `None` keeps the current value.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub image_url: Option<String>,
}

impl ProfileUpdate {
    /// Empty text fields mean "leave unchanged".
    pub fn from_form(form: AccountForm, image_url: Option<String>) -> Self {
        Self {
            username: non_blank(form.username),
            email: non_blank(form.email),
            password: non_blank(form.password),
            image_url,
        }
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Where to send the browser next and what to do with the token cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Next {
    pub location: String,
    pub token: TokenCookie,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCookie {
    Keep,
    Set(String),
    Clear,
}

impl Next {
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            token: TokenCookie::Keep,
        }
    }

    pub fn with_token(mut self, token: TokenCookie) -> Self {
        self.token = token;
        self
    }
}
