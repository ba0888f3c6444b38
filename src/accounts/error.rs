use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

/// Failures that end a request with a 500. Authentication failures are not
/// errors; they redirect with a notice.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Error during user registration")]
    Register(#[source] anyhow::Error),
    #[error("Error during login")]
    Login(#[source] anyhow::Error),
    #[error("Error during logout")]
    Logout(#[source] anyhow::Error),
    #[error("Error during user update")]
    Update(#[source] anyhow::Error),
    #[error("Error during user deletion")]
    Delete(#[source] anyhow::Error),
    #[error("Error loading page")]
    View(#[source] anyhow::Error),
}

impl AccountError {
    fn cause(&self) -> &anyhow::Error {
        match self {
            AccountError::Register(e)
            | AccountError::Login(e)
            | AccountError::Logout(e)
            | AccountError::Update(e)
            | AccountError::Delete(e)
            | AccountError::View(e) => e,
        }
    }
}

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        let cause = format!("{:#}", self.cause());
        error!(error = %cause, "{}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
