use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_sessions::Session;
use tracing::instrument;

use super::dto::{FormView, HomeView, ProfileView, PublicUser, UsersView};
use crate::{
    accounts::{error::AccountError, session::AccountSession},
    auth::extractors::{AdminUser, AuthUser},
    state::AppState,
};

pub fn view_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/faqs", get(faqs))
        .route("/login", get(login_page))
        .route("/register", get(register_page))
        .route("/dashboard/user", get(user_dashboard))
        .route("/dashboard/dash-admin", get(admin_dashboard))
        .route("/dashboard/dash-users", get(users_dashboard))
}

/// Loads the session, lets `render` read and consume it, then saves it back.
async fn with_session<T>(
    session: &Session,
    render: impl FnOnce(&mut AccountSession) -> T,
) -> Result<T, AccountError> {
    let mut account = AccountSession::load(session)
        .await
        .map_err(|e| AccountError::View(e.into()))?;
    let view = render(&mut account);
    account
        .save(session)
        .await
        .map_err(|e| AccountError::View(e.into()))?;
    Ok(view)
}

fn profile(account: &mut AccountSession) -> ProfileView {
    ProfileView {
        user_id: account.user_id,
        username: account.username.clone(),
        email: account.email.clone(),
        image_url: account.image_url.clone(),
        role: account.role,
        editing: account.editing,
        message: account.take_message(),
    }
}

pub async fn home(session: Session) -> Result<Json<HomeView>, AccountError> {
    let view = with_session(&session, |account| {
        account.editing = false;
        HomeView {
            username: account.username.clone(),
            signed_in: account.role.is_some(),
            is_admin: account.is_admin(),
        }
    })
    .await?;
    Ok(Json(view))
}

/// FAQ page: same session data as the home page.
pub async fn faqs(session: Session) -> Result<Json<HomeView>, AccountError> {
    home(session).await
}

pub async fn login_page(session: Session) -> Result<Json<FormView>, AccountError> {
    let message = with_session(&session, AccountSession::take_message).await?;
    Ok(Json(FormView { message }))
}

pub async fn register_page(session: Session) -> Result<Json<FormView>, AccountError> {
    let message = with_session(&session, AccountSession::take_message).await?;
    Ok(Json(FormView { message }))
}

#[instrument(skip_all, fields(user_id = %claims.sub))]
pub async fn user_dashboard(
    session: Session,
    AuthUser(claims): AuthUser,
) -> Result<Json<ProfileView>, AccountError> {
    Ok(Json(with_session(&session, profile).await?))
}

#[instrument(skip_all, fields(user_id = %claims.sub))]
pub async fn admin_dashboard(
    session: Session,
    AdminUser(claims): AdminUser,
) -> Result<Json<ProfileView>, AccountError> {
    Ok(Json(with_session(&session, profile).await?))
}

#[instrument(skip_all, fields(user_id = %claims.sub))]
pub async fn users_dashboard(
    State(state): State<AppState>,
    session: Session,
    AdminUser(claims): AdminUser,
) -> Result<Json<UsersView>, AccountError> {
    let users = state.users.list().await.map_err(AccountError::View)?;
    let view = with_session(&session, |account| UsersView {
        users: users.into_iter().map(PublicUser::from).collect(),
        editing: account.editing,
        message: account.take_message(),
    })
    .await?;
    Ok(Json(view))
}

/// Unknown routes leave edit mode, like every other page outside the profile.
pub async fn not_found(session: Session) -> Response {
    match with_session(&session, |account| account.editing = false).await {
        Ok(()) => (StatusCode::NOT_FOUND, "Not found").into_response(),
        Err(e) => e.into_response(),
    }
}
