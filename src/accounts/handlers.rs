use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    response::Redirect,
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tower_sessions::Session;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    dto::{AccountForm, ImageUpload, LoginForm, Next, ProfileUpdate, Registration, TokenCookie},
    error::AccountError,
    services,
    session::AccountSession,
};
use crate::{
    auth::{
        extractors::{AdminUser, AuthUser},
        jwt::TOKEN_COOKIE,
    },
    config::AppConfig,
    images::services::{store_profile_image, UploadItem},
    state::AppState,
};

pub fn account_routes(upload_max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/api-users/register", post(register))
        .route("/api-users/update/:id", post(update))
        .layer(DefaultBodyLimit::max(upload_max_bytes))
        .route("/api-users/login", post(login))
        .route("/api-users/logout", post(logout))
        .route("/api-users/delete/:id", post(delete))
        .route("/api-users/edit", get(enter_edit).post(enter_edit))
        .route("/api-users/back", get(cancel_edit).post(cancel_edit))
}

type Redirected = Result<(CookieJar, Redirect), AccountError>;

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    multipart: Multipart,
) -> Redirected {
    let mut account = AccountSession::load(&session)
        .await
        .map_err(|e| AccountError::Register(e.into()))?;
    let form = read_account_form(multipart)
        .await
        .map_err(|e| AccountError::Register(e.into()))?;
    let image_url = stage_image(&state, form.image)
        .await
        .map_err(AccountError::Register)?;

    let next = services::register(
        &state,
        &mut account,
        Registration {
            username: form.username,
            email: form.email,
            password: form.password,
            image_url,
        },
    )
    .await?;

    finish(&state.config, &session, &account, jar, next)
        .await
        .map_err(AccountError::Register)
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Redirected {
    let mut account = AccountSession::load(&session)
        .await
        .map_err(|e| AccountError::Login(e.into()))?;
    let next = services::login(&state, &mut account, form).await?;
    finish(&state.config, &session, &account, jar, next)
        .await
        .map_err(AccountError::Login)
}

#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, session: Session, jar: CookieJar) -> Redirected {
    let mut account = AccountSession::load(&session)
        .await
        .map_err(|e| AccountError::Logout(e.into()))?;
    let next = services::logout(&mut account);
    finish(&state.config, &session, &account, jar, next)
        .await
        .map_err(AccountError::Logout)
}

#[instrument(skip(state, session, jar, actor, multipart))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Redirected {
    let mut account = AccountSession::load(&session)
        .await
        .map_err(|e| AccountError::Update(e.into()))?;
    let mut form = read_account_form(multipart)
        .await
        .map_err(|e| AccountError::Update(e.into()))?;
    let image_url = stage_image(&state, form.image.take())
        .await
        .map_err(AccountError::Update)?;

    let changes = ProfileUpdate::from_form(form, image_url);
    let next = services::update(&state, &mut account, &actor, id, changes).await?;

    finish(&state.config, &session, &account, jar, next)
        .await
        .map_err(AccountError::Update)
}

#[instrument(skip(state, session, jar, _admin))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    jar: CookieJar,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Redirected {
    let mut account = AccountSession::load(&session)
        .await
        .map_err(|e| AccountError::Delete(e.into()))?;
    let next = services::delete(&state, &mut account, id).await?;
    finish(&state.config, &session, &account, jar, next)
        .await
        .map_err(AccountError::Delete)
}

pub async fn enter_edit(State(state): State<AppState>, session: Session, jar: CookieJar) -> Redirected {
    toggle(&state, session, jar, services::enter_edit_mode).await
}

pub async fn cancel_edit(State(state): State<AppState>, session: Session, jar: CookieJar) -> Redirected {
    toggle(&state, session, jar, services::cancel_edit_mode).await
}

async fn toggle(
    state: &AppState,
    session: Session,
    jar: CookieJar,
    flip: fn(&mut AccountSession) -> Next,
) -> Redirected {
    let mut account = AccountSession::load(&session)
        .await
        .map_err(|e| AccountError::View(e.into()))?;
    let next = flip(&mut account);
    finish(&state.config, &session, &account, jar, next)
        .await
        .map_err(AccountError::View)
}

/// Saves the session and turns `next` into a cookie change plus a 303.
async fn finish(
    config: &AppConfig,
    session: &Session,
    account: &AccountSession,
    jar: CookieJar,
    next: Next,
) -> anyhow::Result<(CookieJar, Redirect)> {
    account.save(session).await?;
    let jar = apply_token(jar, next.token, config);
    Ok((jar, Redirect::to(&next.location)))
}

fn apply_token(jar: CookieJar, token: TokenCookie, config: &AppConfig) -> CookieJar {
    match token {
        TokenCookie::Keep => jar,
        TokenCookie::Set(token) => jar.add(
            Cookie::build((TOKEN_COOKIE, token))
                .path("/")
                .http_only(true)
                .secure(config.secure_cookies)
                .same_site(SameSite::Lax)
                .max_age(time::Duration::minutes(config.jwt.ttl_minutes)),
        ),
        TokenCookie::Clear => jar.remove(Cookie::build(TOKEN_COOKIE).path("/")),
    }
}

/// Collects the text fields and the optional `image` file of an account form.
/// An empty file part (no file chosen in the browser) counts as no upload.
async fn read_account_form(mut multipart: Multipart) -> Result<AccountForm, MultipartError> {
    let mut form = AccountForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("username") => form.username = field.text().await?,
            Some("email") => form.email = field.text().await?,
            Some("password") => form.password = field.text().await?,
            Some("image") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await?;
                if !body.is_empty() {
                    form.image = Some(ImageUpload { body, content_type });
                }
            }
            other => warn!(field = ?other, "ignoring unknown form field"),
        }
    }
    Ok(form)
}

async fn stage_image(state: &AppState, image: Option<ImageUpload>) -> anyhow::Result<Option<String>> {
    let Some(image) = image else {
        return Ok(None);
    };
    let reference = store_profile_image(
        state.storage.as_ref(),
        UploadItem {
            body: image.body,
            content_type: &image.content_type,
        },
    )
    .await?;
    Ok(Some(reference))
}
