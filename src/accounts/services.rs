//! Account lifecycle: registration, login, profile edit, deletion, logout and
//! the edit-mode toggles.
//!
//! Every operation mutates the caller's [`AccountSession`] in place and returns
//! a [`Next`] describing the redirect and the bearer cookie change. Handlers
//! persist the session and apply the cookie; nothing here touches HTTP.

use axum::extract::FromRef;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{LoginForm, Next, ProfileUpdate, Registration, TokenCookie},
    error::AccountError,
    repo_types::{NewUser, User, UserChanges},
    session::AccountSession,
};
use crate::{
    auth::{claims::Claims, jwt::JwtKeys, password},
    images::services::discard_image,
    state::AppState,
};

pub const LOGIN_PAGE: &str = "/login";
pub const USER_DASHBOARD: &str = "/dashboard/user";
pub const ADMIN_DASHBOARD: &str = "/dashboard/dash-admin";
pub const ADMIN_USERS: &str = "/dashboard/dash-users";

pub const MSG_USER_ADDED: &str = "User added successfully";
pub const MSG_NO_SUCH_USER: &str = "User does not exist";
pub const MSG_BAD_CREDENTIALS: &str = "Incorrect username or password";
pub const MSG_UPDATED: &str = "Data updated successfully";
pub const MSG_DELETED: &str = "User deleted successfully";
pub const MSG_NOT_ALLOWED: &str = "You cannot edit this user";

#[instrument(skip(state, session, reg), fields(username = %reg.username))]
pub async fn register(
    state: &AppState,
    session: &mut AccountSession,
    reg: Registration,
) -> Result<Next, AccountError> {
    let staged = reg.image_url.clone();
    let image_url = reg
        .image_url
        .unwrap_or_else(|| state.config.default_image_url.clone());

    let created = async {
        let password_hash = password::hash_password_blocking(reg.password).await?;
        state
            .users
            .create(NewUser {
                username: reg.username,
                email: reg.email,
                password_hash,
                image_url,
            })
            .await
    }
    .await;

    let user = match created {
        Ok(u) => u,
        Err(e) => {
            if let Some(staged) = staged {
                discard_image(state.storage.as_ref(), &staged).await;
            }
            return Err(AccountError::Register(e));
        }
    };
    info!(user_id = %user.id, "user registered");

    // A caller that already carries an identity is an admin adding accounts.
    if session.user_id.is_some() {
        session.flash(MSG_USER_ADDED);
        Ok(Next::to(ADMIN_USERS))
    } else {
        session.flash(format!("Welcome {}", user.username));
        Ok(Next::to(LOGIN_PAGE))
    }
}

#[instrument(skip(state, session, form), fields(username = %form.username))]
pub async fn login(
    state: &AppState,
    session: &mut AccountSession,
    form: LoginForm,
) -> Result<Next, AccountError> {
    let user = match state
        .users
        .find_by_username(&form.username)
        .await
        .map_err(AccountError::Login)?
    {
        Some(u) => u,
        None => {
            warn!("login unknown username");
            session.flash(MSG_NO_SUCH_USER);
            return Ok(Next::to(LOGIN_PAGE));
        }
    };

    let ok = password::verify_password_blocking(form.password, user.password_hash.clone())
        .await
        .map_err(AccountError::Login)?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        session.flash(MSG_BAD_CREDENTIALS);
        return Ok(Next::to(LOGIN_PAGE));
    }

    let token = JwtKeys::from_ref(state)
        .sign(&user)
        .map_err(AccountError::Login)?;
    session.sign_in(&user);

    info!(user_id = %user.id, role = ?user.role(), "user logged in");
    let home = if user.role().is_admin() {
        ADMIN_DASHBOARD
    } else {
        USER_DASHBOARD
    };
    Ok(Next::to(home).with_token(TokenCookie::Set(token)))
}

/// Issued tokens stay valid until they expire.
pub fn logout(session: &mut AccountSession) -> Next {
    if let Some(user_id) = session.user_id {
        info!(%user_id, "user logged out");
    }
    session.sign_out();
    Next::to(LOGIN_PAGE).with_token(TokenCookie::Clear)
}

/// Blank fields in `changes` keep the value of the stored row, not the session's copy.
#[instrument(skip(state, session, actor, changes), fields(actor = %actor.sub))]
pub async fn update(
    state: &AppState,
    session: &mut AccountSession,
    actor: &Claims,
    id: Uuid,
    changes: ProfileUpdate,
) -> Result<Next, AccountError> {
    session.editing = false;

    if actor.sub != id && !actor.is_admin() {
        warn!(target_user = %id, "update of another user refused");
        drop_staged(state, changes.image_url.as_deref()).await;
        session.flash(MSG_NOT_ALLOWED);
        return Ok(Next::to(USER_DASHBOARD));
    }

    let staged = changes.image_url.clone();
    let written = match write_profile(state, id, changes).await {
        Ok(w) => w,
        Err(e) => {
            drop_staged(state, staged.as_deref()).await;
            return Err(AccountError::Update(e));
        }
    };

    let Some((previous, user)) = written else {
        warn!(target_user = %id, "update of missing user");
        drop_staged(state, staged.as_deref()).await;
        session.flash(MSG_NO_SUCH_USER);
        return Ok(Next::to(USER_DASHBOARD));
    };

    // Old file goes only after the row points at the new one.
    if user.image_url != previous.image_url {
        let outcome = discard_image(state.storage.as_ref(), &previous.image_url).await;
        debug!(user_id = %user.id, old_image = %previous.image_url, ?outcome, "previous image handled");
    }

    if session.user_id == Some(user.id) {
        session.refresh_from(&user);
    }

    info!(user_id = %user.id, "user updated");
    session.flash(MSG_UPDATED);
    Ok(Next::to(USER_DASHBOARD))
}

/// Returns the row before and after the write, or `None` if `id` is unknown.
async fn write_profile(
    state: &AppState,
    id: Uuid,
    changes: ProfileUpdate,
) -> anyhow::Result<Option<(User, User)>> {
    let Some(current) = state.users.find_by_id(id).await? else {
        return Ok(None);
    };

    let password_hash = match changes.password {
        Some(plain) => password::hash_password_blocking(plain).await?,
        None => current.password_hash.clone(),
    };
    let resolved = UserChanges {
        username: changes.username.unwrap_or_else(|| current.username.clone()),
        email: changes.email.unwrap_or_else(|| current.email.clone()),
        password_hash,
        image_url: changes.image_url.unwrap_or_else(|| current.image_url.clone()),
    };

    let updated = state.users.update(id, &resolved).await?;
    Ok(updated.map(|user| (current, user)))
}

async fn drop_staged(state: &AppState, staged: Option<&str>) {
    if let Some(staged) = staged {
        discard_image(state.storage.as_ref(), staged).await;
    }
}

/// Removes the row only; the user's image and tickets are left as they are.
#[instrument(skip(state, session))]
pub async fn delete(
    state: &AppState,
    session: &mut AccountSession,
    id: Uuid,
) -> Result<Next, AccountError> {
    let removed = state.users.delete(id).await.map_err(AccountError::Delete)?;
    if removed == 0 {
        warn!(user_id = %id, "delete of missing user");
    } else {
        info!(user_id = %id, "user deleted");
    }
    session.flash(MSG_DELETED);
    Ok(Next::to(ADMIN_USERS))
}

pub fn enter_edit_mode(session: &mut AccountSession) -> Next {
    session.editing = true;
    Next::to(USER_DASHBOARD)
}

pub fn cancel_edit_mode(session: &mut AccountSession) -> Next {
    session.editing = false;
    Next::to(ADMIN_USERS)
}
