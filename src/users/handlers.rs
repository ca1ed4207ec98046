use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        jwt::{AdminUser, AuthUser, JwtKeys},
        password::{hash_password, is_valid_email, meets_password_policy, verify_password},
    },
    error::ApiError,
    state::AppState,
    users::{
        dto::{
            AdminUpdateRequest, AuthResponse, ForgetPasswordRequest, MessageResponse, PageQuery,
            ProfileUpdateRequest, ResetPasswordRequest, SigninRequest, SignupRequest,
            UpdatedUserResponse, UserPage,
        },
        repo_types::User,
    },
};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/users/signup", post(signup))
        .route("/users/signin", post(signin))
        .route("/users/forget-password", post(forget_password))
        .route("/users/reset-password", post(reset_password))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/users/profile", put(update_profile))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users/admin", get(list_users_page))
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).put(admin_update_user).delete(delete_user),
        )
}

// The forms submit empty strings for untouched fields; treat those as
// "keep the stored value".
fn or_current(value: Option<&str>, current: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => current.to_string(),
    }
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::bad_request("Invalid email"));
    }

    if !meets_password_policy(&payload.password) {
        warn!("password fails complexity policy");
        return Err(ApiError::bad_request(
            "Password does not meet complexity requirements.",
        ));
    }

    // Ensure email is not taken
    if let Ok(Some(_)) = User::find_by_email(&state.db, &payload.email).await {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::conflict("Email already registered"));
    }

    let hash = hash_password(&payload.password).map_err(ApiError::internal)?;

    let user = User::create(&state.db, payload.name.trim(), &payload.email, &hash)
        .await
        .map_err(ApiError::internal)?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_session(&user).map_err(ApiError::internal)?;

    info!(user_id = %user.id, email = %user.email, "user signed up");
    Ok((StatusCode::CREATED, Json(AuthResponse::new(&user, token))))
}

#[instrument(skip(state, payload))]
pub async fn signin(
    State(state): State<AppState>,
    Json(mut payload): Json<SigninRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    // Unknown email and wrong password fail identically.
    let user = match User::find_by_email(&state.db, &payload.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %payload.email, "signin unknown email");
            return Err(ApiError::unauthorized("Invalid email or password"));
        }
        Err(e) => return Err(ApiError::internal(e)),
    };

    let ok = verify_password(&payload.password, &user.password_hash)
        .map_err(ApiError::internal)?;
    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "signin invalid password");
        return Err(ApiError::unauthorized("Invalid email or password"));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_session(&user).map_err(ApiError::internal)?;

    info!(user_id = %user.id, email = %user.email, "user signed in");
    Ok(Json(AuthResponse::new(&user, token)))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = User::find_by_id(&state.db, claims.sub)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let name = or_current(payload.name.as_deref(), &user.name);
    let email = or_current(payload.email.as_deref(), &user.email).to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(ApiError::bad_request("Invalid email"));
    }

    let new_hash = match payload.password.as_deref() {
        Some(p) if !p.is_empty() => Some(hash_password(p).map_err(ApiError::internal)?),
        _ => None,
    };

    let updated = User::update_profile(&state.db, user.id, &name, &email, new_hash.as_deref())
        .await
        .map_err(ApiError::internal)?;

    // Fresh token so changed claims take effect immediately.
    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_session(&updated).map_err(ApiError::internal)?;

    info!(user_id = %updated.id, "profile updated");
    Ok(Json(AuthResponse::new(&updated, token)))
}

#[instrument(skip(state, payload))]
pub async fn forget_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    let user = User::find_by_email(&state.db, &payload.email)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("Email Not Found"))?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign_reset(&user).map_err(ApiError::internal)?;

    // Overwrites any outstanding token; only the newest one redeems.
    User::set_reset_token(&state.db, user.id, &token)
        .await
        .map_err(ApiError::internal)?;

    let url = format!("{}/reset-password/{}", state.config.base_url, token);
    info!(user_id = %user.id, %url, "password reset url");

    let html = format!(
        "<p>Please click the following link to reset your password (expires in 10 minutes):</p>\n\
         <a href=\"{url}\">Reset Password</a>"
    );
    let to = format!("{} <{}>", user.name, user.email);

    // The token stays persisted even when delivery fails; it expires on its
    // own or is superseded by the next request.
    if let Err(e) = state.mailer.send(&to, "Reset Password", &html).await {
        warn!(error = %e, user_id = %user.id, "reset email delivery failed");
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Error sending email.",
        ));
    }

    Ok(Json(MessageResponse {
        message: "We sent reset password link to your email.",
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !meets_password_policy(&payload.password) {
        warn!("password fails complexity policy");
        return Err(ApiError::bad_request(
            "Password does not meet complexity requirements.",
        ));
    }

    let keys = JwtKeys::from_ref(&state);
    if keys.verify_reset(&payload.token).is_err() {
        warn!("invalid or expired reset token");
        return Err(ApiError::unauthorized("Invalid Token"));
    }

    let hash = hash_password(&payload.password).map_err(ApiError::internal)?;

    // Single conditional update: no window where the old token stays valid
    // after the password has changed.
    let user = User::redeem_reset_token(&state.db, &payload.token, &hash)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!(user_id = %user.id, "password reset");
    Ok(Json(MessageResponse {
        message: "Password reset successfully",
    }))
}

#[instrument(skip(state))]
pub async fn list_users_page(
    State(state): State<AppState>,
    AdminUser(_claims): AdminUser,
    Query(q): Query<PageQuery>,
) -> Result<Json<UserPage>, ApiError> {
    let page = q.page.max(1);
    let page_size = q.page_size.max(1);

    let (users, total_users) = tokio::try_join!(
        User::list_page(&state.db, page_size, page_size * (page - 1)),
        User::count(&state.db),
    )
    .map_err(ApiError::internal)?;

    Ok(Json(UserPage {
        users,
        total_users,
        page,
        pages: (total_users + page_size - 1) / page_size,
    }))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_claims): AdminUser,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = User::list_all(&state.db).await.map_err(ApiError::internal)?;
    Ok(Json(users))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    AdminUser(_claims): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    let user = User::find_by_id(&state.db, id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("User Not Found"))?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn admin_update_user(
    State(state): State<AppState>,
    AdminUser(_claims): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminUpdateRequest>,
) -> Result<Json<UpdatedUserResponse>, ApiError> {
    let user = User::find_by_id(&state.db, id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("User Not Found"))?;

    let name = or_current(payload.name.as_deref(), &user.name);
    let email = or_current(payload.email.as_deref(), &user.email).to_lowercase();

    let updated = User::admin_update(&state.db, user.id, &name, &email, payload.is_admin)
        .await
        .map_err(ApiError::internal)?;

    info!(user_id = %updated.id, is_admin = updated.is_admin, "user updated by admin");
    Ok(Json(UpdatedUserResponse {
        message: "User Updated",
        user: updated,
    }))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(claims): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = User::find_by_id(&state.db, id)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::not_found("User Not Found"))?;

    // The seeded root admin is never deletable, whoever asks.
    if user.email == state.config.root_admin_email {
        warn!(user_id = %user.id, requested_by = %claims.sub, "refusing to delete root admin");
        return Err(ApiError::bad_request("Can Not Delete Admin User"));
    }

    User::delete_by_id(&state.db, user.id)
        .await
        .map_err(ApiError::internal)?;

    info!(user_id = %user.id, deleted_by = %claims.sub, "user deleted");
    Ok(Json(MessageResponse {
        message: "User Deleted",
    }))
}
