use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use palaver_core::domain::user::{normalize_email, parse_email, validate_password, User, UserId};
use palaver_core::errors::{ApplicationError, InterfaceError};
use palaver_db::RepositoryError;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::error::{correlation_id, ApiError};
use crate::api::extract::ApiJson;
use crate::api::session::AuthUser;
use crate::api::state::AppState;
use crate::api::storage_failure;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self { id: user.id, email: user.email, created_at: user.created_at }
    }
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    pub user: UserSummary,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<Credentials>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let correlation_id = correlation_id(&headers);
    let fail = |error: ApplicationError| ApiError::new(error, &correlation_id);

    let email = parse_email(&body.email).map_err(|e| fail(e.into()))?;
    validate_password(&body.password).map_err(|e| fail(e.into()))?;

    let cost = state.bcrypt_cost;
    let password = body.password;
    let password_hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| fail(ApplicationError::Configuration(format!("hash task failed: {e}"))))?
        .map_err(|e| fail(ApplicationError::Configuration(format!("password hashing failed: {e}"))))?;

    let user = match state.users.create(&email, &password_hash).await {
        Ok(user) => user,
        Err(RepositoryError::Duplicate(_)) => {
            return Err(fail(ApplicationError::Conflict("Email already registered".to_owned())))
        }
        Err(error) => return Err(fail(storage_failure(error))),
    };

    info!(
        event_name = "auth.user.registered",
        correlation_id = %correlation_id,
        user_id = user.id.0,
        "user registered"
    );
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<Credentials>,
) -> Result<impl IntoResponse, ApiError> {
    let correlation_id = correlation_id(&headers);
    let rejected = || {
        ApiError::from(InterfaceError::Unauthorized {
            message: "Incorrect email or password".to_owned(),
            correlation_id: correlation_id.clone(),
        })
    };

    let user = state
        .users
        .find_by_email(&normalize_email(&body.email))
        .await
        .map_err(|e| ApiError::new(storage_failure(e), &correlation_id))?
        .ok_or_else(rejected)?;

    let password = body.password;
    let hash = user.password_hash.clone();
    let verified =
        tokio::task::spawn_blocking(move || bcrypt::verify(&password, &hash).unwrap_or(false))
            .await
            .unwrap_or(false);
    if !verified {
        return Err(rejected());
    }

    let token = state.sessions.issue(user.id).map_err(|e| ApiError::new(e, &correlation_id))?;
    info!(
        event_name = "auth.session.issued",
        correlation_id = %correlation_id,
        user_id = user.id.0,
        "login succeeded"
    );

    Ok((
        [(SET_COOKIE, state.sessions.set_cookie(&token))],
        Json(LoginResponse {
            message: "Login successful",
            user: UserSummary { id: user.id, email: user.email },
        }),
    ))
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(SET_COOKIE, state.sessions.clear_cookie())],
        Json(MessageResponse { message: "Logout successful" }),
    )
}

pub async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}
