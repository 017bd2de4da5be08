//! HTTP surface: auth, conversation CRUD and the chat turn endpoint.

pub mod auth;
pub mod chat;
pub mod conversations;
pub mod error;
pub mod extract;
pub mod session;
pub mod state;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{Json, Router};
use palaver_core::errors::ApplicationError;
use palaver_db::RepositoryError;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::health;
use error::REQUEST_ID_HEADER;
use state::AppState;

#[derive(Debug, Serialize)]
pub struct Banner {
    pub message: &'static str,
    pub version: &'static str,
}

pub async fn root() -> Json<Banner> {
    Json(Banner { message: "Palaver chat API", version: env!("CARGO_PKG_VERSION") })
}

pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/conversations", post(conversations::create).get(conversations::list))
        .route("/conversations/{id}", get(conversations::show).delete(conversations::delete))
        .route("/chat", post(chat::send))
        .layer(cors(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(event_name = "system.cors.invalid_origin", origin = %origin, "origin skipped");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(REQUEST_ID_HEADER)])
}

pub(crate) fn storage_failure(error: RepositoryError) -> ApplicationError {
    ApplicationError::PersistenceFailure(error.to_string())
}
