//! Body, query and path extractors whose rejections render as [`ApiError`].

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use palaver_core::errors::InterfaceError;
use serde::de::DeserializeOwned;

use crate::api::error::{correlation_id, ApiError};

#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

#[derive(Debug)]
pub struct ApiPath<T>(pub T);

fn malformed(correlation_id: String, detail: String) -> ApiError {
    ApiError(InterfaceError::BadRequest { message: detail, correlation_id })
}

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = correlation_id(req.headers());
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(malformed(correlation_id, rejection.body_text())),
        }
    }
}

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => {
                Err(malformed(correlation_id(&parts.headers), rejection.body_text()))
            }
        }
    }
}

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => {
                Err(malformed(correlation_id(&parts.headers), rejection.body_text()))
            }
        }
    }
}
