//! Request extractors: session resolution from the `X-Session-ID` header
//! and path/JSON extraction that fails with the API's error body

use async_trait::async_trait;
use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Path, Request};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use super::AppState;
use super::error::ApiErrorResponse;
use crate::session::Session;

pub const SESSION_HEADER: &str = "x-session-id";

/// The session named by the request's `X-Session-ID` header.
/// Resolving it counts as activity on the session.
pub struct CurrentSession(pub Arc<Session>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiErrorResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(ApiErrorResponse::missing_session_id)?;

        let session = state.sessions.get(id).await?;
        Ok(CurrentSession(session))
    }
}

/// `Path` whose rejection is an `ApiErrorResponse`
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiErrorResponse;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiErrorResponse::new("invalid_path", rejection.body_text()))?;
        Ok(ApiPath(value))
    }
}

/// `Json` whose rejection is an `ApiErrorResponse`
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiErrorResponse;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiErrorResponse::new("invalid_request", rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}
