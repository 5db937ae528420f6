//! Request extractors: the authenticated caller and JSON bodies with
//! desk-style rejections.

use super::error::ApiError;
use crate::application::Desk;
use crate::domain::principal::{Principal, Role};
use crate::error::DeskError;
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Request, rejection::JsonRejection},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_ROLE_HEADER: &str = "x-principal-role";

/// The authenticated caller, resolved through the desk's role policy from the
/// identity headers set by the auth gateway.
#[derive(Debug, Clone)]
pub struct Caller(pub Principal);

#[async_trait]
impl FromRequestParts<Desk> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, desk: &Desk) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
        };
        let claimed: Role = header(PRINCIPAL_ROLE_HEADER).parse()?;
        let principal = desk.authorizer.principal(header(PRINCIPAL_ID_HEADER), claimed)?;
        Ok(Self(principal))
    }
}

/// `Json<T>` whose rejection uses the desk error body.
pub struct Body<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Body<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::from(DeskError::ValidationError(rejection.body_text()))
}

/// JSON body that may be left out. An empty body yields `T::default()`; any
/// other body must parse as `T`.
pub struct OptionalBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for OptionalBody<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| DeskError::ValidationError(rejection.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }
        serde_json::from_slice(&bytes).map(Self).map_err(|e| {
            ApiError::from(DeskError::ValidationError(format!(
                "Failed to deserialize the JSON body: {e}"
            )))
        })
    }
}
