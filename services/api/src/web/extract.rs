//! services/api/src/web/extract.rs
//!
//! Request extractors whose rejections render through `ApiError`, so a
//! malformed body or path still answers with the JSON error schema.

use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::PathRejection,
        FromRequest, FromRequestParts, Multipart, Path, Request,
    },
    http::request::Parts,
    Form,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::ApiError;

/// `application/x-www-form-urlencoded` body.
pub struct FormBody<T>(pub T);

impl<T, S> FromRequest<S> for FormBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// `multipart/form-data` body.
pub struct MultipartBody(pub Multipart);

impl<S> FromRequest<S> for MultipartBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Multipart::from_request(req, state)
            .await
            .map(Self)
            .map_err(|rejection: MultipartRejection| ApiError::BadRequest(rejection.body_text()))
    }
}

/// The `{content_id}` path segment. A segment that is not a UUID cannot
/// name any stored item, so it is reported as not found.
pub struct ContentId(pub Uuid);

impl<S> FromRequestParts<S> for ContentId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<String>::from_request_parts(parts, state).await {
            Ok(Path(raw)) => raw
                .parse::<Uuid>()
                .map(Self)
                .map_err(|_| ApiError::UnknownContent(raw)),
            Err(rejection) => Err(path_error(rejection)),
        }
    }
}

fn path_error(rejection: PathRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}
