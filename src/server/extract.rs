//! Request body extractors.

use axum::{
    extract::{FromRequest, Request},
    http::header,
    Form, Json,
};
use serde::de::DeserializeOwned;

use super::handlers::ApiError;

/// Body that may arrive as JSON or as an urlencoded form.
///
/// `Content-Type: application/json` is decoded as JSON; anything else is
/// handed to the form decoder, which rejects non-form content types.
#[derive(Debug, Clone)]
pub struct JsonOrForm<T>(pub T);

impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            let Json(value) = Json::<T>::from_request(request, state)
                .await
                .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
            Ok(Self(value))
        } else {
            let Form(value) = Form::<T>::from_request(request, state)
                .await
                .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
            Ok(Self(value))
        }
    }
}
