use std::collections::BTreeMap;

use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    response::{IntoResponse, Response},
};

use http::StatusCode;
use serde::{Deserialize, Serialize};

use utoipa::{
    openapi::{RefOr, Response as UtoipaResponse, ResponseBuilder, ResponsesBuilder},
    IntoResponses, ToSchema,
};

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

impl<T> IntoResponse for AppJson<T>
where
    axum::Json<T>: IntoResponse,
{
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// Internal error occurred, message left unspecified.
    #[error("internal error occurred: {}", .0)]
    Internal(#[from] anyhow::Error),
    /// Passed json request is malformed.
    #[error("json request is malformed: {}", .0)]
    JsonRejection(JsonRejection),
    /// Request is logically invalid - check e.g. params matching.
    #[error("request is invalid: {}", .0)]
    InvalidRequest(anyhow::Error),
    /// A dependency the request needs is not configured or reachable.
    #[error("service unavailable: {}", .0)]
    Unavailable(anyhow::Error),
    /// Upstream accepted part of the work and then failed.
    #[error("upstream failed: {}", .0)]
    Upstream(anyhow::Error),
}

impl ApiError {
    fn code(&self) -> i16 {
        match self {
            ApiError::Internal(_) => 1,
            ApiError::JsonRejection(_) => 2,
            ApiError::InvalidRequest(_) => 3,
            ApiError::Unavailable(_) => 4,
            ApiError::Upstream(_) => 5,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::InvalidRequest(anyhow::anyhow!(message.into()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::JsonRejection(rejection)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, ToSchema, PartialEq, Eq)]
pub struct ErrorResponse {
    pub message: String,
    pub code: i16,
}

// implementing this allows to reuse response definition across all handlers.
impl IntoResponses for ErrorResponse {
    fn responses() -> BTreeMap<String, RefOr<UtoipaResponse>> {
        ResponsesBuilder::new()
            .response(
                "4XX",
                ResponseBuilder::new().description("Logical error due to user input"),
            )
            .response(
                "5XX",
                ResponseBuilder::new().description("Internal server error, contact support"),
            )
            .build()
            .into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();

        let (status, message) = match self {
            ApiError::Internal(err) => {
                tracing::error!("internal error while handling API request: {err:?}");

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
            ApiError::JsonRejection(rejection) => (rejection.status(), rejection.body_text()),
            ApiError::InvalidRequest(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Unavailable(err) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
            ApiError::Upstream(err) => {
                tracing::warn!("upstream failure while handling API request: {err:#}");
                (StatusCode::BAD_GATEWAY, err.to_string())
            }
        };

        (status, AppJson(ErrorResponse { message, code })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_request_is_bad_request() -> anyhow::Result<()> {
        let response = ApiError::invalid("Wallet address is required").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body: ErrorResponse = serde_json::from_slice(&body)?;
        assert_eq!(
            body,
            ErrorResponse {
                message: "Wallet address is required".into(),
                code: 3,
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() -> anyhow::Result<()> {
        let response = ApiError::Internal(anyhow::anyhow!("db password leaked")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body: ErrorResponse = serde_json::from_slice(&body)?;
        assert_eq!(body.message, "internal server error");
        assert_eq!(body.code, 1);
        Ok(())
    }
}
