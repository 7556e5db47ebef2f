use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use super::dto::InvalidPreferences;
use crate::{
    climate::EmptyCommand, db::StoreError, lighting::InvalidLightingLevel,
    telemetry::MalformedTelemetry,
};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Client sent something unusable; no state was touched.
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(e) => {
                error!(error = %e, "Store call failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

macro_rules! bad_request_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ApiError {
                fn from(e: $ty) -> Self {
                    ApiError::BadRequest(e.to_string())
                }
            }
        )*
    };
}

bad_request_from!(
    JsonRejection,
    PathRejection,
    QueryRejection,
    MalformedTelemetry,
    InvalidLightingLevel,
    EmptyCommand,
    InvalidPreferences,
);

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            ApiError::from(EmptyCommand).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("nope".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StoreError::Timeout(Duration::from_millis(5)))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn malformed_telemetry_names_the_field() {
        let e = ApiError::from(MalformedTelemetry::MissingField("h"));
        assert!(e.to_string().contains("`h`"));
    }
}
