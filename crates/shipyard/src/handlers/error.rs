//! api error handling for http handlers

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use shipyard_types::MachineId;
use thiserror::Error;

use crate::token::TokenError;

/// json body returned for every failed request
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// fixed public message, never internal detail
    pub error: String,
}

/// api error type for handler responses
#[derive(Debug, Error)]
pub enum ApiError {
    /// credential missing or rejected (401)
    #[error("authentication failed: {0}")]
    Authentication(TokenError),

    /// token is valid but names another machine (401)
    #[error("token for machine {claimed} cannot report for machine {requested}")]
    Authorization {
        /// machine the token was minted for
        claimed: MachineId,
        /// machine the request body addressed
        requested: MachineId,
    },

    /// request body failed to parse (400)
    #[error("invalid request data: {0}")]
    Validation(String),

    /// body exceeds the configured callback limit (413)
    #[error("request body too large: {0}")]
    PayloadTooLarge(String),

    /// no machine row with that id (404)
    #[error("machine not found: {0}")]
    NotFound(MachineId),

    /// server is missing required configuration (500)
    #[error("server misconfigured: {0}")]
    Configuration(String),

    /// the store rejected the write (500)
    #[error("failed to update machine: {0}")]
    Persistence(#[from] shipyard_db::Error),
}

impl ApiError {
    /// stable short name for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication",
            Self::Authorization { .. } => "authorization",
            Self::Validation(_) => "validation",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::NotFound(_) => "not_found",
            Self::Configuration(_) => "configuration",
            Self::Persistence(_) => "persistence",
        }
    }

    /// http status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication(_) | Self::Authorization { .. } => StatusCode::UNAUTHORIZED,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Configuration(_) | Self::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// message sent to the caller
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Authentication(_) | Self::Authorization { .. } => "Unauthorized",
            Self::Validation(_) => "Invalid request data",
            Self::PayloadTooLarge(_) => "Payload Too Large",
            Self::NotFound(_) => "Machine not found",
            Self::Configuration(_) => "Internal Server Error",
            Self::Persistence(_) => "Failed to update machine status",
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        if err.is_server_fault() {
            Self::Configuration(err.to_string())
        } else {
            Self::Authentication(err)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.public_message().to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> MachineId {
        s.parse().unwrap()
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                ApiError::Authentication(TokenError::Expired),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::Authorization {
                    claimed: id("m1"),
                    requested: id("m2"),
                },
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::Validation("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::PayloadTooLarge("limit".into()),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (ApiError::NotFound(id("m1")), StatusCode::NOT_FOUND),
            (
                ApiError::Configuration("no secret".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Persistence(shipyard_db::Error::Database("disk full".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{}", err.kind());
        }
    }

    #[test]
    fn test_unconfigured_secret_maps_to_configuration() {
        let err = ApiError::from(TokenError::SecretUnconfigured);
        assert!(matches!(err, ApiError::Configuration(_)));
        assert_eq!(err.public_message(), "Internal Server Error");

        let err = ApiError::from(TokenError::MissingHeader);
        assert!(matches!(err, ApiError::Authentication(_)));
        assert_eq!(err.public_message(), "Unauthorized");
    }

    #[test]
    fn test_public_message_hides_detail() {
        let err = ApiError::Persistence(shipyard_db::Error::Database(
            "constraint machines_pkey".into(),
        ));
        assert_eq!(err.public_message(), "Failed to update machine status");
        assert!(err.to_string().contains("machines_pkey"));
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let response = ApiError::NotFound(id("m9")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "Machine not found");
    }
}
