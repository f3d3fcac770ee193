//! bearer token authentication for machine callbacks
//!
//! ## Authentication Flow
//!
//! 1. Extract `Authorization: Bearer <token>` header
//! 2. Require a configured signing secret
//! 3. Verify the hs256 signature and optional `exp`
//! 4. Parse `machine_id`, `iat` and `endpoint` claims
//!
//! runs before the body is read, so a bad token never reaches the json parser.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{error, warn};

use crate::AppState;
use crate::handlers::ApiError;
use crate::token::{TokenError, VerifiedClaim};

impl FromRequestParts<AppState> for VerifiedClaim {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|value| value.to_str().map_err(|_| TokenError::MalformedHeader))
            .transpose();

        header
            .and_then(|header| state.verifier.verify_authorization(header))
            .map_err(|err| {
                if err.is_server_fault() {
                    error!(kind = err.kind(), "rejecting machine callback: {err}");
                } else {
                    warn!(kind = err.kind(), error = %err, "machine callback token rejected");
                }
                ApiError::from(err)
            })
    }
}
