// [[CASCADE]]/apps/kernel-server/src/security.rs
// Purpose: Operator identity extractor for audited endpoints (stop, uploads).
// Architecture: API Layer
// Dependencies: Axum

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

/// Identity carried on mutating requests via the X-OPERATOR-ID header.
/// Missing headers fall back to "anonymous" so health checks and the console
/// keep working; malformed ids are rejected outright.
pub struct OperatorSession(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for OperatorSession
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let operator = parts
            .headers
            .get("X-OPERATOR-ID")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("anonymous");

        // Alphanumeric plus dashes only; anything else smells like injection
        if operator.is_empty()
            || !operator.chars().all(|c| c.is_alphanumeric() || c == '-')
        {
            tracing::warn!("Rejected malformed operator id: {}", operator);
            return Err(StatusCode::BAD_REQUEST);
        }

        Ok(OperatorSession(operator.to_string()))
    }
}
