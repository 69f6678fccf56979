//! Actor context extraction.
//!
//! Credential issuance and session validation live in the surrounding
//! application layer; by the time a request reaches this service the caller's
//! identity has been established and is carried in the `x-user-id` and
//! `x-user-role` headers.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::Role;

/// The authenticated caller: who they are and in what role they act.
#[derive(Debug, Clone, Copy)]
pub struct ActorContext {
    pub user_id: Uuid,
    pub role: Role,
}

#[async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Authentication(anyhow::anyhow!("Missing x-user-id header")))?
            .parse::<Uuid>()
            .map_err(|_| AppError::Authentication(anyhow::anyhow!("Malformed x-user-id header")))?;

        let role = parts
            .headers
            .get("x-user-role")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Authentication(anyhow::anyhow!("Missing x-user-role header"))
            })?
            .parse::<Role>()
            .map_err(|_| AppError::Authentication(anyhow::anyhow!("Unknown role")))?;

        let span = tracing::Span::current();
        span.record("user_id", user_id.to_string().as_str());

        Ok(ActorContext { user_id, role })
    }
}

impl ActorContext {
    /// Guard for endpoints restricted to a single role.
    pub fn require(self, role: Role) -> Result<Self, AppError> {
        if self.role == role {
            Ok(self)
        } else {
            Err(AppError::Authorization(anyhow::anyhow!(
                "This action requires the {:?} role",
                role
            )))
        }
    }
}
