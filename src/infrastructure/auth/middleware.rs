use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::{domain::session::SessionTokens, error::AppError};

/// Session context injected into request extensions after authentication
#[derive(Debug, Clone, Copy)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Session authentication middleware
pub async fn session_middleware(
    State(tokens): State<Arc<SessionTokens>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".to_string()))?;

    let session = tokens.validate(token)?;

    request.extensions_mut().insert(SessionContext {
        session_id: session.session_id,
        expires_at: session.expires_at,
    });

    Ok(next.run(request).await)
}
