use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::{
    domain::session::{SessionResponse, SessionTokens},
    error::AppResult,
};

pub struct SessionController {
    tokens: Arc<SessionTokens>,
}

impl SessionController {
    pub fn new(tokens: Arc<SessionTokens>) -> Self {
        Self { tokens }
    }

    /// POST /api/sessions - Issue an anonymous session token
    pub async fn create_session(
        State(controller): State<Arc<SessionController>>,
    ) -> AppResult<(StatusCode, Json<SessionResponse>)> {
        let session = controller.tokens.issue()?;

        tracing::info!(session_id = %session.session_id, "Session issued");

        Ok((
            StatusCode::CREATED,
            Json(SessionResponse {
                session_id: session.session_id,
                token: session.token,
                token_type: "Bearer".to_string(),
                expires_at: session.expires_at,
            }),
        ))
    }
}
