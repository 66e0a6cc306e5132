use crate::error::{AppError, AppResult};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Session ID
    pub exp: i64,    // Expiration time
    pub iat: i64,    // Issued at
}

/// A freshly issued session
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// The session a valid token identifies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedSession {
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates the HS256 tokens that identify anonymous sessions
pub struct SessionTokens {
    secret: String,
    expiration_hours: i64,
}

impl SessionTokens {
    pub fn new(secret: String, expiration_hours: i64) -> Self {
        Self {
            secret,
            expiration_hours,
        }
    }

    /// Start a new session
    pub fn issue(&self) -> AppResult<IssuedSession> {
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now + Duration::hours(self.expiration_hours);

        let claims = Claims {
            sub: session_id.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))?;

        Ok(IssuedSession {
            session_id,
            token,
            expires_at,
        })
    }

    /// Validate a token and extract the session it identifies
    pub fn validate(&self, token: &str) -> AppResult<VerifiedSession> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {}", e)))?;

        let session_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid session ID in token".to_string()))?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AppError::Unauthorized("Invalid expiry in token".to_string()))?;

        Ok(VerifiedSession {
            session_id,
            expires_at,
        })
    }
}
