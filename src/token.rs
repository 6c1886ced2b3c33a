//! Session Tokens
//!
//! HS256-signed JWTs carrying the user id, issue time and expiry. A token is
//! valid when it decodes, the signature checks out and the expiry lies in the
//! future. Every failure collapses to [`AuthError::InvalidToken`].

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

/// Default token lifetime (30 days)
pub const DEFAULT_TOKEN_LIFETIME_DAYS: i64 = 30;

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
    /// JWT ID
    pub jti: String,
}

/// Issues and verifies session tokens
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, lifetime: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a token for a user, starting now
    pub fn issue(&self, user_id: &str) -> Result<String, AuthError> {
        self.issue_at(user_id, Utc::now())
    }

    /// Issue a token as if minted at `issued_at`
    pub fn issue_at(&self, user_id: &str, issued_at: DateTime<Utc>) -> Result<String, AuthError> {
        let expires_at = issued_at
            .checked_add_signed(self.lifetime)
            .ok_or_else(|| AuthError::Internal("Token expiry out of range".to_string()))?;

        let claims = Claims {
            sub: user_id.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to encode token: {}", e)))
    }

    /// Decode and verify a token
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.decode(token).is_ok()
    }
}
