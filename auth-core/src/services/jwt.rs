use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::error::AuthError;

/// Token service: signed, stateless bearer credentials. Validity is
/// determined purely by signature and expiry; there is no revocation list.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_ttl_minutes: i64,
}

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Result<Self, AuthError> {
        if config.secret.is_empty() {
            return Err(AuthError::Internal(anyhow::anyhow!(
                "token secret must not be empty"
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            session_ttl_minutes: config.ttl_minutes,
        })
    }

    /// Issue a token for `subject` expiring after `ttl`.
    pub fn issue(&self, subject: Uuid, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("failed to encode token: {}", e)))
    }

    /// Issue a token with the configured session window.
    pub fn issue_session(&self, subject: Uuid) -> Result<String, AuthError> {
        self.issue(subject, Duration::minutes(self.session_ttl_minutes))
    }

    /// Validate a token and return its subject. Fails on signature mismatch,
    /// malformed payload, or expiry; there are no partial-trust states.
    pub fn validate(&self, token: &str) -> Result<Uuid, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // No leeway: a token at or past its embedded expiry is invalid.
        validation.leeway = 0;

        let token_data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| AuthError::InvalidToken)?;

        token_data
            .claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Session window in seconds (for client info).
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_minutes * 60
    }
}
