//! Bearer-token issuance and validation (HS256).

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Access-token validity period.
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 60;

// Development fallback; set SECRET_KEY in the environment for anything real.
const DEV_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the username.
    pub sub: String,
    /// Expiry (Unix timestamp).
    pub exp: i64,
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn from_env() -> Self {
        let secret = std::env::var("SECRET_KEY").unwrap_or_else(|_| DEV_SECRET.to_string());
        Self::new(&secret)
    }

    pub fn issue(&self, username: &str) -> Result<String, AuthError> {
        self.issue_with_lifetime(username, Duration::minutes(ACCESS_TOKEN_TTL_MINUTES))
    }

    fn issue_with_lifetime(&self, username: &str, lifetime: Duration) -> Result<String, AuthError> {
        let claims = Claims {
            sub: username.to_string(),
            exp: (Utc::now() + lifetime).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|_| AuthError::InvalidToken)
    }

    /// Validate a bearer token and return its subject.
    pub fn validate(&self, token: &str) -> Result<String, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| AuthError::InvalidToken)?;
        Ok(data.claims.sub)
    }
}
