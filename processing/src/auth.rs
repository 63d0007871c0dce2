use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use common::config::AuthConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("failed to issue token: {0}")]
    Issue(String),
}

/// Single operator account guarding the batch endpoints with HS256 tokens.
#[derive(Clone)]
pub struct Authenticator {
    username: String,
    password: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl Authenticator {
    pub fn new(username: impl Into<String>, password: impl Into<String>, secret: &str, ttl_minutes: i64) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.username.clone(),
            config.password.clone(),
            &config.jwt_secret,
            config.token_ttl_minutes,
        )
    }

    /// Checks the credentials and returns a signed token for them.
    pub fn issue(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let user_ok = constant_time_eq(username, &self.username);
        let password_ok = constant_time_eq(password, &self.password);
        if !(user_ok && password_ok) {
            warn!(username = %username, "Rejected login");
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let claims = Claims {
            sub: username.to_string(),
            iat: now.timestamp().max(0) as usize,
            exp: (now + self.ttl).timestamp().max(0) as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding).map_err(|e| AuthError::Issue(e.to_string()))?;
        info!(username = %username, "Issued access token");
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }

    /// Validates an `Authorization` header value of the form `Bearer <token>`.
    pub fn authorize_header(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let token = header
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;
        self.validate(token)
    }
}
