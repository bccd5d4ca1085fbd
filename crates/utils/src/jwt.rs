//! HS256 session tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Claims carried by every session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims {
    pub fn new(
        sub: impl Into<String>,
        email: Option<String>,
        role: impl Into<String>,
        permissions: Vec<String>,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            sub: sub.into(),
            email,
            role: role.into(),
            permissions,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

pub fn issue(secret: &[u8], claims: &TokenClaims) -> Result<String, TokenError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

pub fn verify(secret: &[u8], token: &str) -> Result<TokenClaims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    decode::<TokenClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let claims = TokenClaims::new(
            "admin-1",
            Some("ops@city.gov".to_string()),
            "admin",
            vec!["view_reports".to_string()],
            Duration::hours(1),
        );
        let token = issue(SECRET, &claims).unwrap();
        let decoded = verify(SECRET, &token).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = TokenClaims::new("guest", None, "guest", vec![], Duration::hours(1));
        let token = issue(SECRET, &claims).unwrap();
        assert!(matches!(
            verify(b"other", &token),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = TokenClaims::new("guest", None, "guest", vec![], Duration::hours(-2));
        let token = issue(SECRET, &claims).unwrap();
        assert!(matches!(verify(SECRET, &token), Err(TokenError::Expired)));
    }
}
