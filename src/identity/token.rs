/// Session token issuing and verification (HS256 JWT)
use crate::{admin::Role, config::SessionConfig, error::{AppError, AppResult}};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by the session cookie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account id
    pub sub: String,
    /// Role at issue time, informational only
    pub role: String,
    /// Session version of the account at issue time
    pub sv: i64,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn user_id(&self) -> AppResult<i64> {
        self.sub
            .parse()
            .map_err(|_| AppError::Authentication("Invalid token subject".to_string()))
    }
}

/// Signs and verifies session tokens
#[derive(Clone)]
pub struct SessionTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionTokens {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(&config.jwt_secret, config.ttl_hours)
    }

    /// Issue a token for an account
    pub fn issue(&self, user_id: i64, role: Role, session_version: i64) -> AppResult<String> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            sv: session_version,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        self.sign(&claims)
    }

    pub(crate) fn sign(&self, claims: &SessionClaims) -> AppResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Jwt(format!("Failed to sign session token: {}", e)))
    }

    /// Verify signature and expiry
    pub fn verify(&self, token: &str) -> AppResult<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Authentication("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    AppError::Authentication("Invalid token signature".to_string())
                }
                _ => AppError::Authentication(format!("Invalid token: {}", e)),
            })
    }

    /// Cookie lifetime in seconds
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-testing-only-0123456789";

    #[test]
    fn test_issue_and_verify() {
        let tokens = SessionTokens::new(SECRET, 24);
        let token = tokens.issue(42, Role::Editor, 3).unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role, "editor");
        assert_eq!(claims.sv, 3);
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = SessionTokens::new(SECRET, 24).issue(1, Role::Reader, 0).unwrap();
        let other = SessionTokens::new("another-secret-key-for-testing-0123456789", 24);

        assert!(matches!(other.verify(&token), Err(AppError::Authentication(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = SessionTokens::new(SECRET, 24);
        let now = Utc::now().timestamp();
        let token = tokens
            .sign(&SessionClaims {
                sub: "1".to_string(),
                role: "reader".to_string(),
                sv: 0,
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();

        let err = tokens.verify(&token).unwrap_err();
        assert_eq!(err.to_string(), "Authentication required: Token has expired");
    }

    #[test]
    fn test_garbage_rejected() {
        let tokens = SessionTokens::new(SECRET, 24);
        assert!(tokens.verify("not-a-jwt").is_err());
        assert!(tokens.verify("").is_err());
    }

    #[test]
    fn test_non_numeric_subject() {
        let claims = SessionClaims {
            sub: "alice".to_string(),
            role: "reader".to_string(),
            sv: 0,
            iat: 0,
            exp: 0,
        };
        assert!(claims.user_id().is_err());
    }
}
