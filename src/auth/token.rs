//! HS256 access tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id (email). Older tokens carry it as `user_id`.
    #[serde(alias = "user_id")]
    pub sub: String,
    pub is_admin: bool,
    /// Issued-at unix seconds
    pub iat: i64,
    /// Expiration unix seconds
    pub exp: i64,
}

/// Sign a token for `user_id`. Returns the token and its expiry timestamp.
pub fn issue_token(
    secret: &str,
    user_id: &str,
    is_admin: bool,
    ttl_hours: i64,
) -> Result<(String, i64), AuthError> {
    let now = Utc::now();
    let exp = now + Duration::hours(ttl_hours.max(1));
    let claims = Claims {
        sub: user_id.to_string(),
        is_admin,
        iat: now.timestamp(),
        exp: exp.timestamp(),
    };
    let token = jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::Signing(e.to_string()))?;
    Ok((token, claims.exp))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::default();
    validation.leeway = 0;
    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies() {
        let (token, exp) = issue_token("secret", "a@example.com", true, 24).unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "a@example.com");
        assert!(claims.is_admin);
        assert_eq!(claims.exp, exp);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let (token, _) = issue_token("secret", "a@example.com", false, 24).unwrap();
        assert!(matches!(
            verify_token(&token, "other"),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            verify_token("not-a-jwt", "secret"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_reported() {
        let claims = Claims {
            sub: "a@example.com".to_string(),
            is_admin: false,
            iat: Utc::now().timestamp() - 7200,
            exp: Utc::now().timestamp() - 3600,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        let err = verify_token(&token, "secret").unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired));
        assert_eq!(err.to_string(), "Token has expired");
    }

    #[test]
    fn user_id_claim_is_accepted() {
        let now = Utc::now().timestamp();
        let payload = serde_json::json!({
            "user_id": "legacy@example.com",
            "is_admin": true,
            "iat": now,
            "exp": now + 3600,
        });
        let token = jsonwebtoken::encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "legacy@example.com");
        assert!(claims.is_admin);
    }
}
