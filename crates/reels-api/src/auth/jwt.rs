use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reels_core::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value of the `type` claim on tokens that may call the API.
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid, // user_id
    #[serde(rename = "type")]
    pub token_type: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

/// Verifies HS256 access tokens signed with the shared secret.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Decode and check a token, returning the caller's user id.
    pub fn validate_token(&self, token: &str) -> Result<Uuid, AppError> {
        let token_data = decode::<AccessClaims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!("JWT validation failed: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => AppError::InvalidToken("Token has expired".to_string()),
                ErrorKind::InvalidSignature => {
                    AppError::InvalidToken("Token signature mismatch".to_string())
                }
                _ => AppError::InvalidToken(format!("Malformed token: {}", e)),
            }
        })?;

        if token_data.claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(AppError::InvalidToken(format!(
                "Expected an access token, got '{}'",
                token_data.claims.token_type
            )));
        }

        Ok(token_data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret-that-is-at-least-32-chars";

    fn token(secret: &str, token_type: &str, exp_offset: i64) -> (Uuid, String) {
        let user_id = Uuid::new_v4();
        let claims = AccessClaims {
            sub: user_id,
            token_type: token_type.to_string(),
            exp: chrono::Utc::now().timestamp() + exp_offset,
            iat: Some(chrono::Utc::now().timestamp()),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        (user_id, token)
    }

    #[test]
    fn test_valid_access_token() {
        let (user_id, token) = token(SECRET, "access", 600);
        assert_eq!(JwtVerifier::new(SECRET).validate_token(&token).unwrap(), user_id);
    }

    #[test]
    fn test_refresh_token_rejected() {
        let (_, token) = token(SECRET, "refresh", 600);
        let err = JwtVerifier::new(SECRET).validate_token(&token).unwrap_err();
        assert!(matches!(err, AppError::InvalidToken(_)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let (_, token) = token(SECRET, "access", -60);
        assert!(matches!(
            JwtVerifier::new(SECRET).validate_token(&token),
            Err(AppError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let (_, token) = token("another-secret-another-secret-1234", "access", 600);
        assert!(JwtVerifier::new(SECRET).validate_token(&token).is_err());
        assert!(JwtVerifier::new(SECRET).validate_token("not.a.jwt").is_err());
    }
}
