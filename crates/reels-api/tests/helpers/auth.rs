use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reels_api::auth::AccessClaims;
use uuid::Uuid;

use super::TEST_JWT_SECRET;

/// A user with a valid access token.
pub struct TestUser {
    pub user_id: Uuid,
    pub token: String,
}

impl TestUser {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

pub fn sign(user_id: Uuid, token_type: &str, secret: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = AccessClaims {
        sub: user_id,
        token_type: token_type.to_string(),
        exp: now + 900,
        iat: Some(now),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to sign test token")
}

pub fn test_user() -> TestUser {
    let user_id = Uuid::new_v4();
    TestUser {
        user_id,
        token: sign(user_id, "access", TEST_JWT_SECRET),
    }
}
