//! Bearer access-token authentication.
//!
//! Tokens are issued elsewhere; this service only verifies them (HS256,
//! shared `JWT_SECRET`) and exposes the caller as [`AuthUser`].

pub mod jwt;
pub mod middleware;
pub mod models;

pub use jwt::{AccessClaims, JwtVerifier, ACCESS_TOKEN_TYPE};
pub use middleware::auth_middleware;
pub use models::AuthUser;
