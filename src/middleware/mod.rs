pub mod auth;

pub use auth::{AuthUser, Claims, JwtKeys};
