use std::env;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

use crate::middleware::JwtKeys;

pub struct Config {
    pub database_url: String,
    pub port: u16,
    jwt_keys: JwtKeys,
}

impl Config {
    pub fn from_env() -> Self {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/campushub".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3001);
        let jwt_secret =
            env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".to_string());
        Self::new(database_url, port, &jwt_secret)
    }

    pub fn new(database_url: String, port: u16, jwt_secret: &str) -> Self {
        Self {
            database_url,
            port,
            jwt_keys: JwtKeys::new(jwt_secret),
        }
    }

    pub fn jwt_keys(&self) -> &JwtKeys {
        &self.jwt_keys
    }
}
