use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;
use crate::state::AppState;
use crate::utils::error::AppError;

const TOKEN_TTL_DAYS: i64 = 7;

/// Bearer-token claims. `club_id` is present for club admins so ownership
/// checks do not need an extra lookup per request.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: String,
    pub club_id: Option<Uuid>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl JwtKeys {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn create_token(
        &self,
        user_id: Uuid,
        role: Role,
        club_id: Option<Uuid>,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            role: role.as_str().to_string(),
            club_id,
            iat: now.timestamp(),
            exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::InternalServerError(format!("token signing failed: {e}")))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| AppError::AuthError("Invalid or expired token".to_string()))
    }
}

/// The caller identity threaded into every engine call. No handler reads a
/// global "current user"; the identity always arrives through this extractor.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
    pub club_id: Option<Uuid>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins manage any club; club admins only their own.
    pub fn manages_club(&self, club_id: Uuid) -> bool {
        self.is_admin() || (self.role == Role::ClubAdmin && self.club_id == Some(club_id))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::AuthError("Missing authorization header".to_string()))?;
        let token = header.strip_prefix("Bearer ").unwrap_or(header);

        let claims = state.config.jwt_keys().verify_token(token)?;
        let role = Role::parse(&claims.role)
            .ok_or_else(|| AppError::AuthError("Unknown role in token".to_string()))?;

        Ok(AuthUser {
            id: claims.sub,
            role,
            club_id: claims.club_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_preserves_identity() {
        let keys = JwtKeys::new("test-secret");
        let user_id = Uuid::new_v4();
        let club_id = Uuid::new_v4();

        let token = keys
            .create_token(user_id, Role::ClubAdmin, Some(club_id))
            .unwrap();
        let claims = keys.verify_token(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, "club-admin");
        assert_eq!(claims.club_id, Some(club_id));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let keys = JwtKeys::new("test-secret");
        let other_keys = JwtKeys::new("different-secret");
        let token = other_keys
            .create_token(Uuid::new_v4(), Role::Student, None)
            .unwrap();
        assert!(keys.verify_token(&token).is_err());
    }

    #[test]
    fn club_management_rules() {
        let club = Uuid::new_v4();
        let other = Uuid::new_v4();

        let admin = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Admin,
            club_id: None,
        };
        assert!(admin.manages_club(club));

        let club_admin = AuthUser {
            id: Uuid::new_v4(),
            role: Role::ClubAdmin,
            club_id: Some(club),
        };
        assert!(club_admin.manages_club(club));
        assert!(!club_admin.manages_club(other));

        let student = AuthUser {
            id: Uuid::new_v4(),
            role: Role::Student,
            club_id: None,
        };
        assert!(!student.manages_club(club));
    }
}
