use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Role, User};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

pub fn digest_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub department: Option<String>,
    pub year: Option<i32>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

/// Creates a student account and returns a signed token.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Response, AppError> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::ValidationError(
            "Name, email and password are required".to_string(),
        ));
    }

    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE email = $1")
        .bind(&req.email)
        .fetch_optional(&state.pool)
        .await?;
    if existing.is_some() {
        return Err(AppError::ValidationError(
            "An account with this email already exists".to_string(),
        ));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        email: req.email.trim().to_lowercase(),
        password_digest: digest_password(&req.password),
        role: Role::Student.as_str().to_string(),
        department: req.department,
        year: req.year,
        avatar: None,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO users (id, name, email, password_digest, role, department, year, avatar, \
         created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(user.id)
    .bind(&user.name)
    .bind(&user.email)
    .bind(&user.password_digest)
    .bind(&user.role)
    .bind(&user.department)
    .bind(user.year)
    .bind(&user.avatar)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(&state.pool)
    .await?;

    let token = state
        .config
        .jwt_keys()
        .create_token(user.id, Role::Student, None)?;

    tracing::info!(user_id = %user.id, "New account created");
    Ok(created(AuthPayload { token, user }, "Account created").into_response())
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(req.email.trim().to_lowercase())
        .fetch_optional(&state.pool)
        .await?;

    let Some(user) = user else {
        return Err(AppError::AuthError("Invalid email or password".to_string()));
    };
    if digest_password(&req.password) != user.password_digest {
        return Err(AppError::AuthError("Invalid email or password".to_string()));
    }

    let role = user.role();
    // Club admins carry their club in the token so ownership checks are free.
    let club_id = if role == Role::ClubAdmin {
        sqlx::query_as::<_, (Uuid,)>("SELECT id FROM clubs WHERE admin_id = $1")
            .bind(user.id)
            .fetch_optional(&state.pool)
            .await?
            .map(|(id,)| id)
    } else {
        None
    };

    let token = state.config.jwt_keys().create_token(user.id, role, club_id)?;

    Ok(success(AuthPayload { token, user }, "Login successful").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_digest_is_stable_hex() {
        let digest = digest_password("hunter2");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, digest_password("hunter2"));
        assert_ne!(digest, digest_password("hunter3"));
    }
}
