use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::Club;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub async fn list_clubs(State(state): State<AppState>) -> Result<Response, AppError> {
    let clubs = sqlx::query_as::<_, Club>(
        "SELECT * FROM clubs WHERE is_approved = TRUE ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(success(clubs, "Clubs fetched").into_response())
}

pub async fn get_club(
    State(state): State<AppState>,
    Path(club_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let club = sqlx::query_as::<_, Club>("SELECT * FROM clubs WHERE id = $1")
        .bind(club_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Club not found".to_string()))?;

    Ok(success(club, "Club fetched").into_response())
}

#[derive(Deserialize)]
pub struct UpdateClubRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub cover_image: Option<String>,
    pub category: Option<String>,
    pub founded_year: Option<i32>,
}

/// Only the club's own admin or a system admin may edit a club.
pub async fn update_club(
    State(state): State<AppState>,
    Path(club_id): Path<Uuid>,
    user: AuthUser,
    Json(req): Json<UpdateClubRequest>,
) -> Result<Response, AppError> {
    let mut club = sqlx::query_as::<_, Club>("SELECT * FROM clubs WHERE id = $1")
        .bind(club_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Club not found".to_string()))?;

    if club.admin_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only the club admin may edit this club".to_string(),
        ));
    }

    if let Some(name) = req.name {
        club.name = name;
    }
    if let Some(description) = req.description {
        club.description = description;
    }
    if let Some(logo) = req.logo {
        club.logo = Some(logo);
    }
    if let Some(cover_image) = req.cover_image {
        club.cover_image = Some(cover_image);
    }
    if let Some(category) = req.category {
        club.category = category;
    }
    if let Some(founded_year) = req.founded_year {
        club.founded_year = Some(founded_year);
    }

    let updated = sqlx::query_as::<_, Club>(
        "UPDATE clubs SET name = $2, description = $3, logo = $4, cover_image = $5, \
         category = $6, founded_year = $7, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(club.id)
    .bind(&club.name)
    .bind(&club.description)
    .bind(&club.logo)
    .bind(&club.cover_image)
    .bind(&club.category)
    .bind(club.founded_year)
    .fetch_one(&state.pool)
    .await?;

    Ok(success(updated, "Club updated").into_response())
}
