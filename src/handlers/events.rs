use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::{Event, Role};
use crate::state::AppState;
use crate::store::EventStore;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};

/// Status transitions are wall-clock driven, so stored status is refreshed
/// lazily on read. The write is best-effort: losing a version race here just
/// means someone else refreshed first.
async fn refresh_status(store: &Arc<dyn EventStore>, mut event: Event) -> Event {
    let derived = event.status_at(Utc::now());
    if derived != event.status {
        event.status = derived;
        if let Err(err) = store.save(&event).await {
            tracing::debug!(event_id = %event.id, error = ?err, "status refresh write skipped");
        }
    }
    event
}

pub async fn list_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = state.store.list().await?;
    let mut refreshed = Vec::with_capacity(events.len());
    for event in events {
        refreshed.push(refresh_status(&state.store, event).await);
    }
    Ok(success(refreshed, "Events fetched").into_response())
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = state
        .store
        .find_by_id(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    let event = refresh_status(&state.store, event).await;
    Ok(success(event, "Event fetched").into_response())
}

#[derive(Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: String,
    /// Required for system admins, ignored for club admins (their own club
    /// is always used).
    pub club_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: String,
    pub image: Option<String>,
    pub category: String,
    pub max_participants: Option<i32>,
}

fn validate_capacity(max_participants: Option<i32>) -> Result<(), AppError> {
    if let Some(limit) = max_participants {
        if limit <= 0 {
            return Err(AppError::ValidationError(
                "maxParticipants must be a positive integer".to_string(),
            ));
        }
    }
    Ok(())
}

pub async fn create_event(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateEventRequest>,
) -> Result<Response, AppError> {
    let club_id = match user.role {
        Role::ClubAdmin => user.club_id.ok_or_else(|| {
            AppError::Forbidden("No club is associated with this account".to_string())
        })?,
        Role::Admin => req.club_id.ok_or_else(|| {
            AppError::ValidationError("clubId is required".to_string())
        })?,
        Role::Student => {
            return Err(AppError::Forbidden(
                "Only club admins may create events".to_string(),
            ))
        }
    };

    if req.title.trim().is_empty() {
        return Err(AppError::ValidationError("Title is required".to_string()));
    }
    if req.end_time <= req.start_time {
        return Err(AppError::ValidationError(
            "endTime must be after startTime".to_string(),
        ));
    }
    validate_capacity(req.max_participants)?;

    let now = Utc::now();
    let mut event = Event {
        id: Uuid::new_v4(),
        club_id,
        title: req.title.trim().to_string(),
        description: req.description,
        date: req.date,
        start_time: req.start_time,
        end_time: req.end_time,
        location: req.location,
        image: req.image,
        category: req.category,
        status: crate::models::EventStatus::Upcoming,
        max_participants: req.max_participants,
        registered_users: Vec::new(),
        feedback: Vec::new(),
        version: 0,
        created_at: now,
        updated_at: now,
    };
    event.status = event.status_at(now);

    state.store.insert(&event).await?;
    tracing::info!(event_id = %event.id, %club_id, "Event created");
    Ok(created(event, "Event created").into_response())
}

#[derive(Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub location: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub max_participants: Option<i32>,
}

pub async fn update_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    user: AuthUser,
    Json(req): Json<UpdateEventRequest>,
) -> Result<Response, AppError> {
    let mut event = state
        .store
        .find_by_id(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    if !user.manages_club(event.club_id) {
        return Err(AppError::Forbidden(
            "Only the owning club admin may edit this event".to_string(),
        ));
    }
    validate_capacity(req.max_participants)?;

    if let Some(title) = req.title {
        event.title = title;
    }
    if let Some(description) = req.description {
        event.description = description;
    }
    if let Some(date) = req.date {
        event.date = date;
    }
    if let Some(start_time) = req.start_time {
        event.start_time = start_time;
    }
    if let Some(end_time) = req.end_time {
        event.end_time = end_time;
    }
    if let Some(location) = req.location {
        event.location = location;
    }
    if let Some(image) = req.image {
        event.image = Some(image);
    }
    if let Some(category) = req.category {
        event.category = category;
    }
    if let Some(limit) = req.max_participants {
        event.max_participants = Some(limit);
    }
    if event.end_time <= event.start_time {
        return Err(AppError::ValidationError(
            "endTime must be after startTime".to_string(),
        ));
    }
    event.status = event.status_at(Utc::now());

    state.store.save(&event).await?;
    Ok(success(event, "Event updated").into_response())
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Response, AppError> {
    let event = state
        .store
        .find_by_id(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    if !user.manages_club(event.club_id) {
        return Err(AppError::Forbidden(
            "Only the owning club admin may delete this event".to_string(),
        ));
    }

    state.store.delete(event_id).await?;
    tracing::info!(%event_id, "Event deleted");
    Ok(empty_success("Event deleted").into_response())
}

pub async fn register_for_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Response, AppError> {
    state.engine.register(user.id, event_id, user.id).await?;
    Ok(empty_success("Successfully registered for event").into_response())
}

pub async fn unregister_from_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    user: AuthUser,
) -> Result<Response, AppError> {
    state.engine.unregister(user.id, event_id, user.id).await?;
    Ok(empty_success("Successfully unregistered from event").into_response())
}

#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    user: AuthUser,
    Json(req): Json<FeedbackRequest>,
) -> Result<Response, AppError> {
    let entry = state
        .engine
        .submit_feedback(user.id, event_id, req.rating, req.comment)
        .await?;
    Ok(created(entry, "Feedback submitted").into_response())
}

pub async fn capacity_status(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let status = state.engine.capacity_status(event_id).await?;
    Ok(success(status, "Capacity fetched").into_response())
}
