use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{EventStore, StoreError};
use crate::models::{Event, EventStatus, Feedback};

/// Postgres-backed event store. The event row carries a `version` column;
/// `save` replaces the whole aggregate (row plus roster and feedback child
/// tables) inside one transaction guarded by a conditional
/// `UPDATE .. WHERE id = $1 AND version = $2`, so two writers racing on the
/// same event cannot both land.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct EventRow {
    id: Uuid,
    club_id: Uuid,
    title: String,
    description: String,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    location: String,
    image: Option<String>,
    category: String,
    status: String,
    max_participants: Option<i32>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EventRow {
    fn into_event(self, registered_users: Vec<Uuid>, feedback: Vec<Feedback>) -> Event {
        Event {
            id: self.id,
            club_id: self.club_id,
            title: self.title,
            description: self.description,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            location: self.location,
            image: self.image,
            category: self.category,
            status: EventStatus::parse(&self.status).unwrap_or(EventStatus::Upcoming),
            max_participants: self.max_participants,
            registered_users,
            feedback,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct RegistrationRow {
    event_id: Uuid,
    user_id: Uuid,
}

#[derive(FromRow)]
struct FeedbackRow {
    id: Uuid,
    event_id: Uuid,
    user_id: Uuid,
    rating: i32,
    comment: Option<String>,
    date: DateTime<Utc>,
}

impl From<FeedbackRow> for Feedback {
    fn from(row: FeedbackRow) -> Self {
        Feedback {
            id: row.id,
            event_id: row.event_id,
            user_id: row.user_id,
            rating: row.rating,
            comment: row.comment,
            date: row.date,
        }
    }
}

async fn write_children(
    tx: &mut Transaction<'_, Postgres>,
    event: &Event,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM event_registrations WHERE event_id = $1")
        .bind(event.id)
        .execute(&mut **tx)
        .await?;
    for (position, user_id) in event.registered_users.iter().enumerate() {
        sqlx::query(
            "INSERT INTO event_registrations (event_id, user_id, position) VALUES ($1, $2, $3)",
        )
        .bind(event.id)
        .bind(user_id)
        .bind(position as i32)
        .execute(&mut **tx)
        .await?;
    }

    sqlx::query("DELETE FROM event_feedback WHERE event_id = $1")
        .bind(event.id)
        .execute(&mut **tx)
        .await?;
    for entry in &event.feedback {
        sqlx::query(
            "INSERT INTO event_feedback (id, event_id, user_id, rating, comment, date) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.id)
        .bind(entry.event_id)
        .bind(entry.user_id)
        .bind(entry.rating)
        .bind(&entry.comment)
        .bind(entry.date)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl EventStore for PgEventStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query_as::<_, EventRow>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let roster = sqlx::query_as::<_, RegistrationRow>(
            "SELECT event_id, user_id FROM event_registrations \
             WHERE event_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let feedback = sqlx::query_as::<_, FeedbackRow>(
            "SELECT id, event_id, user_id, rating, comment, date FROM event_feedback \
             WHERE event_id = $1 ORDER BY date",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(row.into_event(
            roster.into_iter().map(|r| r.user_id).collect(),
            feedback.into_iter().map(Feedback::from).collect(),
        )))
    }

    async fn save(&self, event: &Event) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE events SET title = $2, description = $3, date = $4, start_time = $5, \
             end_time = $6, location = $7, image = $8, category = $9, status = $10, \
             max_participants = $11, version = version + 1, updated_at = now() \
             WHERE id = $1 AND version = $12",
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(&event.location)
        .bind(&event.image)
        .bind(&event.category)
        .bind(event.status.as_str())
        .bind(event.max_participants)
        .bind(event.version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Distinguish a stale version from a deleted event.
            let exists: Option<(Uuid,)> =
                sqlx::query_as("SELECT id FROM events WHERE id = $1")
                    .bind(event.id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;
            return Err(match exists {
                Some(_) => StoreError::Conflict,
                None => StoreError::NotFound,
            });
        }

        write_children(&mut tx, event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert(&self, event: &Event) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO events (id, club_id, title, description, date, start_time, end_time, \
             location, image, category, status, max_participants, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(event.id)
        .bind(event.club_id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(&event.location)
        .bind(&event.image)
        .bind(&event.category)
        .bind(event.status.as_str())
        .bind(event.max_participants)
        .bind(event.version)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&mut *tx)
        .await?;

        write_children(&mut tx, event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let deleted = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT * FROM events ORDER BY date, start_time",
        )
        .fetch_all(&self.pool)
        .await?;

        let roster_rows = sqlx::query_as::<_, RegistrationRow>(
            "SELECT event_id, user_id FROM event_registrations ORDER BY event_id, position",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut rosters: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for row in roster_rows {
            rosters.entry(row.event_id).or_default().push(row.user_id);
        }

        let feedback_rows = sqlx::query_as::<_, FeedbackRow>(
            "SELECT id, event_id, user_id, rating, comment, date FROM event_feedback \
             ORDER BY event_id, date",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut feedback: HashMap<Uuid, Vec<Feedback>> = HashMap::new();
        for row in feedback_rows {
            feedback
                .entry(row.event_id)
                .or_default()
                .push(Feedback::from(row));
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let roster = rosters.remove(&row.id).unwrap_or_default();
                let entries = feedback.remove(&row.id).unwrap_or_default();
                row.into_event(roster, entries)
            })
            .collect())
    }
}
