use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Club {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub logo: Option<String>,
    pub cover_image: Option<String>,
    pub category: String,
    pub founded_year: Option<i32>,
    pub members: i32,
    pub admin_id: Uuid,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
