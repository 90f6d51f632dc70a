use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One participant's rating of a past event. Appended once per user,
/// never removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub date: DateTime<Utc>,
}

/// Inclusive rating bounds.
pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 5;

pub fn rating_in_range(rating: i32) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&rating)
}
