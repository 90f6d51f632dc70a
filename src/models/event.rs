use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::feedback::Feedback;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Upcoming,
    Ongoing,
    Past,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Upcoming => "upcoming",
            EventStatus::Ongoing => "ongoing",
            EventStatus::Past => "past",
        }
    }

    pub fn parse(s: &str) -> Option<EventStatus> {
        match s {
            "upcoming" => Some(EventStatus::Upcoming),
            "ongoing" => Some(EventStatus::Ongoing),
            "past" => Some(EventStatus::Past),
            _ => None,
        }
    }
}

/// Read-only capacity projection for "spots filled" displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapacityStatus {
    pub registered_count: usize,
    /// None means unbounded.
    pub limit: Option<i32>,
    pub is_full: bool,
}

/// An event aggregate: the roster and feedback list travel with the event
/// and are persisted together under one optimistic-concurrency version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub club_id: Uuid,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: String,
    pub image: Option<String>,
    pub category: String,
    pub status: EventStatus,
    /// Capacity limit; None means unbounded.
    pub max_participants: Option<i32>,
    /// Roster, unique, in insertion order.
    pub registered_users: Vec<Uuid>,
    pub feedback: Vec<Feedback>,
    /// Bumped by the store on every successful save.
    #[serde(skip)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_registered(&self, user_id: Uuid) -> bool {
        self.registered_users.contains(&user_id)
    }

    pub fn has_feedback_from(&self, user_id: Uuid) -> bool {
        self.feedback.iter().any(|f| f.user_id == user_id)
    }

    pub fn capacity_status(&self) -> CapacityStatus {
        let registered_count = self.registered_users.len();
        let is_full = self
            .max_participants
            .map_or(false, |limit| registered_count >= limit.max(0) as usize);
        CapacityStatus {
            registered_count,
            limit: self.max_participants,
            is_full,
        }
    }

    /// Wall-clock status: upcoming until the start instant, ongoing until
    /// the end instant, past afterwards. Schedule times are stored in UTC.
    /// The registration engine never calls this; status transitions are
    /// applied by the API layer on read.
    pub fn status_at(&self, now: DateTime<Utc>) -> EventStatus {
        let start = self.date.and_time(self.start_time).and_utc();
        let end = self.date.and_time(self.end_time).and_utc();
        if now < start {
            EventStatus::Upcoming
        } else if now <= end {
            EventStatus::Ongoing
        } else {
            EventStatus::Past
        }
    }
}
