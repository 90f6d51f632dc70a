use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EventStore, StoreError};
use crate::models::Event;

/// In-memory event store with the same compare-and-swap save semantics as
/// the Postgres store. Backs the engine tests and local development.
#[derive(Default)]
pub struct MemEventStore {
    events: RwLock<HashMap<Uuid, Event>>,
}

impl MemEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl EventStore for MemEventStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        Ok(self.events.read().await.get(&id).cloned())
    }

    async fn save(&self, event: &Event) -> Result<(), StoreError> {
        let mut events = self.events.write().await;
        let current = events.get(&event.id).ok_or(StoreError::NotFound)?;
        if current.version != event.version {
            return Err(StoreError::Conflict);
        }
        let mut stored = event.clone();
        stored.version += 1;
        stored.updated_at = Utc::now();
        events.insert(stored.id, stored);
        Ok(())
    }

    async fn insert(&self, event: &Event) -> Result<(), StoreError> {
        let mut events = self.events.write().await;
        if events.contains_key(&event.id) {
            return Err(StoreError::Conflict);
        }
        events.insert(event.id, event.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.events
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn list(&self) -> Result<Vec<Event>, StoreError> {
        let mut all: Vec<Event> = self.events.read().await.values().cloned().collect();
        all.sort_by(|a, b| (a.date, a.start_time).cmp(&(b.date, b.start_time)));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventStatus;
    use chrono::{NaiveDate, NaiveTime};

    fn event_fixture() -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            club_id: Uuid::new_v4(),
            title: "Open mic".to_string(),
            description: "Monthly open mic".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            location: "Student union".to_string(),
            image: None,
            category: "music".to_string(),
            status: EventStatus::Upcoming,
            max_participants: None,
            registered_users: Vec::new(),
            feedback: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_bumps_version() {
        let store = MemEventStore::new();
        let event = event_fixture();
        store.insert(&event).await.unwrap();

        store.save(&event).await.unwrap();
        let reloaded = store.find_by_id(event.id).await.unwrap().unwrap();
        assert_eq!(reloaded.version, 1);
    }

    #[tokio::test]
    async fn stale_save_is_a_conflict() {
        let store = MemEventStore::new();
        let event = event_fixture();
        store.insert(&event).await.unwrap();

        // First writer wins, second still holds version 0.
        store.save(&event).await.unwrap();
        let result = store.save(&event).await;
        assert!(matches!(result, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn save_of_unknown_event_is_not_found() {
        let store = MemEventStore::new();
        let result = store.save(&event_fixture()).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }
}
