use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::feedback::{rating_in_range, MAX_RATING, MIN_RATING};
use crate::models::{CapacityStatus, Event, EventStatus, Feedback};
use crate::store::{EventStore, StoreError};

/// Guards every mutation of an event's roster and feedback list.
///
/// The engine itself holds no locks. Each operation is a read-modify-write
/// against one event; the store's compare-and-swap `save` detects a
/// concurrent writer, in which case the engine re-reads and retries once
/// before surfacing `Conflict` as a transient failure. Capacity and
/// uniqueness checks therefore always run against the state that actually
/// gets written.
#[derive(Clone)]
pub struct RegistrationEngine {
    store: Arc<dyn EventStore>,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("event not found")]
    NotFound,

    #[error("acting user does not match target user")]
    Forbidden,

    #[error("user is already registered for this event")]
    AlreadyRegistered,

    #[error("event is full")]
    EventFull,

    #[error("{0}")]
    NotEligible(&'static str),

    #[error("feedback already submitted for this event")]
    DuplicateFeedback,

    #[error("rating must be between {MIN_RATING} and {MAX_RATING}, got {0}")]
    InvalidRating(i32),

    #[error("concurrent update, please retry")]
    Conflict,

    #[error("storage backend error")]
    Backend(#[source] StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => EngineError::NotFound,
            StoreError::Conflict => EngineError::Conflict,
            StoreError::Backend(_) => EngineError::Backend(err),
        }
    }
}

impl RegistrationEngine {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Adds `user_id` to the event roster. Validation order is fixed:
    /// already-registered wins over event-full.
    pub async fn register(
        &self,
        actor: Uuid,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), EngineError> {
        if actor != user_id {
            return Err(EngineError::Forbidden);
        }
        match self.try_register(event_id, user_id).await {
            Err(EngineError::Conflict) => {
                debug!(%event_id, %user_id, "register lost the version race, retrying once");
                self.try_register(event_id, user_id).await
            }
            other => other,
        }
    }

    async fn try_register(&self, event_id: Uuid, user_id: Uuid) -> Result<(), EngineError> {
        let mut event = self.load(event_id).await?;
        if event.is_registered(user_id) {
            return Err(EngineError::AlreadyRegistered);
        }
        if event.capacity_status().is_full {
            return Err(EngineError::EventFull);
        }
        event.registered_users.push(user_id);
        self.store.save(&event).await?;
        Ok(())
    }

    /// Removes `user_id` from the roster. Unregistering a user who was never
    /// on the roster succeeds without a write: the desired state already
    /// holds.
    pub async fn unregister(
        &self,
        actor: Uuid,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), EngineError> {
        if actor != user_id {
            return Err(EngineError::Forbidden);
        }
        match self.try_unregister(event_id, user_id).await {
            Err(EngineError::Conflict) => {
                debug!(%event_id, %user_id, "unregister lost the version race, retrying once");
                self.try_unregister(event_id, user_id).await
            }
            other => other,
        }
    }

    async fn try_unregister(&self, event_id: Uuid, user_id: Uuid) -> Result<(), EngineError> {
        let mut event = self.load(event_id).await?;
        if !event.is_registered(user_id) {
            return Ok(());
        }
        event.registered_users.retain(|id| *id != user_id);
        self.store.save(&event).await?;
        Ok(())
    }

    /// Appends a feedback entry for the acting user. Only a participant of a
    /// past event may rate it, and only once; the timestamp is assigned
    /// here, not by the caller.
    pub async fn submit_feedback(
        &self,
        actor: Uuid,
        event_id: Uuid,
        rating: i32,
        comment: Option<String>,
    ) -> Result<Feedback, EngineError> {
        if !rating_in_range(rating) {
            return Err(EngineError::InvalidRating(rating));
        }
        match self
            .try_submit_feedback(event_id, actor, rating, comment.clone())
            .await
        {
            Err(EngineError::Conflict) => {
                debug!(%event_id, user_id = %actor, "feedback lost the version race, retrying once");
                self.try_submit_feedback(event_id, actor, rating, comment)
                    .await
            }
            other => other,
        }
    }

    async fn try_submit_feedback(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        rating: i32,
        comment: Option<String>,
    ) -> Result<Feedback, EngineError> {
        let mut event = self.load(event_id).await?;
        if event.status != EventStatus::Past {
            return Err(EngineError::NotEligible(
                "feedback opens once the event has ended",
            ));
        }
        if !event.is_registered(user_id) {
            return Err(EngineError::NotEligible(
                "only registered participants may leave feedback",
            ));
        }
        if event.has_feedback_from(user_id) {
            return Err(EngineError::DuplicateFeedback);
        }
        let entry = Feedback {
            id: Uuid::new_v4(),
            event_id,
            user_id,
            rating,
            comment,
            date: Utc::now(),
        };
        event.feedback.push(entry.clone());
        self.store.save(&event).await?;
        Ok(entry)
    }

    /// Pure capacity projection for an event, looked up by id.
    pub async fn capacity_status(&self, event_id: Uuid) -> Result<CapacityStatus, EngineError> {
        Ok(self.load(event_id).await?.capacity_status())
    }

    async fn load(&self, event_id: Uuid) -> Result<Event, EngineError> {
        match self.store.find_by_id(event_id).await {
            Ok(Some(event)) => Ok(event),
            Ok(None) => Err(EngineError::NotFound),
            Err(err) => {
                warn!(%event_id, error = ?err, "event store read failed");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemEventStore;
    use chrono::{NaiveDate, NaiveTime};

    fn event_fixture(status: EventStatus, max_participants: Option<i32>) -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            club_id: Uuid::new_v4(),
            title: "Chess blitz tournament".to_string(),
            description: "Five-round swiss, 5+0 time control".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 8).unwrap(),
            start_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            location: "Library basement".to_string(),
            image: None,
            category: "games".to_string(),
            status,
            max_participants,
            registered_users: Vec::new(),
            feedback: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    async fn engine_with(event: &Event) -> (RegistrationEngine, Arc<MemEventStore>) {
        let store = Arc::new(MemEventStore::new());
        store.insert(event).await.unwrap();
        (RegistrationEngine::new(store.clone()), store)
    }

    async fn roster(store: &MemEventStore, event_id: Uuid) -> Vec<Uuid> {
        store
            .find_by_id(event_id)
            .await
            .unwrap()
            .unwrap()
            .registered_users
    }

    #[tokio::test]
    async fn register_unknown_event_is_not_found() {
        let store = Arc::new(MemEventStore::new());
        let engine = RegistrationEngine::new(store);
        let user = Uuid::new_v4();
        let result = engine.register(user, Uuid::new_v4(), user).await;
        assert!(matches!(result, Err(EngineError::NotFound)));
    }

    #[tokio::test]
    async fn register_for_someone_else_is_forbidden() {
        let event = event_fixture(EventStatus::Upcoming, None);
        let (engine, _) = engine_with(&event).await;
        let result = engine
            .register(Uuid::new_v4(), event.id, Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(EngineError::Forbidden)));
    }

    #[tokio::test]
    async fn second_register_reports_already_registered_and_adds_once() {
        let event = event_fixture(EventStatus::Upcoming, None);
        let (engine, store) = engine_with(&event).await;
        let user = Uuid::new_v4();

        engine.register(user, event.id, user).await.unwrap();
        let result = engine.register(user, event.id, user).await;
        assert!(matches!(result, Err(EngineError::AlreadyRegistered)));
        assert_eq!(roster(&store, event.id).await, vec![user]);
    }

    #[tokio::test]
    async fn already_registered_wins_over_event_full() {
        // A registered user retrying on a now-full event must see
        // AlreadyRegistered, not EventFull.
        let event = event_fixture(EventStatus::Upcoming, Some(1));
        let (engine, _) = engine_with(&event).await;
        let user = Uuid::new_v4();

        engine.register(user, event.id, user).await.unwrap();
        let result = engine.register(user, event.id, user).await;
        assert!(matches!(result, Err(EngineError::AlreadyRegistered)));
    }

    #[tokio::test]
    async fn register_then_unregister_restores_the_roster() {
        let event = event_fixture(EventStatus::Upcoming, None);
        let (engine, store) = engine_with(&event).await;
        let existing = Uuid::new_v4();
        let newcomer = Uuid::new_v4();

        engine.register(existing, event.id, existing).await.unwrap();
        let before = roster(&store, event.id).await;

        engine.register(newcomer, event.id, newcomer).await.unwrap();
        engine
            .unregister(newcomer, event.id, newcomer)
            .await
            .unwrap();
        assert_eq!(roster(&store, event.id).await, before);
    }

    #[tokio::test]
    async fn unregister_of_absent_user_succeeds() {
        let event = event_fixture(EventStatus::Upcoming, None);
        let (engine, store) = engine_with(&event).await;
        let user = Uuid::new_v4();

        engine.unregister(user, event.id, user).await.unwrap();
        assert!(roster(&store, event.id).await.is_empty());
        // No write happened, so the version is untouched.
        let stored = store.find_by_id(event.id).await.unwrap().unwrap();
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn capacity_walkthrough_with_limit_two() {
        let event = event_fixture(EventStatus::Upcoming, Some(2));
        let (engine, store) = engine_with(&event).await;
        let (u1, u2, u3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        engine.register(u1, event.id, u1).await.unwrap();
        assert_eq!(roster(&store, event.id).await, vec![u1]);

        engine.register(u2, event.id, u2).await.unwrap();
        assert_eq!(roster(&store, event.id).await, vec![u1, u2]);

        let full = engine.register(u3, event.id, u3).await;
        assert!(matches!(full, Err(EngineError::EventFull)));

        engine.unregister(u1, event.id, u1).await.unwrap();
        assert_eq!(roster(&store, event.id).await, vec![u2]);

        engine.register(u3, event.id, u3).await.unwrap();
        assert_eq!(roster(&store, event.id).await, vec![u2, u3]);
    }

    #[tokio::test]
    async fn concurrent_registers_never_overshoot_the_limit() {
        const LIMIT: i32 = 5;
        const ATTEMPTS: usize = 32;

        let event = event_fixture(EventStatus::Upcoming, Some(LIMIT));
        let (engine, store) = engine_with(&event).await;

        let mut handles = Vec::new();
        for _ in 0..ATTEMPTS {
            let engine = engine.clone();
            let event_id = event.id;
            handles.push(tokio::spawn(async move {
                let user = Uuid::new_v4();
                engine.register(user, event_id, user).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => successes += 1,
                Err(EngineError::EventFull) | Err(EngineError::Conflict) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        let final_roster = roster(&store, event.id).await;
        assert!(final_roster.len() <= LIMIT as usize);
        assert_eq!(final_roster.len(), successes);
    }

    #[tokio::test]
    async fn feedback_requires_past_status() {
        for status in [EventStatus::Upcoming, EventStatus::Ongoing] {
            let mut event = event_fixture(status, None);
            let user = Uuid::new_v4();
            event.registered_users.push(user);
            let (engine, _) = engine_with(&event).await;

            let result = engine
                .submit_feedback(user, event.id, 5, Some("great".to_string()))
                .await;
            assert!(
                matches!(result, Err(EngineError::NotEligible(_))),
                "status {status:?} should not accept feedback"
            );
        }
    }

    #[tokio::test]
    async fn feedback_requires_participation() {
        let event = event_fixture(EventStatus::Past, None);
        let (engine, _) = engine_with(&event).await;
        let outsider = Uuid::new_v4();

        let result = engine
            .submit_feedback(outsider, event.id, 4, None)
            .await;
        assert!(matches!(result, Err(EngineError::NotEligible(_))));
    }

    #[tokio::test]
    async fn feedback_happy_path_then_duplicate() {
        let mut event = event_fixture(EventStatus::Past, None);
        let user = Uuid::new_v4();
        event.registered_users.push(user);
        let (engine, store) = engine_with(&event).await;

        let entry = engine
            .submit_feedback(user, event.id, 5, Some("great".to_string()))
            .await
            .unwrap();
        assert_eq!(entry.rating, 5);
        assert_eq!(entry.user_id, user);

        let again = engine
            .submit_feedback(user, event.id, 4, Some("again".to_string()))
            .await;
        assert!(matches!(again, Err(EngineError::DuplicateFeedback)));

        let stored = store.find_by_id(event.id).await.unwrap().unwrap();
        assert_eq!(stored.feedback.len(), 1);
    }

    #[tokio::test]
    async fn rating_boundaries_are_enforced() {
        let mut event = event_fixture(EventStatus::Past, None);
        let user = Uuid::new_v4();
        event.registered_users.push(user);
        let (engine, _) = engine_with(&event).await;

        for rating in [0, 6] {
            let result = engine.submit_feedback(user, event.id, rating, None).await;
            assert!(
                matches!(result, Err(EngineError::InvalidRating(r)) if r == rating),
                "rating {rating} should be rejected"
            );
        }
        // 1 and 5 are both valid; the second valid call is a duplicate.
        engine.submit_feedback(user, event.id, 1, None).await.unwrap();
        let result = engine.submit_feedback(user, event.id, 5, None).await;
        assert!(matches!(result, Err(EngineError::DuplicateFeedback)));
    }

    #[tokio::test]
    async fn invalid_rating_is_checked_before_the_event_lookup() {
        let store = Arc::new(MemEventStore::new());
        let engine = RegistrationEngine::new(store);
        let result = engine
            .submit_feedback(Uuid::new_v4(), Uuid::new_v4(), 0, None)
            .await;
        assert!(matches!(result, Err(EngineError::InvalidRating(0))));
    }

    #[tokio::test]
    async fn capacity_status_reports_unbounded_and_full() {
        let event = event_fixture(EventStatus::Upcoming, None);
        let (engine, _) = engine_with(&event).await;
        let status = engine.capacity_status(event.id).await.unwrap();
        assert_eq!(status.limit, None);
        assert!(!status.is_full);

        let mut limited = event_fixture(EventStatus::Upcoming, Some(1));
        limited.registered_users.push(Uuid::new_v4());
        let (engine, _) = engine_with(&limited).await;
        let status = engine.capacity_status(limited.id).await.unwrap();
        assert_eq!(status.registered_count, 1);
        assert_eq!(status.limit, Some(1));
        assert!(status.is_full);
    }
}
