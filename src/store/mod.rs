use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Event;

pub mod memory;
pub mod postgres;

pub use memory::MemEventStore;
pub use postgres::PgEventStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event not found")]
    NotFound,

    #[error("concurrent write conflict")]
    Conflict,

    #[error("storage backend error")]
    Backend(#[from] sqlx::Error),
}

/// Persistence boundary for the event aggregate.
///
/// `save` is a compare-and-swap: it succeeds only while the stored version
/// still matches `event.version`, and bumps the version on success. A losing
/// writer gets `StoreError::Conflict` and must re-read before retrying. This
/// is what keeps roster capacity checks race-free without locks in the
/// registration engine.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    /// Conditional update keyed on `event.version`.
    async fn save(&self, event: &Event) -> Result<(), StoreError>;

    /// First write of a new event; fails on id collision.
    async fn insert(&self, event: &Event) -> Result<(), StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// All events, date ascending.
    async fn list(&self) -> Result<Vec<Event>, StoreError>;
}
