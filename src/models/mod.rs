pub mod club;
pub mod event;
pub mod feedback;
pub mod user;

pub use club::Club;
pub use event::{CapacityStatus, Event, EventStatus};
pub use feedback::Feedback;
pub use user::{Role, User};
