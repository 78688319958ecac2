pub mod event;
pub mod health;
pub mod heartbeat;

pub use event::{DomainEvent, EventCategory};
pub use health::{HealthSnapshot, HealthState, HealthTransition};
pub use heartbeat::Heartbeat;
