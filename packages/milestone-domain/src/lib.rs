pub mod change;
pub mod event;
pub mod message;
pub mod schedule;
pub mod time_serde;

pub use change::{Change, EntityType};
pub use event::MilestoneEvent;
