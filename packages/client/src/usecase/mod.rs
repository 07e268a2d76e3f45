pub mod join_state;
pub mod realtime;

pub use join_state::JoinStateStore;
pub use realtime::{RealtimeConnectionHandle, StatusChange};
