//! Live Notification Pusher.

pub mod event;
pub mod hub;

pub use event::{PushEvent, ScoreboardDelta};
pub use hub::{NotificationHub, Session};
