//! Panel Events - Live Update Fan-out
//!
//! Wire messages pushed to dashboard clients and the subscriber registry
//! that delivers them.
//!
//! ## Architecture
//!
//! - One unbounded FIFO queue per connected client
//! - `publish` is best-effort: a closed queue drops its subscriber and
//!   delivery continues to everyone else
//! - Consumers wait on their queue with a timeout and emit a heartbeat
//!   when nothing arrives
//! - The most recent manual update is replayed to new subscribers

pub mod broadcaster;
pub mod event;

pub use broadcaster::{Broadcaster, SubscriberHandle, SubscriberInfo};
pub use event::{DashboardEvent, ServerSnapshot};
