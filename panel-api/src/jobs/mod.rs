//! Background Jobs for Panel API
//!
//! - `refresh`: pushes automatic component updates to live subscribers
//!
//! # Usage
//!
//! The coordinator is built by `AppState::init` and started when the
//! auto-update configuration is enabled:
//!
//! ```ignore
//! let state = AppState::init(AppConfig::from_env())?;
//! assert!(state.refresh.is_running());
//! // On shutdown
//! state.teardown().await;
//! ```

pub mod refresh;

pub use refresh::{
    select_topic, RefreshCoordinator, RefreshMetrics, RefreshSnapshot, TickOutcome,
};
