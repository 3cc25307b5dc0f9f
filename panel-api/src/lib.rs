//! Panel API - HTTP/SSE Dashboard Server
//!
//! Serves dashboard data computed from snapshot artifacts, protected by
//! three cache tiers:
//!
//! - a data cache of decoded sources, revalidated by modification time
//! - a response cache of computed payloads, revalidated by source fingerprint
//! - a startup cache of payloads computed once per process
//!
//! Live updates reach browsers over Server-Sent Events, pushed either by
//! clients through the update endpoint or by the refresh coordinator.

pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod macros;
pub mod protection;
pub mod registry;
pub mod routes;
pub mod state;
pub mod telemetry;

#[cfg(test)]
mod test_env;

pub use config::{AppConfig, AutoUpdateConfig, AutoUpdatePatch, DataSourceConfig, ServerConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{RefreshCoordinator, RefreshSnapshot, TickOutcome};
pub use protection::execute;
pub use registry::{
    default_registry, CacheStrategy, DashboardHandler, HandlerContext, HandlerRegistry,
    RegisteredEndpoint,
};
pub use routes::create_router;
pub use state::AppState;
