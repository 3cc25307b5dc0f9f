//! Cache-Protected Handler Execution
//!
//! Routes every dashboard request through the cache tier its endpoint was
//! registered with. Handler failures are logged, counted and returned as
//! [`ApiError`]s; a failed computation never writes to any tier.

use panel_core::{CacheKey, Params};
use panel_storage::{CacheTier, DataCache};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::registry::{CacheStrategy, HandlerContext, RegisteredEndpoint};
use crate::state::AppState;
use crate::telemetry::metrics::with_metrics;

/// Summary used when a handler supplies none: endpoint identity, request
/// parameters and the stamp of every cached data artifact.
pub fn default_summary(endpoint: &str, params: &Params, data: &DataCache) -> Value {
    json!({
        "endpoint": endpoint,
        "params": params,
        "data_cache_timestamps": data.timestamps(),
    })
}

/// Execute the handler registered at `path` under its cache strategy.
pub async fn execute(state: &AppState, path: &str, params: Params) -> ApiResult<Value> {
    let endpoint = state.registry.lookup(path)?;
    let ctx = HandlerContext {
        endpoint: path.to_string(),
        params,
        data: state.data.clone(),
    };

    match endpoint.effective_strategy(&ctx.params) {
        CacheStrategy::StartupOnce => startup_once(state, endpoint, &ctx).await,
        CacheStrategy::ResponseCache => response_cached(state, endpoint, &ctx).await,
        CacheStrategy::None => run_handler(endpoint, &ctx).await,
    }
}

async fn run_handler(endpoint: &RegisteredEndpoint, ctx: &HandlerContext) -> ApiResult<Value> {
    match endpoint.handler.compute(ctx).await {
        Ok(payload) => {
            with_metrics(|m| m.record_handler_run(&endpoint.path, true));
            Ok(payload)
        }
        Err(e) => {
            tracing::error!(
                endpoint = %ctx.endpoint,
                error = %e,
                "Handler failed, nothing cached"
            );
            with_metrics(|m| m.record_handler_run(&endpoint.path, false));
            Err(e.into())
        }
    }
}

async fn startup_once(
    state: &AppState,
    endpoint: &RegisteredEndpoint,
    ctx: &HandlerContext,
) -> ApiResult<Value> {
    let tier = CacheTier::Startup.as_str();
    if let Some(payload) = state.startup.get(&ctx.endpoint) {
        with_metrics(|m| m.record_cache_lookup(tier, true));
        return Ok(payload);
    }
    with_metrics(|m| m.record_cache_lookup(tier, false));

    let payload = run_handler(endpoint, ctx).await?;
    state.startup.set(&ctx.endpoint, payload.clone());
    Ok(payload)
}

async fn response_cached(
    state: &AppState,
    endpoint: &RegisteredEndpoint,
    ctx: &HandlerContext,
) -> ApiResult<Value> {
    let tier = CacheTier::Response.as_str();
    let key = CacheKey::with_params(&ctx.endpoint, &ctx.params);
    let summary = endpoint
        .handler
        .source_summary(ctx)
        .unwrap_or_else(|| default_summary(&ctx.endpoint, &ctx.params, &state.data));

    if let Some(payload) = state.responses.should_use_cache(&key, Some(&summary)) {
        with_metrics(|m| m.record_cache_lookup(tier, true));
        tracing::debug!(key = %key, "Serving cached response");
        return Ok(payload);
    }
    with_metrics(|m| m.record_cache_lookup(tier, false));

    let payload = run_handler(endpoint, ctx).await?;
    let evicted = state.responses.store(key, Some(&summary), payload.clone());
    with_metrics(|m| m.record_evictions(tier, evicted));
    Ok(payload)
}
