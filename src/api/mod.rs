//! REST API server module
//!
//! Exposes the bulk download operations, queue statistics and runtime
//! settings over HTTP, with an OpenAPI document and optional Swagger UI.

use crate::config::ApiConfig;
use crate::{MarketDataHub, Result};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Downloads
/// - `POST /download/contractids` - Resolve contract ids for the symbols file
/// - `POST /download/bars/:interval` - Download historical bars
/// - `POST /download/bars/:interval/retry` - Retry contracts left without bars
///
/// ## Market data
/// - `GET /marketdata/:symbol/:interval` - Stored bars for one symbol
///
/// ## Queue
/// - `GET /queue/stats` - Queue and worker pool statistics
///
/// ## Configuration
/// - `GET /config` - Current config
/// - `PATCH /config` - Update download settings
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive documentation (if enabled)
pub fn create_router(hub: Arc<MarketDataHub>, config: &ApiConfig) -> Router {
    let state = AppState::new(hub);

    let router = Router::new()
        // Downloads
        .route("/download/contractids", post(routes::download_contract_ids))
        .route(
            "/download/bars/:interval",
            post(routes::download_historical_bars),
        )
        .route(
            "/download/bars/:interval/retry",
            post(routes::retry_historical_bars),
        )
        // Market data
        .route(
            "/marketdata/:symbol/:interval",
            get(routes::fetch_market_data),
        )
        // Queue
        .route("/queue/stats", get(routes::queue_stats))
        // Configuration
        .route("/config", get(routes::get_config).patch(routes::update_config))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    // SwaggerUi registers its own spec route, so it gets a path distinct from /openapi.json
    let router = if config.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    if config.cors_enabled {
        router.layer(build_cors_layer(&config.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Serve the API on the configured bind address
///
/// Runs until the hub's shutdown token is cancelled, then finishes in-flight
/// requests and returns.
///
/// # Example
///
/// ```no_run
/// use marketdata_hub::{Config, MarketDataHub};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let hub = Arc::new(MarketDataHub::new(config.clone())?);
/// hub.start().await?;
///
/// marketdata_hub::api::start_api_server(hub, config.api).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(hub: Arc<MarketDataHub>, config: ApiConfig) -> Result<()> {
    let bind_address = config.bind_address;
    tracing::info!(address = %bind_address, "Starting API server");

    let shutdown = hub.shutdown_token();
    let app = create_router(hub, &config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %listener.local_addr().map_err(crate::error::Error::Io)?,
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
