//! OpenAPI documentation and schema generation
//!
//! The specification is generated at compile time with utoipa.

use utoipa::OpenApi;

/// OpenAPI documentation for the marketdata-hub REST API
///
/// Served at `/openapi.json`; Swagger UI (when enabled) lives at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "marketdata-hub REST API",
        description = "Bulk download of contract ids and historical bars through a rate-limit aware worker pool, and read-back of stored bars",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:5080", description = "Local server")
    ),
    paths(
        // Downloads
        crate::api::routes::download_contract_ids,
        crate::api::routes::download_historical_bars,
        crate::api::routes::retry_historical_bars,

        // Market data
        crate::api::routes::fetch_market_data,

        // Queue
        crate::api::routes::queue_stats,

        // Configuration
        crate::api::routes::get_config,
        crate::api::routes::update_config,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        crate::types::BarInterval,
        crate::types::SymbolContract,
        crate::types::QueueStats,
        crate::types::DownloadSummary,
        crate::types::Bar,
        crate::types::MarketDataResponse,

        crate::config::Config,
        crate::config::ConfigUpdate,
        crate::config::DownloadServiceSettings,
        crate::config::RetryConfig,
        crate::config::IbkrApiSettings,
        crate::config::FileStorageSettings,
        crate::config::ApiConfig,

        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "download", description = "Bulk downloads - Contract ids and historical bars"),
        (name = "marketdata", description = "Market data - Read stored bars"),
        (name = "queue", description = "Work queue and worker pool statistics"),
        (name = "config", description = "Configuration - Read config, update download settings at runtime"),
        (name = "system", description = "System endpoints - Health check, OpenAPI spec"),
    )
)]
pub struct ApiDoc;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_route() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&str> = spec.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/download/contractids",
            "/download/bars/{interval}",
            "/download/bars/{interval}/retry",
            "/marketdata/{symbol}/{interval}",
            "/queue/stats",
            "/config",
            "/health",
            "/openapi.json",
        ] {
            assert!(paths.contains(&expected), "missing path {expected}");
        }
    }

    #[test]
    fn spec_has_schemas_and_tags() {
        let spec = ApiDoc::openapi();

        let components = spec.components.unwrap();
        assert!(components.schemas.contains_key("DownloadSummary"));
        assert!(components.schemas.contains_key("ApiError"));
        assert!(components.schemas.contains_key("MarketDataResponse"));
        assert!(components.schemas.contains_key("Bar"));

        let tags = spec.tags.unwrap();
        let tag_names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tag_names, vec!["download", "marketdata", "queue", "config", "system"]);
    }

    #[test]
    fn spec_info_and_version() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "marketdata-hub REST API");
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));

        let json = serde_json::to_value(&spec).unwrap();
        let version = json.get("openapi").and_then(|v| v.as_str()).unwrap();
        assert!(version.starts_with("3."));
    }
}
