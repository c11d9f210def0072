mod analysis;
mod cache_validator;
mod config;
mod errors;
mod handlers;
mod key_store;
mod models;
mod services;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use moka::future::Cache;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::key_store::KeyStore;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::health, handlers::set_api_keys, handlers::analyze_nft),
    components(schemas(
        models::SetApiKeysRequest,
        models::SetApiKeysResponse,
        models::AnalyzeNftRequest,
        models::AnalyzeNftData,
        models::AnalyzeNftResponse,
    )),
    tags(
        (name = "health", description = "Service health probe"),
        (name = "configuration", description = "Upstream API key management"),
        (name = "analysis", description = "NFT data aggregation and AI analysis")
    )
)]
struct ApiDoc;

/// Main entry point for the application.
///
/// Initializes logging, configuration, the credential store, and the provider
/// response cache, then starts the Axum server with CORS, rate limiting, and
/// request tracing.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_nft_analyzer_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Seed the key store from the environment; the set_api_keys endpoint
    // replaces the pair at runtime.
    let key_store = KeyStore::from_config(&config);
    if config.unleash_api_key.is_none() {
        tracing::warn!(
            "UnleashNFTs API key not set at startup; analyze requests will be refused until keys are configured"
        );
    }

    // Create provider fragment cache (5 minute TTL, 10k max entries)
    let fragment_cache = Cache::builder()
        .time_to_live(Duration::from_secs(300))
        .max_capacity(10_000)
        .build();
    tracing::info!("Fragment cache initialized (5m TTL, 10k capacity)");

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        config: config.clone(),
        key_store,
        fragment_cache,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build API routes with security layers
    let api_routes = Router::new()
        .route("/api/set_api_keys", post(handlers::set_api_keys))
        .route("/api/analyze_nft", post(handlers::analyze_nft))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check bypassing rate limiting
    let app = Router::new()
        .route("/api/health", get(handlers::health))
        .merge(api_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        // Anything that panics past the handlers still answers with the
        // generic failure envelope instead of dropping the connection.
        .layer(CatchPanicLayer::custom(
            |_: Box<dyn std::any::Any + Send>| {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": "Internal server error"
                    })),
                )
                    .into_response()
            },
        ))
        // Browser-extension origins vary per install, so CORS stays open.
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Connect info lets the rate limiter fall back to the peer address when
    // no forwarding headers are present.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
