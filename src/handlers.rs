use crate::analysis;
use crate::cache_validator::ValidatedCacheEntry;
use crate::config::Config;
use crate::errors::AppError;
use crate::key_store::KeyStore;
use crate::models::*;
use crate::services::{GeminiService, UnleashNftsService};
use axum::{extract::State, http::StatusCode, Json};
use moka::future::Cache;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Process-wide holder of the two upstream API keys.
    pub key_store: KeyStore,
    /// Provider fragment-bundle cache (5 minute TTL) to reduce external API
    /// calls. Key: "{chain_code}:{contract}:{token_id}", value: validated
    /// serialized `NftFragments`.
    pub fragment_cache: Cache<String, String>,
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is running")
    ),
    tag = "health"
)]
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "message": "Backend is running"
        })),
    )
}

/// POST /api/set_api_keys
///
/// Stores both upstream API keys for subsequent analyze requests. Requires
/// both keys; a partial update would leave the pair inconsistent, so it is
/// rejected without touching the stored credentials.
#[utoipa::path(
    post,
    path = "/api/set_api_keys",
    request_body = SetApiKeysRequest,
    responses(
        (status = 200, description = "Keys stored", body = SetApiKeysResponse),
        (status = 400, description = "One or both keys missing")
    ),
    tag = "configuration"
)]
pub async fn set_api_keys(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SetApiKeysRequest>,
) -> Result<Json<SetApiKeysResponse>, AppError> {
    let unleash_key = payload
        .unleash_nft_api_key
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let gemini_key = payload
        .gemini_api_key
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let (Some(unleash_key), Some(gemini_key)) = (unleash_key, gemini_key) else {
        return Err(AppError::BadRequest(
            "Both UnleashNFTs and Gemini API keys are required".to_string(),
        ));
    };

    state.key_store.set_keys(unleash_key, gemini_key).await?;
    tracing::info!("API keys updated, upstream clients will use the new pair");

    Ok(Json(SetApiKeysResponse {
        status: "success".to_string(),
        message: "API keys updated and clients reinitialized".to_string(),
    }))
}

/// POST /api/analyze_nft
///
/// Flow:
/// 1. Require the UnleashNFTs key (400 before any outbound call otherwise).
/// 2. Validate the three identifier fields.
/// 3. Fetch the six provider fragments (cache-aware, failure-isolated).
/// 4. Generate the narrative analysis, degrading to the fallback text.
/// 5. Assemble the aggregate response.
///
/// Individual fragment failures are reported inside the 200 envelope as
/// `{error, data: null}` markers; callers must inspect each fragment.
#[utoipa::path(
    post,
    path = "/api/analyze_nft",
    request_body = AnalyzeNftRequest,
    responses(
        (status = 200, description = "Aggregated NFT data and narrative analysis", body = AnalyzeNftResponse),
        (status = 400, description = "Missing identifier fields or API keys not set"),
        (status = 500, description = "Unexpected failure")
    ),
    tag = "analysis"
)]
pub async fn analyze_nft(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AnalyzeNftRequest>,
) -> Result<Json<AnalyzeNftResponse>, AppError> {
    let credentials = state.key_store.current().await;
    let Some(unleash_key) = credentials.unleash_api_key else {
        return Err(AppError::BadRequest(
            "API keys not set. Please configure them in the extension options.".to_string(),
        ));
    };

    let id = payload.into_identifier()?;
    tracing::info!(
        "POST /analyze_nft - {}/{} on {}",
        id.contract_address,
        id.token_id,
        id.blockchain
    );

    let fragments = fetch_fragments_cached(&state, &unleash_key, &id).await;

    let gemini = credentials
        .gemini_api_key
        .map(|key| GeminiService::new(&state.config.gemini_base_url, &key));
    let ai_analysis = analysis::generate_analysis(gemini.as_ref(), &id, &fragments).await;

    Ok(Json(AnalyzeNftResponse {
        success: true,
        data: analysis::assemble_response(&id, fragments, ai_analysis),
    }))
}

/// Fetches the six fragments for one NFT, serving a validated cached bundle
/// when available. Only fully successful bundles are cached, so failure
/// markers are always fresh.
async fn fetch_fragments_cached(
    state: &AppState,
    unleash_key: &str,
    id: &NftIdentifier,
) -> NftFragments {
    let cache_key = id.cache_key();

    if let Some(cached) = state.fragment_cache.get(&cache_key).await {
        if let Some(entry) = ValidatedCacheEntry::deserialize_and_validate(&cached) {
            if let Ok(fragments) = serde_json::from_str::<NftFragments>(&entry.data) {
                tracing::debug!(
                    "Fragment cache HIT for {} (fetched at {})",
                    cache_key,
                    entry.cached_at
                );
                return fragments;
            }
        } else {
            tracing::warn!(
                "Cache validation failed for {}, refetching from provider",
                cache_key
            );
        }
    }

    tracing::debug!("Fragment cache MISS for {}", cache_key);
    let service = UnleashNftsService::new(&state.config.unleash_base_url, unleash_key);
    let fragments = service.fetch_all_fragments(id).await;

    if fragments.all_ok() {
        if let Ok(json_str) = serde_json::to_string(&fragments) {
            let entry = ValidatedCacheEntry::new(json_str);
            state.fragment_cache.insert(cache_key, entry.serialize()).await;
        }
    }

    fragments
}
