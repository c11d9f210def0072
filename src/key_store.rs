use crate::config::Config;
use crate::errors::AppError;
use tokio::sync::RwLock;

/// Current credential pair for the two upstream services.
///
/// Either key may be absent: the analyze endpoint refuses to run without the
/// UnleashNFTs key, while a missing Gemini key only degrades the narrative
/// analysis to its fallback text.
#[derive(Debug, Clone, Default)]
pub struct ApiCredentials {
    pub unleash_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

/// Process-wide holder of the upstream API keys.
///
/// Seeded from the environment at startup and replaced wholesale by the
/// key-update endpoint. A write swaps the entire pair under the lock, so a
/// request in flight always reads a self-consistent snapshot.
pub struct KeyStore {
    inner: RwLock<ApiCredentials>,
}

impl KeyStore {
    pub fn new(unleash_api_key: Option<String>, gemini_api_key: Option<String>) -> Self {
        Self {
            inner: RwLock::new(ApiCredentials {
                unleash_api_key,
                gemini_api_key,
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.unleash_api_key.clone(), config.gemini_api_key.clone())
    }

    /// Replaces both stored credentials. Rejects empty values; on rejection
    /// the previously stored pair is left untouched.
    pub async fn set_keys(&self, unleash_api_key: &str, gemini_api_key: &str) -> Result<(), AppError> {
        if unleash_api_key.trim().is_empty() || gemini_api_key.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Both UnleashNFTs and Gemini API keys are required".to_string(),
            ));
        }

        let mut guard = self.inner.write().await;
        *guard = ApiCredentials {
            unleash_api_key: Some(unleash_api_key.trim().to_string()),
            gemini_api_key: Some(gemini_api_key.trim().to_string()),
        };
        Ok(())
    }

    /// Returns a snapshot of the current credential pair.
    pub async fn current(&self) -> ApiCredentials {
        self.inner.read().await.clone()
    }
}
