use serde::Deserialize;

/// Default UnleashNFTs REST API base. Overridable so tests can point the
/// service at a mock server.
const DEFAULT_UNLEASH_BASE_URL: &str = "https://api.unleashnfts.com/api/v1";
/// Default Gemini API base, overridable the same way.
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// UnleashNFTs API key present at startup, if any. The key store owns the
    /// live value; this is only the seed.
    pub unleash_api_key: Option<String>,
    /// Gemini API key present at startup, if any.
    pub gemini_api_key: Option<String>,
    pub unleash_base_url: String,
    pub gemini_base_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            unleash_api_key: std::env::var("UNLEASH_NFT_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            gemini_api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            unleash_base_url: std::env::var("UNLEASH_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("UNLEASH_BASE_URL must start with http:// or https://");
                    }
                    Ok(url)
                })
                .transpose()?
                .unwrap_or_else(|| DEFAULT_UNLEASH_BASE_URL.to_string()),
            gemini_base_url: std::env::var("GEMINI_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("GEMINI_BASE_URL must start with http:// or https://");
                    }
                    Ok(url)
                })
                .transpose()?
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("UnleashNFTs base URL: {}", config.unleash_base_url);
        tracing::debug!("Gemini base URL: {}", config.gemini_base_url);
        tracing::debug!(
            "UnleashNFTs key present at startup: {}",
            config.unleash_api_key.is_some()
        );
        tracing::debug!(
            "Gemini key present at startup: {}",
            config.gemini_api_key.is_some()
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
