use crate::errors::AppError;
use crate::models::{Fragment, NftFragments, NftIdentifier};
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

/// One provider sub-endpoint: URL suffix plus its literal query set.
struct FragmentSpec {
    name: &'static str,
    path_suffix: &'static str,
    query: &'static [(&'static str, &'static str)],
}

/// The six sub-endpoints in fetch order.
const FRAGMENT_SPECS: [FragmentSpec; 6] = [
    FragmentSpec {
        name: "metadata",
        path_suffix: "",
        query: &[("currency", "usd"), ("include_washtrade", "true")],
    },
    FragmentSpec {
        name: "metrics",
        path_suffix: "/metrics",
        query: &[
            ("currency", "usd"),
            ("metrics", "volume"),
            ("metrics", "sales"),
            ("time_range", "30d"),
            ("include_washtrade", "true"),
        ],
    },
    FragmentSpec {
        name: "valuation",
        path_suffix: "/price-estimate",
        query: &[],
    },
    FragmentSpec {
        name: "price history",
        path_suffix: "/price-history",
        query: &[("currency", "usd"), ("include_washtrade", "true")],
    },
    FragmentSpec {
        name: "traits",
        path_suffix: "/traits",
        query: &[("currency", "usd")],
    },
    FragmentSpec {
        name: "transactions",
        path_suffix: "/transactions",
        query: &[
            ("sort_by", "transaction_date"),
            ("sort_order", "desc"),
            ("limit", "10"),
            ("time_range", "30d"),
        ],
    },
];

/// Client for the UnleashNFTs token-level REST API.
pub struct UnleashNftsService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl UnleashNftsService {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn fragment_url(&self, id: &NftIdentifier, spec: &FragmentSpec) -> Result<Url, AppError> {
        // Build URL with proper parameter encoding to prevent injection attacks
        Url::parse_with_params(
            &format!(
                "{}/nft/{}/{}/{}{}",
                self.base_url,
                id.chain_code(),
                id.contract_address,
                id.token_id,
                spec.path_suffix
            ),
            spec.query,
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build URL: {}", e)))
    }

    /// Fetches one fragment, capturing every failure mode as a marker.
    ///
    /// Non-200 statuses, transport errors, and parse errors all become
    /// `Fragment::Failed`; nothing escapes to the caller. One attempt, no
    /// retries.
    async fn fetch_fragment(&self, id: &NftIdentifier, spec: &FragmentSpec) -> Fragment {
        let url = match self.fragment_url(id, spec) {
            Ok(url) => url,
            Err(e) => return Fragment::failed(e.to_string()),
        };

        tracing::debug!("Fetching NFT {} from {}", spec.name, url);

        let response = match self
            .client
            .get(url)
            .header("accept", "application/json")
            .header("X-API-KEY", &self.api_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("NFT {} request failed: {}", spec.name, e);
                return Fragment::failed(e.to_string());
            }
        };

        let status = response.status();
        if status.as_u16() != 200 {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("NFT {} endpoint returned {}: {}", spec.name, status, body);
            return Fragment::failed(format!("API Error: {} - {}", status.as_u16(), body));
        }

        match response.json::<Value>().await {
            Ok(value) => Fragment::Ok(value),
            Err(e) => {
                tracing::warn!("Failed to parse NFT {} response: {}", spec.name, e);
                Fragment::failed(e.to_string())
            }
        }
    }

    /// Fetches all six fragments sequentially in fixed order.
    ///
    /// There is no atomicity across fragments; the caller may receive a mix
    /// of payloads and failure markers from the same request.
    pub async fn fetch_all_fragments(&self, id: &NftIdentifier) -> NftFragments {
        tracing::info!(
            "Fetching NFT data fragments for {}/{} on chain {}",
            id.contract_address,
            id.token_id,
            id.chain_code()
        );

        let metadata = self.fetch_fragment(id, &FRAGMENT_SPECS[0]).await;
        let metrics = self.fetch_fragment(id, &FRAGMENT_SPECS[1]).await;
        let valuation = self.fetch_fragment(id, &FRAGMENT_SPECS[2]).await;
        let price_history = self.fetch_fragment(id, &FRAGMENT_SPECS[3]).await;
        let traits = self.fetch_fragment(id, &FRAGMENT_SPECS[4]).await;
        let transactions = self.fetch_fragment(id, &FRAGMENT_SPECS[5]).await;

        NftFragments {
            metadata,
            metrics,
            valuation,
            price_history,
            traits,
            transactions,
        }
    }
}

/// Path of the Gemini text-generation endpoint under the configured base.
const GEMINI_GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

/// Client for the Gemini text-generation API.
pub struct GeminiService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiService {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Submits a prompt and extracts the first generated candidate's text.
    pub async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let url = format!("{}{}", self.base_url, GEMINI_GENERATE_PATH);

        let body = json!({
            "contents": [
                {
                    "parts": [
                        { "text": prompt }
                    ]
                }
            ]
        });

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("X-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Gemini request failed: {}", e)))?;

        if response.status().as_u16() != 200 {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::ExternalApiError(format!(
                "Gemini returned {}: {}",
                status, error_text
            )));
        }

        let payload: Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Gemini response: {}", e))
        })?;

        payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::ExternalApiError(
                    "Gemini response missing candidates[0].content.parts[0].text".to_string(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_url_uses_chain_code_and_query_set() {
        let service = UnleashNftsService::new("https://api.example.com/api/v1", "key");
        let id = NftIdentifier {
            blockchain: "polygon".to_string(),
            contract_address: "0xabc".to_string(),
            token_id: "7".to_string(),
        };

        let url = service.fragment_url(&id, &FRAGMENT_SPECS[1]).unwrap();
        assert_eq!(url.path(), "/api/v1/nft/137/0xabc/7/metrics");

        let params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(params.contains(&("metrics".to_string(), "volume".to_string())));
        assert!(params.contains(&("metrics".to_string(), "sales".to_string())));
        assert!(params.contains(&("time_range".to_string(), "30d".to_string())));
    }

    #[test]
    fn test_valuation_url_has_no_query() {
        let service = UnleashNftsService::new("https://api.example.com/api/v1", "key");
        let id = NftIdentifier {
            blockchain: "ethereum".to_string(),
            contract_address: "0xabc".to_string(),
            token_id: "1".to_string(),
        };

        let url = service.fragment_url(&id, &FRAGMENT_SPECS[2]).unwrap();
        assert_eq!(url.path(), "/api/v1/nft/1/0xabc/1/price-estimate");
        assert!(url.query().is_none() || url.query() == Some(""));
    }
}
