use crate::errors::AppError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use utoipa::ToSchema;

// ============ NFT Identity ============

/// Maps a blockchain name to the provider's numeric chain code.
///
/// Unrecognized names fall back to the Ethereum code. The provider treats
/// Base as Ethereum-compatible and accepts it under code 1.
pub fn chain_code(blockchain: &str) -> u32 {
    match blockchain.to_lowercase().as_str() {
        "ethereum" | "base" => 1,
        "polygon" => 137,
        "bsc" => 56,
        _ => 1,
    }
}

/// Fully validated NFT identifier extracted from an analyze request.
#[derive(Debug, Clone)]
pub struct NftIdentifier {
    pub blockchain: String,
    pub contract_address: String,
    pub token_id: String,
}

impl NftIdentifier {
    pub fn chain_code(&self) -> u32 {
        chain_code(&self.blockchain)
    }

    /// Cache key for the provider fragment bundle of this token.
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.chain_code(),
            self.contract_address,
            self.token_id
        )
    }
}

// ============ Request Payloads ============

/// Body of `POST /api/set_api_keys`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetApiKeysRequest {
    pub unleash_nft_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

/// Body of `POST /api/analyze_nft`.
///
/// Fields are optional at the deserialization layer so that missing values
/// produce the documented 400 validation error instead of a rejection from
/// the JSON extractor.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AnalyzeNftRequest {
    pub blockchain: Option<String>,
    pub contract_address: Option<String>,
    pub token_id: Option<String>,
}

impl AnalyzeNftRequest {
    /// Validates that all three identifier fields are present and non-empty.
    pub fn into_identifier(self) -> Result<NftIdentifier, AppError> {
        match (
            self.blockchain.filter(|s| !s.is_empty()),
            self.contract_address.filter(|s| !s.is_empty()),
            self.token_id.filter(|s| !s.is_empty()),
        ) {
            (Some(blockchain), Some(contract_address), Some(token_id)) => Ok(NftIdentifier {
                blockchain,
                contract_address,
                token_id,
            }),
            _ => Err(AppError::BadRequest(
                "Missing NFT information (blockchain, contract_address, token_id)".to_string(),
            )),
        }
    }
}

// ============ Provider Fragments ============

/// One piece of NFT data from one provider sub-endpoint.
///
/// Either the provider's JSON payload verbatim, or a captured failure that
/// serializes as `{"error": <message>, "data": null}`. A failed sub-call
/// never invalidates the other fragments.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Ok(Value),
    Failed { error: String },
}

impl Fragment {
    pub fn failed(error: impl Into<String>) -> Self {
        Fragment::Failed {
            error: error.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Fragment::Failed { .. })
    }

    /// The provider payload, if this fragment succeeded.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Fragment::Ok(value) => Some(value),
            Fragment::Failed { .. } => None,
        }
    }

    fn from_value(value: Value) -> Self {
        if let Value::Object(map) = &value {
            if map.len() == 2 {
                if let (Some(Value::String(error)), Some(Value::Null)) =
                    (map.get("error"), map.get("data"))
                {
                    return Fragment::Failed {
                        error: error.clone(),
                    };
                }
            }
        }
        Fragment::Ok(value)
    }
}

impl Serialize for Fragment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Fragment::Ok(value) => value.serialize(serializer),
            Fragment::Failed { error } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("error", error)?;
                map.serialize_entry("data", &Value::Null)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Fragment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Fragment::from_value(value))
    }
}

/// The six provider response fragments for one NFT, in fetch order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftFragments {
    pub metadata: Fragment,
    pub metrics: Fragment,
    pub valuation: Fragment,
    pub price_history: Fragment,
    pub traits: Fragment,
    pub transactions: Fragment,
}

impl NftFragments {
    /// True when every sub-call succeeded. Only such bundles are cached.
    pub fn all_ok(&self) -> bool {
        !self.metadata.is_failed()
            && !self.metrics.is_failed()
            && !self.valuation.is_failed()
            && !self.price_history.is_failed()
            && !self.traits.is_failed()
            && !self.transactions.is_failed()
    }
}

// ============ Response Payloads ============

/// Response for `POST /api/set_api_keys`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SetApiKeysResponse {
    pub status: String,
    pub message: String,
}

/// Aggregate analysis payload inside the analyze response envelope.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyzeNftData {
    pub blockchain: String,
    pub contract_address: String,
    pub token_id: String,
    #[schema(value_type = Object)]
    pub nft_metadata: Fragment,
    #[schema(value_type = Object)]
    pub nft_metrics: Fragment,
    #[schema(value_type = Object)]
    pub nft_valuation: Fragment,
    #[schema(value_type = Object)]
    pub nft_price_history: Fragment,
    #[schema(value_type = Object)]
    pub nft_traits: Fragment,
    #[schema(value_type = Object)]
    pub nft_transactions: Fragment,
    pub ai_analysis: String,
    pub api_status: String,
}

/// Envelope for `POST /api/analyze_nft`.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyzeNftResponse {
    pub success: bool,
    pub data: AnalyzeNftData,
}
