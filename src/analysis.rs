//! Narrative analysis generation.
//!
//! Projects the six provider fragments into a flat analysis bundle, renders
//! the analyst prompt around it, and submits it to Gemini. Every failure on
//! this path degrades to the fixed fallback text; the analyze request itself
//! never fails because of the AI step.

use crate::models::{AnalyzeNftData, Fragment, NftFragments, NftIdentifier};
use crate::services::GeminiService;
use serde_json::{json, Value};

/// Returned whenever the AI key is absent or the Gemini call fails.
pub const AI_ANALYSIS_FALLBACK: &str =
    "AI analysis temporarily unavailable. Please check the raw data below.";

/// Status line reported in every successful aggregate response.
pub const API_STATUS_OK: &str =
    "Comprehensive BitsCrunch API data + AI analysis retrieved successfully";

/// Analyst prompt with a `{nft_data}` slot for the serialized bundle.
const ANALYSIS_PROMPT_TEMPLATE: &str = r#"
You are an expert NFT analyst with 10+ years of experience in blockchain, DeFi, and digital asset markets. You specialize in NFT valuation, market analysis, and investment strategies. Your insights are highly sought after by institutional investors and top-tier NFT traders.

Analyze the following NFT data and provide a comprehensive, professional analysis with definitive conclusions and actionable insights:

NFT DATA:
{nft_data}

Provide a structured analysis in the following format:

1. EXECUTIVE SUMMARY DASHBOARD
- DEFINE the current valuation status (OVERVALUED/UNDERVALUED/FAIR VALUE) with confidence level
- ASSESS Risk Level (LOW/MEDIUM/HIGH) with specific reasoning
- EVALUATE liquidity with concrete metrics
- PROVIDE a clear, actionable recommendation

2. PRICE ANALYSIS SECTION
- ANALYZE current valuation with market context
- IDENTIFY price trends and patterns
- DETERMINE market position relative to collection

3. RISK ASSESSMENT MATRIX
- IDENTIFY specific high-risk indicators
- QUANTIFY medium-risk factors
- HIGHLIGHT positive factors and opportunities

4. TRADING INTELLIGENCE
- ANALYZE market behavior patterns
- PREDICT price movements with confidence levels
- PROVIDE entry/exit strategies

5. ACTIONABLE RECOMMENDATIONS
- SPECIFIC actions for current holders
- CLEAR guidance for potential buyers
- DEFINITIVE strategies for traders

6. MONITORING ALERTS
- CRITICAL watchpoints with specific thresholds
- TECHNICAL indicators to monitor

7. COMPARATIVE ANALYSIS
- COMPARE with similar NFTs
- BENCHMARK against collection standards

8. TRANSPARENCY METRICS
- ASSESS data reliability with specific scores

Use professional language, definitive statements, and concrete recommendations. Avoid vague language - be specific and actionable. Use emojis strategically to enhance readability. Respond in English with confidence and authority.
"#;

/// Reads a field out of a fragment's payload, falling back to `default` when
/// the fragment failed or the path is absent. Fields of a failed fragment are
/// never read.
fn field(fragment: &Fragment, pointer: &str, default: Value) -> Value {
    match fragment.value() {
        Some(value) => value.pointer(pointer).cloned().unwrap_or(default),
        None => default,
    }
}

/// Projects the six fragments into the flat analysis input bundle, with
/// placeholder values wherever a source fragment failed.
pub fn build_analysis_bundle(id: &NftIdentifier, fragments: &NftFragments) -> Value {
    json!({
        "nft_info": {
            "contract_address": id.contract_address,
            "token_id": id.token_id,
            "blockchain": id.blockchain,
            "collection": field(&fragments.metadata, "/collection_name", json!("Unknown")),
            "name": field(&fragments.metadata, "/name", json!("Unknown")),
            "current_owner": field(&fragments.metadata, "/owned_by", json!("Unknown")),
            "past_owners": field(&fragments.metadata, "/past_owner_count", json!(0)),
            "hold_time": field(&fragments.metadata, "/hold_time_current", json!(0)),
            "mint_date": field(&fragments.metadata, "/minted_date", json!("Unknown")),
        },
        "pricing": {
            "latest_price": field(&fragments.metadata, "/price_latest/value", json!("N/A")),
            "fair_price": field(&fragments.metadata, "/price_fair_estimate/value", json!("N/A")),
            "ai_estimate": field(
                &fragments.valuation,
                "/metric_values/price_estimate/value",
                json!("N/A")
            ),
            "price_range": {
                "min": field(&fragments.price_history, "/price_min/value", json!("N/A")),
                "max": field(&fragments.price_history, "/price_max/value", json!("N/A")),
            },
        },
        "market_metrics": {
            "volume": field(&fragments.metrics, "/metric_values/volume/value", json!("0")),
            "sales": field(&fragments.metrics, "/metric_values/sales/value", json!(0)),
            "percentile": field(
                &fragments.valuation,
                "/metric_values/prediction_percentile/value",
                json!("N/A")
            ),
        },
        "traits": field(&fragments.traits, "/traits", json!([])),
        "transactions": field(&fragments.transactions, "/transactions", json!([])),
        "ai_valuation": field(&fragments.valuation, "/metric_values", json!({})),
    })
}

/// Renders the analyst prompt around the serialized bundle.
pub fn build_prompt(bundle: &Value) -> String {
    let data = serde_json::to_string_pretty(bundle).unwrap_or_else(|_| bundle.to_string());
    ANALYSIS_PROMPT_TEMPLATE.replace("{nft_data}", &data)
}

/// Produces the narrative analysis for one NFT.
///
/// Without a Gemini client this returns the fallback immediately, issuing no
/// network call. With one, any error from the generation call is logged and
/// degraded to the same fallback.
pub async fn generate_analysis(
    gemini: Option<&GeminiService>,
    id: &NftIdentifier,
    fragments: &NftFragments,
) -> String {
    let Some(gemini) = gemini else {
        tracing::debug!("Gemini key not set, using fallback analysis text");
        return AI_ANALYSIS_FALLBACK.to_string();
    };

    let bundle = build_analysis_bundle(id, fragments);
    let prompt = build_prompt(&bundle);

    match gemini.generate(&prompt).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("AI analysis failed, using fallback: {}", e);
            AI_ANALYSIS_FALLBACK.to_string()
        }
    }
}

/// Combines the identifier, the six fragments, and the narrative into the
/// final aggregate payload.
pub fn assemble_response(
    id: &NftIdentifier,
    fragments: NftFragments,
    ai_analysis: String,
) -> AnalyzeNftData {
    AnalyzeNftData {
        blockchain: id.blockchain.clone(),
        contract_address: id.contract_address.clone(),
        token_id: id.token_id.clone(),
        nft_metadata: fragments.metadata,
        nft_metrics: fragments.metrics,
        nft_valuation: fragments.valuation,
        nft_price_history: fragments.price_history,
        nft_traits: fragments.traits,
        nft_transactions: fragments.transactions,
        ai_analysis,
        api_status: API_STATUS_OK.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Fragment;

    fn identifier() -> NftIdentifier {
        NftIdentifier {
            blockchain: "ethereum".to_string(),
            contract_address: "0xabc".to_string(),
            token_id: "1".to_string(),
        }
    }

    fn all_failed() -> NftFragments {
        NftFragments {
            metadata: Fragment::failed("API Error: 500 - down"),
            metrics: Fragment::failed("API Error: 500 - down"),
            valuation: Fragment::failed("API Error: 500 - down"),
            price_history: Fragment::failed("API Error: 500 - down"),
            traits: Fragment::failed("API Error: 500 - down"),
            transactions: Fragment::failed("API Error: 500 - down"),
        }
    }

    #[test]
    fn test_bundle_uses_placeholders_for_failed_fragments() {
        let bundle = build_analysis_bundle(&identifier(), &all_failed());

        assert_eq!(bundle["nft_info"]["collection"], "Unknown");
        assert_eq!(bundle["nft_info"]["past_owners"], 0);
        assert_eq!(bundle["pricing"]["latest_price"], "N/A");
        assert_eq!(bundle["pricing"]["price_range"]["min"], "N/A");
        assert_eq!(bundle["market_metrics"]["volume"], "0");
        assert_eq!(bundle["market_metrics"]["sales"], 0);
        assert_eq!(bundle["traits"], json!([]));
        assert_eq!(bundle["transactions"], json!([]));
        assert_eq!(bundle["ai_valuation"], json!({}));
    }

    #[test]
    fn test_bundle_projects_successful_fragments() {
        let fragments = NftFragments {
            metadata: Fragment::Ok(json!({
                "collection_name": "CryptoPunks",
                "name": "Punk #1",
                "owned_by": "0xowner",
                "past_owner_count": 4,
                "hold_time_current": 120,
                "minted_date": "2017-06-23",
                "price_latest": {"value": 62.5},
                "price_fair_estimate": {"value": 60.1}
            })),
            metrics: Fragment::Ok(json!({
                "metric_values": {
                    "volume": {"value": "1200.5"},
                    "sales": {"value": 3}
                }
            })),
            valuation: Fragment::Ok(json!({
                "metric_values": {
                    "price_estimate": {"value": 59.9},
                    "prediction_percentile": {"value": 0.87}
                }
            })),
            price_history: Fragment::Ok(json!({
                "price_min": {"value": 40.0},
                "price_max": {"value": 75.0}
            })),
            traits: Fragment::Ok(json!({"traits": [{"trait_type": "Type", "value": "Alien"}]})),
            transactions: Fragment::Ok(json!({"transactions": [{"hash": "0x1"}]})),
        };

        let bundle = build_analysis_bundle(&identifier(), &fragments);

        assert_eq!(bundle["nft_info"]["collection"], "CryptoPunks");
        assert_eq!(bundle["nft_info"]["current_owner"], "0xowner");
        assert_eq!(bundle["pricing"]["latest_price"], 62.5);
        assert_eq!(bundle["pricing"]["ai_estimate"], 59.9);
        assert_eq!(bundle["pricing"]["price_range"]["max"], 75.0);
        assert_eq!(bundle["market_metrics"]["percentile"], 0.87);
        assert_eq!(bundle["traits"][0]["value"], "Alien");
        assert_eq!(bundle["transactions"][0]["hash"], "0x1");
    }

    #[test]
    fn test_prompt_embeds_bundle_and_report_outline() {
        let bundle = build_analysis_bundle(&identifier(), &all_failed());
        let prompt = build_prompt(&bundle);

        assert!(prompt.contains("EXECUTIVE SUMMARY DASHBOARD"));
        assert!(prompt.contains("TRANSPARENCY METRICS"));
        assert!(prompt.contains("\"contract_address\": \"0xabc\""));
        assert!(!prompt.contains("{nft_data}"));
    }

    #[tokio::test]
    async fn test_generate_analysis_without_key_returns_fallback() {
        let text = generate_analysis(None, &identifier(), &all_failed()).await;
        assert_eq!(text, AI_ANALYSIS_FALLBACK);
    }

    #[test]
    fn test_assemble_response_carries_markers_and_status() {
        let id = identifier();
        let fragments = all_failed();
        let data = assemble_response(&id, fragments, AI_ANALYSIS_FALLBACK.to_string());

        assert_eq!(data.blockchain, "ethereum");
        assert_eq!(data.api_status, API_STATUS_OK);
        assert!(data.nft_metrics.is_failed());

        let serialized = serde_json::to_value(&data).unwrap();
        assert_eq!(serialized["nft_metadata"]["data"], json!(null));
        assert!(serialized["nft_metadata"]["error"].is_string());
    }
}
