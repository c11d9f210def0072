/// Property-based tests using proptest
/// Tests invariants and properties that should hold for all inputs
use proptest::prelude::*;
use rust_nft_analyzer_api::analysis::build_analysis_bundle;
use rust_nft_analyzer_api::models::{chain_code, Fragment, NftFragments, NftIdentifier};
use serde_json::json;

// Property: chain-code mapping is total and always yields a supported code
proptest! {
    #[test]
    fn chain_code_never_panics_and_is_supported(name in "\\PC*") {
        let code = chain_code(&name);
        prop_assert!(code == 1 || code == 137 || code == 56);
    }

    #[test]
    fn chain_code_is_case_insensitive(
        name in prop::sample::select(vec!["ethereum", "base", "polygon", "bsc"])
    ) {
        prop_assert_eq!(chain_code(name), chain_code(&name.to_uppercase()));
    }

    #[test]
    fn unknown_names_default_to_ethereum(name in "[a-z]{1,12}") {
        prop_assume!(!matches!(name.as_str(), "ethereum" | "base" | "polygon" | "bsc"));
        prop_assert_eq!(chain_code(&name), 1);
    }
}

// Property: failure markers always expose error text with a null data field
proptest! {
    #[test]
    fn failure_markers_serialize_with_null_data(error in "\\PC*") {
        let fragment = Fragment::failed(error.clone());
        let value = serde_json::to_value(&fragment).unwrap();

        prop_assert_eq!(value.get("data"), Some(&serde_json::Value::Null));
        prop_assert_eq!(
            value.get("error").and_then(|e| e.as_str()),
            Some(error.as_str())
        );
    }
}

// Property: bundle projection never reads failed fragments, only placeholders
proptest! {
    #[test]
    fn bundle_projection_defaults_for_failed_fragments(
        error in "\\PC*",
        token_id in "[0-9]{1,8}",
        blockchain in "[a-z]{1,10}"
    ) {
        let id = NftIdentifier {
            blockchain,
            contract_address: "0xabc".to_string(),
            token_id: token_id.clone(),
        };
        let failed = || Fragment::failed(error.clone());
        let fragments = NftFragments {
            metadata: failed(),
            metrics: failed(),
            valuation: failed(),
            price_history: failed(),
            traits: failed(),
            transactions: failed(),
        };

        let bundle = build_analysis_bundle(&id, &fragments);

        prop_assert_eq!(&bundle["nft_info"]["token_id"], &json!(token_id));
        prop_assert_eq!(&bundle["nft_info"]["collection"], &json!("Unknown"));
        prop_assert_eq!(&bundle["nft_info"]["past_owners"], &json!(0));
        prop_assert_eq!(&bundle["pricing"]["latest_price"], &json!("N/A"));
        prop_assert_eq!(&bundle["pricing"]["price_range"]["min"], &json!("N/A"));
        prop_assert_eq!(&bundle["market_metrics"]["volume"], &json!("0"));
        prop_assert_eq!(&bundle["traits"], &json!([]));
        prop_assert_eq!(&bundle["transactions"], &json!([]));
        prop_assert_eq!(&bundle["ai_valuation"], &json!({}));
    }
}
