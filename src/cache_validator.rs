use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Validates cached provider bundles using SHA-256 checksums.
///
/// A fragment bundle is cached as a JSON string wrapped with its checksum and
/// fetch timestamp. Retrieval recomputes the checksum and discards entries
/// that no longer match, falling back to a fresh provider fetch.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidatedCacheEntry {
    /// The cached bundle (JSON string).
    pub data: String,
    /// SHA-256 checksum of the data (hex encoded).
    pub checksum: String,
    /// When the bundle was fetched from the provider.
    pub cached_at: DateTime<Utc>,
}

impl ValidatedCacheEntry {
    pub fn new(data: String) -> Self {
        let checksum = Self::compute_checksum(&data);
        Self {
            data,
            checksum,
            cached_at: Utc::now(),
        }
    }

    fn compute_checksum(data: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// True when the stored checksum matches the data.
    pub fn is_valid(&self) -> bool {
        Self::compute_checksum(&self.data) == self.checksum
    }

    /// Serializes the entry for storage in the cache.
    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Deserializes a cache entry, returning it only if the checksum holds.
    pub fn deserialize_and_validate(serialized: &str) -> Option<ValidatedCacheEntry> {
        let entry: ValidatedCacheEntry = serde_json::from_str(serialized).ok()?;

        if entry.is_valid() {
            Some(entry)
        } else {
            tracing::warn!(
                "Cache validation failed: checksum mismatch. Expected: {}, Data length: {}",
                entry.checksum,
                entry.data.len()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_entry_validation() {
        let data = r#"{"metadata": {"name": "Punk #1"}}"#.to_string();
        let entry = ValidatedCacheEntry::new(data.clone());

        assert!(entry.is_valid());
        assert_eq!(entry.data, data);
    }

    #[test]
    fn test_serialize_deserialize() {
        let data = r#"{"metadata": {}}"#.to_string();
        let entry = ValidatedCacheEntry::new(data.clone());

        let serialized = entry.serialize();
        let deserialized = ValidatedCacheEntry::deserialize_and_validate(&serialized).unwrap();

        assert_eq!(deserialized.data, data);
        assert_eq!(deserialized.cached_at, entry.cached_at);
    }

    #[test]
    fn test_tampered_data_rejected() {
        let entry = ValidatedCacheEntry::new(r#"{"original": "data"}"#.to_string());

        let mut tampered = entry;
        tampered.data = r#"{"tampered": "data"}"#.to_string();

        assert!(!tampered.is_valid());
    }

    #[test]
    fn test_tampered_cache_returns_none() {
        let entry = ValidatedCacheEntry::new(r#"{"original": "data"}"#.to_string());
        let serialized = entry.serialize();

        let tampered = serialized.replace("original", "hacked");

        assert!(ValidatedCacheEntry::deserialize_and_validate(&tampered).is_none());
    }

    #[test]
    fn test_checksum_consistency() {
        let data = "bundle data".to_string();
        let entry1 = ValidatedCacheEntry::new(data.clone());
        let entry2 = ValidatedCacheEntry::new(data);

        assert_eq!(entry1.checksum, entry2.checksum);
    }
}
