//! # Seed Operations
//!
//! A seed is a deployment-time, one-shot bulk write: an ordered set of
//! items per table under one stable identifier. The stable id plus a
//! SHA-256 content fingerprint drive idempotence — activation skips a seed
//! whose id and fingerprint already appear in the store's ledger, and
//! re-applies one whose content changed (deterministic item keys make the
//! re-application overwrite, never duplicate).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use portico_core::Item;

/// The items destined for one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedAssignment {
    /// Target table name.
    pub table: String,
    /// Items, written in order. Each must carry the table's full key.
    pub items: Vec<Item>,
}

/// One declared seed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedSpec {
    /// Stable identifier detecting "already applied" across redeployments.
    pub stable_id: String,
    /// Table assignments in declaration order.
    pub assignments: Vec<SeedAssignment>,
}

impl SeedSpec {
    /// SHA-256 hex fingerprint of the seed content.
    ///
    /// Serialization is deterministic: assignments keep declaration order
    /// and item attributes serialize in sorted key order, so the same seed
    /// definition always fingerprints identically.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(&self.assignments)
            .unwrap_or_default();
        let hash = Sha256::digest(&bytes);
        hash.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(rating: i64) -> SeedSpec {
        SeedSpec {
            stable_id: "movie-data-v1".into(),
            assignments: vec![SeedAssignment {
                table: "movieReviews".into(),
                items: vec![Item::from_value(json!({
                    "movieId": 42,
                    "reviewDate": "2024-03-01",
                    "rating": rating
                }))
                .unwrap()],
            }],
        }
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(spec(4).fingerprint(), spec(4).fingerprint());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        assert_ne!(spec(4).fingerprint(), spec(5).fingerprint());
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fp = spec(4).fingerprint();
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
