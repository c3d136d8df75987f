//! # Cluster Model
//!
//! Wire-form cluster records as submitted by the onboarding API and the
//! stored, versioned cluster entity.
//!
//! Version minting is identity-driven: a new cluster version exists only
//! when the `metadata` or `runtime` content differs from the latest stored
//! version, decided by a SHA-256 over the canonical JSON form of both
//! blobs.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use sqlx::FromRow;

use crate::models::configuration::KymaConfig;

/// Desired-state submission for one managed cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(rename = "runtimeID")]
    pub runtime_id: String,
    /// Opaque metadata blob, stored as-is
    pub metadata: serde_json::Value,
    /// Opaque runtime input blob, stored as-is
    pub runtime_input: serde_json::Value,
    pub kyma_config: KymaConfig,
}

impl Cluster {
    /// Content hash deciding whether a new cluster version must be minted.
    pub fn content_hash(&self) -> String {
        content_hash(&self.metadata, &self.runtime_input)
    }
}

/// Stored cluster version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ClusterEntity {
    pub runtime_id: String,
    /// Monotonically increasing per runtime
    pub version: i64,
    /// Schema generation of the record, reserved for migrations
    pub contract: i64,
    pub metadata: serde_json::Value,
    pub runtime: serde_json::Value,
    pub created: NaiveDateTime,
}

impl ClusterEntity {
    /// Content hash over the same canonical form as [`Cluster::content_hash`].
    pub fn content_hash(&self) -> String {
        content_hash(&self.metadata, &self.runtime)
    }
}

/// Canonical content hash over the two opaque blobs. `serde_json::Value`
/// objects serialize with sorted keys, so the form is order-insensitive for
/// object keys while staying sensitive to every value change.
fn content_hash(metadata: &serde_json::Value, runtime: &serde_json::Value) -> String {
    let canonical = json!({
        "metadata": metadata,
        "runtime": runtime,
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cluster(metadata: serde_json::Value) -> Cluster {
        Cluster {
            runtime_id: "runtime-a".to_string(),
            metadata,
            runtime_input: json!({"name": "cluster-a", "description": "test"}),
            kyma_config: KymaConfig {
                profile: None,
                version: "2.4.0".to_string(),
                components: vec![],
                administrators: vec![],
            },
        }
    }

    #[test]
    fn hash_ignores_object_key_order() {
        let a = cluster(json!({"globalAccountID": "g-1", "instanceID": "i-1"}));
        let b = cluster(json!({"instanceID": "i-1", "globalAccountID": "g-1"}));
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn hash_detects_blob_changes() {
        let a = cluster(json!({"globalAccountID": "g-1"}));
        let b = cluster(json!({"globalAccountID": "g-2"}));
        assert_ne!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn wire_form_uses_runtime_id_key() {
        let c = cluster(json!({}));
        let value = serde_json::to_value(&c).unwrap();
        assert!(value.get("runtimeID").is_some());
        assert!(value.get("kymaConfig").is_some());
        assert!(value.get("runtimeInput").is_some());
    }

    #[test]
    fn entity_hash_matches_wire_hash_for_same_content() {
        let c = cluster(json!({"globalAccountID": "g-1"}));
        let entity = ClusterEntity {
            runtime_id: c.runtime_id.clone(),
            version: 1,
            contract: 1,
            metadata: c.metadata.clone(),
            runtime: c.runtime_input.clone(),
            created: chrono::NaiveDateTime::default(),
        };
        assert_eq!(entity.content_hash(), c.content_hash());
    }
}
