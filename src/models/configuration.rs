//! # Cluster Configuration Model
//!
//! Derived configuration records, versioned per runtime. Every configuration
//! version points at exactly one cluster version; the
//! `(runtime_id, version)` pair is the work-unit handle passed to
//! reconcilers.
//!
//! A new configuration version is minted when the cluster version changes
//! or when the profile/version/component/administrator content changes
//! while the cluster version is stable. Content equality is decided by a
//! SHA-256 over a canonical form in which components are sorted by
//! `(component, namespace)`; the stored list keeps the submitted order, so
//! callers observe the order they sent while pure reordering does not mint
//! a new version.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use sqlx::types::Json;
use sqlx::FromRow;

/// One configuration entry of a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfiguration {
    pub key: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub secret: bool,
}

/// A component to be installed into the cluster. List order is preserved
/// through storage round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub component: String,
    pub namespace: String,
    #[serde(rename = "URL", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub configuration: Vec<ComponentConfiguration>,
}

/// Desired Kyma setup as submitted by the onboarding API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KymaConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    pub version: String,
    pub components: Vec<Component>,
    #[serde(default)]
    pub administrators: Vec<String>,
}

impl KymaConfig {
    /// Content hash deciding whether a new configuration version must be
    /// minted. Components are canonicalized by sort; everything else hashes
    /// in declaration order.
    pub fn content_hash(&self) -> String {
        let mut sorted = self.components.clone();
        sorted.sort_by(|a, b| {
            (a.component.as_str(), a.namespace.as_str())
                .cmp(&(b.component.as_str(), b.namespace.as_str()))
        });

        let canonical = json!({
            "profile": self.profile,
            "version": self.version,
            "components": sorted,
            "administrators": self.administrators,
        });

        let mut hasher = Sha256::new();
        hasher.update(canonical.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Stored configuration version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ClusterConfigurationEntity {
    pub runtime_id: String,
    /// Configuration version, minted per runtime
    pub version: i64,
    /// The cluster version this configuration derives from
    pub cluster_version: i64,
    pub contract: i64,
    pub kyma_version: String,
    pub kyma_profile: Option<String>,
    pub components: Json<Vec<Component>>,
    pub administrators: Json<Vec<String>>,
    pub created: NaiveDateTime,
}

impl ClusterConfigurationEntity {
    /// Content hash over the same canonical form as [`KymaConfig::content_hash`].
    pub fn content_hash(&self) -> String {
        KymaConfig {
            profile: self.kyma_profile.clone(),
            version: self.kyma_version.clone(),
            components: self.components.0.clone(),
            administrators: self.administrators.0.clone(),
        }
        .content_hash()
    }
}
