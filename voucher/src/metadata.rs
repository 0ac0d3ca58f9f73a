//! Token metadata
//!
//! A token's URI points at a loosely typed JSON document, usually on IPFS.
//! Every field is optional and a field of the wrong type counts as absent.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, VoucherError};

pub const IPFS_SCHEME: &str = "ipfs://";
pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io/ipfs/";

/// Display metadata of a voucher token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Front image URI
    pub image: Option<String>,
    /// `properties.imageBack`
    pub image_back: Option<String>,
}

impl TokenMetadata {
    pub fn from_value(value: &Value) -> Self {
        let text = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_string);
        Self {
            name: text(value.get("name")),
            description: text(value.get("description")),
            image: text(value.get("image")),
            image_back: text(value.get("properties").and_then(|p| p.get("imageBack"))),
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| VoucherError::Metadata(format!("not JSON: {}", e)))?;
        Ok(Self::from_value(&value))
    }
}

/// Map `ipfs://<cid>/<path>` onto an HTTP gateway; other URIs pass through
pub fn resolve_ipfs_uri(uri: &str, gateway_base: &str) -> String {
    match uri.strip_prefix(IPFS_SCHEME) {
        Some(rest) => {
            let rest = rest.strip_prefix("ipfs/").unwrap_or(rest);
            format!("{}/{}", gateway_base.trim_end_matches('/'), rest)
        }
        None => uri.to_string(),
    }
}

/// Where token metadata comes from
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<TokenMetadata>;

    /// Never fails: unreachable or malformed metadata reads as empty
    async fn fetch_or_default(&self, uri: &str) -> TokenMetadata {
        match self.fetch(uri).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(uri, error = %e, "metadata unavailable, using defaults");
                TokenMetadata::default()
            }
        }
    }
}

/// Fetches metadata over HTTP, through an IPFS gateway where needed
pub struct MetadataResolver {
    gateway_base: String,
    client: Client,
}

impl MetadataResolver {
    pub fn new(gateway_base: impl Into<String>) -> Self {
        Self {
            gateway_base: gateway_base.into(),
            client: Client::new(),
        }
    }

    pub fn resolve_uri(&self, uri: &str) -> String {
        resolve_ipfs_uri(uri, &self.gateway_base)
    }
}

impl Default for MetadataResolver {
    fn default() -> Self {
        Self::new(DEFAULT_IPFS_GATEWAY)
    }
}

#[async_trait]
impl MetadataSource for MetadataResolver {
    async fn fetch(&self, uri: &str) -> Result<TokenMetadata> {
        let url = self.resolve_uri(uri);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| VoucherError::NetworkUnavailable(format!("metadata fetch: {}", e)))?;

        if !resp.status().is_success() {
            return Err(VoucherError::Metadata(format!("{} returned {}", url, resp.status())));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| VoucherError::NetworkUnavailable(format!("metadata body: {}", e)))?;
        TokenMetadata::from_json(&bytes)
    }
}

/// Metadata documents held in memory, keyed by URI
#[derive(Default)]
pub struct StaticMetadata {
    documents: Mutex<HashMap<String, Value>>,
}

impl StaticMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, uri: impl Into<String>, document: Value) {
        self.documents.lock().insert(uri.into(), document);
    }
}

#[async_trait]
impl MetadataSource for StaticMetadata {
    async fn fetch(&self, uri: &str) -> Result<TokenMetadata> {
        self.documents
            .lock()
            .get(uri)
            .map(TokenMetadata::from_value)
            .ok_or_else(|| VoucherError::Metadata(format!("no document at {}", uri)))
    }
}
