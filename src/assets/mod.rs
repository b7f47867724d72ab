//! Asset catalog client.
//!
//! The host extension's asset commands delegate to a third-party
//! catalog with a polyhaven-style REST surface:
//!
//! - `GET /categories/{asset_type}` — category listing
//! - `GET /assets?type=&categories=` — asset search
//! - `GET /files/{asset_id}` — per-asset file manifest by resolution
//!
//! Calls run synchronously on the host tick, the same place the
//! handlers that use them run; the per-request timeout keeps a slow
//! catalog from wedging a tick indefinitely.

use serde_json::{Map, Value, json};

use crate::constants::ASSET_REQUEST_TIMEOUT;
use crate::error::HandlerError;

/// Asset types the catalog understands.
pub const ASSET_TYPES: &[&str] = &["hdris", "textures", "models"];

/// Maximum number of assets returned from one search.
///
/// Search responses are truncated to keep result payloads manageable;
/// the full match count is reported alongside.
pub const SEARCH_RESULT_LIMIT: usize = 20;

/// One downloadable file resolved from an asset's manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFile {
    /// Direct download URL.
    pub url: String,
    /// File format, e.g. `"hdr"` or `"gltf"`.
    pub format: String,
    /// Declared size in bytes, when the manifest carries one.
    pub size: Option<u64>,
}

/// HTTP client for one configured asset catalog.
#[derive(Debug)]
pub struct AssetCatalog {
    base_url: String,
    enabled: bool,
    client: reqwest::blocking::Client,
}

impl AssetCatalog {
    /// Create a client for the catalog at `base_url`.
    ///
    /// A disabled catalog still answers status queries; every other
    /// call fails with a pointer at the configuration switch.
    pub fn new(base_url: &str, enabled: bool) -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("scenelink/", env!("CARGO_PKG_VERSION")))
            .timeout(ASSET_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { base_url: base_url.trim_end_matches('/').to_string(), enabled, client }
    }

    /// Whether asset commands are enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Status document for the provider-status command.
    pub fn status(&self) -> Value {
        if self.enabled {
            json!({
                "enabled": true,
                "message": "Asset catalog integration is enabled and ready to use."
            })
        } else {
            json!({
                "enabled": false,
                "message": "Asset catalog integration is disabled. Enable it in the \
                            scenelink config (assets_enabled) or set SCENELINK_ASSETS=1, \
                            then restart the host extension."
            })
        }
    }

    fn ensure_enabled(&self) -> Result<(), HandlerError> {
        if self.enabled {
            Ok(())
        } else {
            Err(HandlerError::new("asset catalog integration is disabled"))
        }
    }

    fn validate_type(asset_type: &str, allow_all: bool) -> Result<(), HandlerError> {
        let valid = ASSET_TYPES.contains(&asset_type) || (allow_all && asset_type == "all");
        if valid {
            Ok(())
        } else {
            Err(HandlerError::new(format!(
                "invalid asset type: {asset_type}. Must be one of: hdris, textures, models{}",
                if allow_all { ", all" } else { "" }
            )))
        }
    }

    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, HandlerError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| HandlerError::new(format!("asset catalog request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(HandlerError::new(format!(
                "asset catalog request failed with status {}",
                response.status().as_u16()
            )));
        }
        response
            .json()
            .map_err(|e| HandlerError::new(format!("asset catalog returned invalid JSON: {e}")))
    }

    /// Category listing for an asset type (`all` included).
    pub fn categories(&self, asset_type: &str) -> Result<Value, HandlerError> {
        self.ensure_enabled()?;
        Self::validate_type(asset_type, true)?;
        let categories = self.get_json(&format!("{}/categories/{asset_type}", self.base_url), &[])?;
        Ok(json!({ "categories": categories }))
    }

    /// Search assets, optionally filtered by type and categories.
    ///
    /// Results are truncated to [`SEARCH_RESULT_LIMIT`] entries.
    pub fn search(&self, asset_type: &str, categories: Option<&str>) -> Result<Value, HandlerError> {
        self.ensure_enabled()?;
        Self::validate_type(asset_type, true)?;

        let mut query: Vec<(&str, &str)> = Vec::new();
        if asset_type != "all" {
            query.push(("type", asset_type));
        }
        if let Some(categories) = categories {
            query.push(("categories", categories));
        }

        let assets = self.get_json(&format!("{}/assets", self.base_url), &query)?;
        let all: Map<String, Value> = match assets {
            Value::Object(map) => map,
            other => {
                return Err(HandlerError::new(format!(
                    "asset catalog returned unexpected search payload: {other}"
                )));
            }
        };

        let total_count = all.len();
        let limited: Map<String, Value> =
            all.into_iter().take(SEARCH_RESULT_LIMIT).collect();
        let returned_count = limited.len();
        Ok(json!({
            "assets": limited,
            "total_count": total_count,
            "returned_count": returned_count
        }))
    }

    /// Resolve the downloadable file for an asset at a resolution.
    ///
    /// The manifest section and format depend on the asset type; when
    /// the requested resolution is missing, the error lists what the
    /// manifest actually offers.
    pub fn resolve_download(
        &self,
        asset_id: &str,
        asset_type: &str,
        resolution: &str,
    ) -> Result<ResolvedFile, HandlerError> {
        self.ensure_enabled()?;
        Self::validate_type(asset_type, false)?;

        let manifest = self.get_json(&format!("{}/files/{asset_id}", self.base_url), &[])?;

        let (section, format) = match asset_type {
            "hdris" => ("hdri", "hdr"),
            "textures" => ("blend", "blend"),
            _ => ("gltf", "gltf"),
        };

        let by_resolution = manifest.get(section).and_then(Value::as_object).ok_or_else(|| {
            HandlerError::new(format!("asset '{asset_id}' has no {section} files"))
        })?;

        let entry = by_resolution.get(resolution).ok_or_else(|| {
            let available: Vec<&str> = by_resolution.keys().map(String::as_str).collect();
            HandlerError::new(format!(
                "resolution '{resolution}' not available for '{asset_id}' \
                 (available: {})",
                available.join(", ")
            ))
        })?;

        let file = entry.get(format).ok_or_else(|| {
            HandlerError::new(format!("no {format} file for '{asset_id}' at {resolution}"))
        })?;

        let url = file
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| HandlerError::new(format!("manifest for '{asset_id}' is missing a url")))?;

        Ok(ResolvedFile {
            url: url.to_string(),
            format: format.to_string(),
            size: file.get("size").and_then(Value::as_u64),
        })
    }

    /// Fetch a resolved file's bytes.
    pub fn download(&self, file: &ResolvedFile) -> Result<Vec<u8>, HandlerError> {
        self.ensure_enabled()?;
        let response = self
            .client
            .get(&file.url)
            .send()
            .map_err(|e| HandlerError::new(format!("asset download failed: {e}")))?;
        if !response.status().is_success() {
            return Err(HandlerError::new(format!(
                "asset download failed with status {}",
                response.status().as_u16()
            )));
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| HandlerError::new(format!("asset download failed: {e}")))
    }
}
