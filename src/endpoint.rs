//! Download endpoints: built-in presets, custom URL validation, and
//! per-connection cache-busting.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("endpoint URL '{url}' is not valid: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("endpoint URL must use http or https, got '{0}'")]
    UnsupportedScheme(String),

    #[error("endpoint URL '{0}' has no host")]
    MissingHost(String),

    #[error("unknown endpoint preset '{0}' (see `netsoak endpoints`)")]
    UnknownPreset(String),
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// A named download endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub display_name: String,
    pub url: String,
}

/// Built-in presets: large public test files on well-provisioned mirrors.
const BUILTIN: &[(&str, &str, &str)] = &[
    (
        "cloudflare",
        "Cloudflare Speed",
        "https://speed.cloudflare.com/__down?bytes=1073741824",
    ),
    (
        "hetzner",
        "Hetzner (Falkenstein)",
        "https://speed.hetzner.de/1GB.bin",
    ),
    ("ovh", "OVH (Gravelines)", "https://proof.ovh.net/files/1Gb.dat"),
    ("tele2", "Tele2 Speedtest", "http://speedtest.tele2.net/1GB.zip"),
];

pub fn builtin_presets() -> Vec<Endpoint> {
    BUILTIN
        .iter()
        .map(|(id, display_name, url)| Endpoint {
            id: id.to_string(),
            display_name: display_name.to_string(),
            url: url.to_string(),
        })
        .collect()
}

/// Look up a preset by id, built-ins first, then user-defined extras.
pub fn find_preset(id: &str, extras: &[Endpoint]) -> Option<Endpoint> {
    builtin_presets()
        .into_iter()
        .chain(extras.iter().cloned())
        .find(|e| e.id == id)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a custom endpoint URL: http/https with a non-empty host.
pub fn parse_custom_url(raw: &str) -> Result<Url, EndpointError> {
    let url = Url::parse(raw).map_err(|e| EndpointError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(EndpointError::UnsupportedScheme(scheme.to_string())),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(EndpointError::MissingHost(raw.to_string()));
    }
    Ok(url)
}

/// Resolve a test target: an explicit custom URL wins, otherwise the preset
/// id is looked up among built-ins and config-defined extras.
pub fn resolve_target(
    preset: Option<&str>,
    custom_url: Option<&str>,
    extras: &[Endpoint],
    default_preset: &str,
) -> Result<Url, EndpointError> {
    if let Some(raw) = custom_url {
        return parse_custom_url(raw);
    }
    let id = preset.unwrap_or(default_preset);
    let endpoint =
        find_preset(id, extras).ok_or_else(|| EndpointError::UnknownPreset(id.to_string()))?;
    parse_custom_url(&endpoint.url)
}

// ---------------------------------------------------------------------------
// Cache-busting
// ---------------------------------------------------------------------------

/// Build the URL for one connection attempt.
///
/// Every attempt gets a unique query suffix (slot id, random token,
/// millisecond timestamp) so neither the client cache nor an intermediary can
/// serve a previously seen body.
pub fn connection_url(base: &Url, worker_id: u32) -> Url {
    let token: u64 = rand::random();
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("ns_thread", &worker_id.to_string())
        .append_pair("ns_token", &format!("{token:016x}"))
        .append_pair(
            "ns_ts",
            &chrono::Utc::now().timestamp_millis().to_string(),
        );
    url
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
