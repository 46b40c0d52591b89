use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Verifier-wide settings.
///
/// Only `client_id` is required when deserializing; everything else has a
/// default suitable for production.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Identifier of this verifier, the default key binding audience.
    pub client_id: String,
    /// Public URL of this verifier, also accepted as key binding audience.
    #[serde(default)]
    pub external_url: Option<BaseUrl>,
    /// How far a key binding `iat` may deviate from the current time.
    #[serde(default = "default_proof_time_window")]
    pub acceptable_proof_time_window_seconds: u64,
    /// Upper bound for an inflated status list.
    #[serde(default = "default_status_list_max_buffer_size")]
    pub status_list_max_buffer_size: usize,
    /// Hosts status lists may be fetched from. Empty allows any host.
    #[serde(default)]
    pub accepted_status_list_hosts: Vec<String>,
    #[serde(default = "default_status_list_cache_ttl")]
    pub status_list_cache_ttl_seconds: u64,
    #[serde(default = "default_issuer_key_cache_ttl")]
    pub issuer_key_cache_ttl_seconds: u64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_ms: u64,
}

fn default_proof_time_window() -> u64 {
    120
}

fn default_status_list_max_buffer_size() -> usize {
    200_000
}

fn default_status_list_cache_ttl() -> u64 {
    60
}

fn default_issuer_key_cache_ttl() -> u64 {
    300
}

fn default_http_timeout() -> u64 {
    5_000
}

impl VerifierConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            external_url: None,
            acceptable_proof_time_window_seconds: default_proof_time_window(),
            status_list_max_buffer_size: default_status_list_max_buffer_size(),
            accepted_status_list_hosts: Vec::new(),
            status_list_cache_ttl_seconds: default_status_list_cache_ttl(),
            issuer_key_cache_ttl_seconds: default_issuer_key_cache_ttl(),
            http_timeout_ms: default_http_timeout(),
        }
    }

    pub fn status_list_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.status_list_cache_ttl_seconds)
    }

    pub fn issuer_key_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.issuer_key_cache_ttl_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

/// A url that is always a base (can be safely join()'ed with further path elements without
/// mangling).
#[derive(Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct BaseUrl(Url);

impl BaseUrl {
    /// The url as it appears in an `aud` claim, without the trailing slash.
    pub fn as_audience(&self) -> &str {
        self.0.as_str().trim_end_matches('/')
    }
}

impl std::ops::Deref for BaseUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(mut url: String) -> Result<Self, Self::Error> {
        // Make URL a base.
        if !url.ends_with('/') {
            url += "/"
        }
        url.parse().map(Self)
    }
}
