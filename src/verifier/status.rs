//! Credential status checks against IETF Token Status Lists.
//!
//! See: <https://datatracker.ietf.org/doc/draft-ietf-oauth-status-list/>

use std::{
    collections::HashMap,
    fmt::Debug,
    io::Read,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::prelude::*;
use flate2::bufread::ZlibDecoder;
use serde_json::{Map, Value as Json};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use super::key_resolver::IssuerKeyResolver;
use crate::{
    config::VerifierConfig,
    core::{
        error::{ErrorKind, VerificationError},
        jws::CompactJws,
        util::{get_text, AsyncHttpClient},
    },
};

pub const STATUS_LIST_JWT_TYPE: &str = "statuslist+jwt";

/// Pointer from a credential into a status list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StatusReference {
    pub uri: Url,
    pub idx: usize,
    /// Issuer of the referencing credential, who must also have issued the
    /// status list.
    pub issuer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStatus {
    Valid,
    Revoked,
    Suspended,
    Unresolvable(String),
}

#[async_trait]
pub trait StatusResolver: Debug {
    /// Extracts the status references of a credential.
    fn references(
        &self,
        claims: &Map<String, Json>,
    ) -> Result<Vec<StatusReference>, VerificationError> {
        token_status_list_references(claims)
    }

    async fn verify(&self, reference: &StatusReference) -> CredentialStatus;
}

/// Reads `status.status_list.{idx,uri}`. Credentials without a status list
/// reference have no references.
pub fn token_status_list_references(
    claims: &Map<String, Json>,
) -> Result<Vec<StatusReference>, VerificationError> {
    let Some(status_list) = claims.get("status").and_then(|s| s.get("status_list")) else {
        return Ok(Vec::new());
    };
    let unresolvable = |description: &str| {
        VerificationError::new(ErrorKind::UnresolvableStatusList, description)
    };

    let idx = status_list
        .get("idx")
        .and_then(Json::as_u64)
        .and_then(|idx| usize::try_from(idx).ok())
        .ok_or_else(|| unresolvable("Invalid REQUIRED claim 'idx' in status_list"))?;
    let uri = status_list
        .get("uri")
        .and_then(Json::as_str)
        .and_then(|uri| Url::parse(uri).ok())
        .ok_or_else(|| unresolvable("Invalid REQUIRED claim 'uri' in status_list"))?;
    let issuer = claims
        .get("iss")
        .and_then(Json::as_str)
        .ok_or_else(|| unresolvable("Credential with a status list has no issuer"))?;

    Ok(vec![StatusReference {
        uri,
        idx,
        issuer: issuer.to_owned(),
    }])
}

/// Maps a status list value to a credential status.
pub fn credential_status(value: u8) -> CredentialStatus {
    match value {
        0 => CredentialStatus::Valid,
        1 => CredentialStatus::Revoked,
        2 => CredentialStatus::Suspended,
        other => {
            warn!("unexpected status list value {other}, treating as revoked");
            CredentialStatus::Revoked
        }
    }
}

/// A decompressed status list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusList {
    bits: u8,
    bytes: Vec<u8>,
}

impl StatusList {
    /// Decodes the base64url, zlib compressed `lst` claim. Inflating beyond
    /// `max_size` bytes fails.
    pub fn decode(bits: u64, lst: &str, max_size: usize) -> Result<Self> {
        let bits = match bits {
            1 | 2 | 4 | 8 => bits as u8,
            _ => bail!("invalid status list bit size {bits}"),
        };
        let compressed = BASE64_URL_SAFE_NO_PAD
            .decode(lst.trim_end_matches('='))
            .context("status list was not valid base64url")?;

        let mut decoder = ZlibDecoder::new(compressed.as_slice()).take(max_size as u64 + 1);
        let mut bytes = Vec::new();
        decoder
            .read_to_end(&mut bytes)
            .context("status list could not be inflated")?;
        if bytes.len() > max_size {
            bail!("status list exceeds the maximum size of {max_size} bytes")
        }

        Ok(Self { bits, bytes })
    }

    pub fn from_bytes(bits: u8, bytes: Vec<u8>) -> Self {
        Self { bits, bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len() * 8 / self.bits as usize
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The status value at `idx`, if the list is long enough.
    pub fn get(&self, idx: usize) -> Option<u8> {
        let bits = self.bits as usize;
        let offset = idx.checked_mul(bits)?;
        let byte = *self.bytes.get(offset / 8)?;
        let mask = ((1u16 << bits) - 1) as u8;
        Some((byte >> (offset % 8)) & mask)
    }
}

/// Fetches, verifies and caches status list tokens.
#[derive(Debug)]
pub struct TokenStatusListResolver<C> {
    client: C,
    key_resolver: Arc<dyn IssuerKeyResolver + Send + Sync>,
    accepted_hosts: Vec<String>,
    max_buffer_size: usize,
    ttl: Duration,
    cache: RwLock<HashMap<Url, (Instant, Arc<StatusList>)>>,
}

impl<C: AsyncHttpClient> TokenStatusListResolver<C> {
    pub fn new(
        client: C,
        key_resolver: Arc<dyn IssuerKeyResolver + Send + Sync>,
        config: &VerifierConfig,
    ) -> Self {
        Self {
            client,
            key_resolver,
            accepted_hosts: config.accepted_status_list_hosts.clone(),
            max_buffer_size: config.status_list_max_buffer_size,
            ttl: config.status_list_cache_ttl(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn load(&self, reference: &StatusReference) -> Result<Arc<StatusList>> {
        let uri = &reference.uri;
        if uri.scheme() != "https" {
            bail!("status list uri {uri} is not https")
        }
        let host = uri.host_str().context("status list uri has no host")?;
        if !self.accepted_hosts.is_empty() && !self.accepted_hosts.iter().any(|h| h == host) {
            bail!("status list host {host} is not accepted")
        }

        if let Some((fetched, list)) = self.cache.read().await.get(uri) {
            if fetched.elapsed() < self.ttl {
                return Ok(list.clone());
            }
        }

        let token = get_text(&self.client, uri, "application/statuslist+jwt").await?;
        let list = Arc::new(self.verify_token(token.trim(), reference).await?);
        debug!("status list {uri} unpacked, {} entries", list.len());

        if !self.ttl.is_zero() {
            self.cache
                .write()
                .await
                .insert(uri.clone(), (Instant::now(), list.clone()));
        }
        Ok(list)
    }

    async fn verify_token(&self, token: &str, reference: &StatusReference) -> Result<StatusList> {
        let jws = CompactJws::decode(token).context("status list token could not be parsed")?;
        if jws.header().typ() != Some(STATUS_LIST_JWT_TYPE) {
            bail!("status list token has wrong type {:?}", jws.header().typ)
        }
        let issuer = jws
            .claims()
            .get("iss")
            .and_then(Json::as_str)
            .context("status list token has no issuer")?;
        if issuer != reference.issuer {
            bail!(
                "status list issued by {issuer}, credential issued by {}",
                reference.issuer
            )
        }
        let kid = jws.header().kid().context("status list token has no kid")?;
        let key = self.key_resolver.resolve(issuer, kid).await?;
        jws.verify(&key)
            .context("status list token signature mismatch")?;

        let status_list = jws
            .claims()
            .get("status_list")
            .context("status list token has no status_list claim")?;
        let bits = status_list
            .get("bits")
            .and_then(Json::as_u64)
            .context("status_list has no bits")?;
        let lst = status_list
            .get("lst")
            .and_then(Json::as_str)
            .context("status_list has no lst")?;
        StatusList::decode(bits, lst, self.max_buffer_size)
    }
}

#[async_trait]
impl<C: AsyncHttpClient> StatusResolver for TokenStatusListResolver<C> {
    async fn verify(&self, reference: &StatusReference) -> CredentialStatus {
        let list = match self.load(reference).await {
            Ok(list) => list,
            Err(e) => {
                debug!("status list {} unresolvable: {e:#}", reference.uri);
                return CredentialStatus::Unresolvable(format!("{e:#}"));
            }
        };
        match list.get(reference.idx) {
            Some(value) => credential_status(value),
            None => CredentialStatus::Unresolvable(format!(
                "index {} is outside the status list",
                reference.idx
            )),
        }
    }
}

/// Fixed statuses, keyed by status list uri and index. Unknown references
/// are unresolvable.
#[derive(Debug, Clone, Default)]
pub struct StaticStatusResolver {
    statuses: HashMap<(Url, usize), CredentialStatus>,
}

impl StaticStatusResolver {
    pub fn with_status(mut self, uri: Url, idx: usize, status: CredentialStatus) -> Self {
        self.statuses.insert((uri, idx), status);
        self
    }
}

#[async_trait]
impl StatusResolver for StaticStatusResolver {
    async fn verify(&self, reference: &StatusReference) -> CredentialStatus {
        self.statuses
            .get(&(reference.uri.clone(), reference.idx))
            .cloned()
            .unwrap_or_else(|| CredentialStatus::Unresolvable("unknown status list".into()))
    }
}
