//! Issuer trust: an allow-list of issuers, or trust anchors that vouch for
//! issuers through signed trust statements published in a registry.

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;
use url::Url;

use super::key_resolver::IssuerKeyResolver;
use crate::core::{
    error::{ErrorKind, VerificationError},
    sd_jwt::{verify, SdJwt},
    util::{get_text, AsyncHttpClient},
};

/// A party whose trust statements are accepted as proof of an issuer's
/// trustworthiness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustAnchor {
    pub did: String,
    pub trust_registry_uri: Url,
}

/// Which issuers a verification request accepts.
///
/// A default policy trusts nobody. Accepting any issuer requires
/// [`TrustPolicy::open`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustPolicy {
    #[serde(default)]
    pub accepted_issuers: Vec<String>,
    #[serde(default)]
    pub trust_anchors: Vec<TrustAnchor>,
    #[serde(default)]
    pub allow_any_issuer: bool,
}

impl TrustPolicy {
    /// Trusts every issuer.
    pub fn open() -> Self {
        Self {
            allow_any_issuer: true,
            ..Default::default()
        }
    }

    pub fn with_accepted_issuers(accepted_issuers: Vec<String>) -> Self {
        Self {
            accepted_issuers,
            ..Default::default()
        }
    }

    pub fn with_trust_anchors(trust_anchors: Vec<TrustAnchor>) -> Self {
        Self {
            trust_anchors,
            ..Default::default()
        }
    }
}

/// Source of trust statements.
///
/// Failures are not errors: an unreachable registry simply has no statements.
#[async_trait]
pub trait TrustStatementFetcher: Debug {
    async fn fetch(&self, registry: &Url, vct: &str) -> Vec<String>;
}

/// Fetches statements from `GET {registry}/api/v1/truststatements/issuance?vct={vct}`.
#[derive(Debug)]
pub struct HttpTrustStatementFetcher<C> {
    client: C,
}

impl<C: AsyncHttpClient> HttpTrustStatementFetcher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    async fn try_fetch(&self, registry: &Url, vct: &str) -> anyhow::Result<Vec<String>> {
        let mut url = registry.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("registry uri {registry} cannot be a base"))?
            .pop_if_empty()
            .extend(["api", "v1", "truststatements", "issuance"]);
        url.query_pairs_mut().append_pair("vct", vct);

        let body = get_text(&self.client, &url, "application/json").await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl<C: AsyncHttpClient> TrustStatementFetcher for HttpTrustStatementFetcher<C> {
    async fn fetch(&self, registry: &Url, vct: &str) -> Vec<String> {
        if vct.trim().is_empty() {
            return Vec::new();
        }
        match self.try_fetch(registry, vct).await {
            Ok(statements) => statements,
            Err(e) => {
                debug!("failed to fetch trust statements from {registry} for {vct}: {e:#}");
                Vec::new()
            }
        }
    }
}

/// In-memory trust statements keyed by registry and credential type.
#[derive(Debug, Clone, Default)]
pub struct StaticTrustStatementFetcher {
    statements: HashMap<(Url, String), Vec<String>>,
}

impl StaticTrustStatementFetcher {
    pub fn with_statement(mut self, registry: Url, vct: &str, statement: String) -> Self {
        self.statements
            .entry((registry, vct.to_owned()))
            .or_default()
            .push(statement);
        self
    }
}

#[async_trait]
impl TrustStatementFetcher for StaticTrustStatementFetcher {
    async fn fetch(&self, registry: &Url, vct: &str) -> Vec<String> {
        self.statements
            .get(&(registry.clone(), vct.to_owned()))
            .cloned()
            .unwrap_or_default()
    }
}

/// Decides whether an issuer is trusted to issue a credential type.
#[derive(Debug, Clone)]
pub struct TrustValidator {
    fetcher: Arc<dyn TrustStatementFetcher + Send + Sync>,
    key_resolver: Arc<dyn IssuerKeyResolver + Send + Sync>,
}

impl TrustValidator {
    pub fn new(
        fetcher: Arc<dyn TrustStatementFetcher + Send + Sync>,
        key_resolver: Arc<dyn IssuerKeyResolver + Send + Sync>,
    ) -> Self {
        Self {
            fetcher,
            key_resolver,
        }
    }

    pub async fn is_trusted(&self, issuer: &str, vct: Option<&str>, policy: &TrustPolicy) -> bool {
        if policy.allow_any_issuer {
            return true;
        }
        if policy.accepted_issuers.iter().any(|accepted| accepted == issuer) {
            return true;
        }
        if policy.trust_anchors.iter().any(|anchor| anchor.did == issuer) {
            return true;
        }

        let Some(vct) = vct.filter(|vct| !vct.trim().is_empty()) else {
            debug!("issuer {issuer} is not accepted and the credential has no vct");
            return false;
        };
        for anchor in &policy.trust_anchors {
            for statement in self.fetcher.fetch(&anchor.trust_registry_uri, vct).await {
                match self.verify_statement(&statement, anchor, issuer, vct).await {
                    Ok(()) => {
                        debug!("issuer {issuer} trusted for {vct} via anchor {}", anchor.did);
                        return true;
                    }
                    Err(e) => debug!("trust statement from {} rejected: {e}", anchor.did),
                }
            }
        }
        false
    }

    /// Verifies a trust statement with the signature, time and disclosure
    /// checks of a credential. The statement issuer's key is resolved
    /// directly, never through another trust hop.
    async fn verify_statement(
        &self,
        raw: &str,
        anchor: &TrustAnchor,
        issuer: &str,
        vct: &str,
    ) -> Result<(), VerificationError> {
        let sd_jwt = SdJwt::parse(raw)?;
        let jws = verify::decode_issuer_signed_jwt(&sd_jwt)?;
        let kid = verify::validate_header(jws.header())?;
        let statement_issuer = verify::issuer(jws.claims())?;
        if statement_issuer != anchor.did {
            return Err(VerificationError::new(
                ErrorKind::IssuerNotAccepted,
                format!("statement issued by {statement_issuer}, not {}", anchor.did),
            ));
        }

        let key = self
            .key_resolver
            .resolve(statement_issuer, kid)
            .await
            .map_err(|e| {
                VerificationError::new(ErrorKind::PublicKeyOfIssuerUnresolvable, format!("{e:#}"))
            })?;
        verify::verify_signature(&jws, &key)?;
        verify::validate_times(jws.claims(), Utc::now())?;

        let (_, claims) = jws.into_parts();
        let claims = verify::resolve_disclosures(claims, sd_jwt.disclosures())?;

        let subject = claims.get("sub").and_then(Json::as_str);
        let can_issue = claims.get("canIssue").and_then(Json::as_str);
        if subject != Some(issuer) || can_issue != Some(vct) {
            return Err(VerificationError::new(
                ErrorKind::IssuerNotAccepted,
                format!("statement does not allow {issuer} to issue {vct}"),
            ));
        }
        Ok(())
    }
}
