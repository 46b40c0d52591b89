use std::{collections::HashMap, sync::Arc};

use anyhow::{bail, Result};
use serde_json::{Map, Value as Json};
use tracing::{debug, error};

use key_resolver::IssuerKeyResolver;
use pipeline::{BindingPolicy, CredentialVerifier};
use session::Session;
use status::{StatusResolver, TokenStatusListResolver};
use trust::{
    HttpTrustStatementFetcher, StaticTrustStatementFetcher, TrustStatementFetcher, TrustValidator,
};

use crate::{
    config::VerifierConfig,
    core::{
        dcql_query::matcher::match_claims,
        error::{VerificationError, VerificationOutcome},
        util::ReqwestClient,
    },
};

pub mod key_resolver;
pub mod pipeline;
pub mod session;
pub mod status;
pub mod trust;

/// Verifies SD-JWT VC presentations submitted in answer to a DCQL query.
#[derive(Debug, Clone)]
pub struct Verifier {
    credential_verifier: CredentialVerifier,
}

impl Verifier {
    /// Build a new verifier.
    pub fn builder() -> VerifierBuilder {
        VerifierBuilder::default()
    }

    /// Verify a single presented SD-JWT.
    pub async fn verify_credential(
        &self,
        vp_token: &str,
        session: &Session,
        policy: BindingPolicy,
    ) -> VerificationOutcome {
        self.credential_verifier
            .verify(vp_token, session, policy)
            .await
    }

    /// Verify the `vp_token` of an authorization response against the DCQL
    /// query of `session`.
    ///
    /// `vp_token` maps each credential query id to the presentations the
    /// wallet submitted for it.
    ///
    /// ## Returns
    /// A JSON object mapping each credential query id to the resolved claims
    /// of every accepted presentation.
    pub async fn verify_dcql_presentation(
        &self,
        session: &Session,
        vp_token: &HashMap<String, Vec<String>>,
    ) -> Result<String, VerificationError> {
        let mut verified = Map::new();

        for query in session.dcql_query.credentials() {
            let id = query.id();
            if !query.format().is_sd_jwt() {
                return Err(VerificationError::submission(format!(
                    "Unsupported format {} requested for {id}",
                    query.format().as_str()
                )));
            }

            let presentations = vp_token
                .get(id)
                .filter(|presentations| !presentations.is_empty())
                .ok_or_else(|| {
                    VerificationError::submission(format!("Missing vp_token for {id}"))
                })?;
            if !query.multiple() && presentations.len() != 1 {
                return Err(VerificationError::submission(format!(
                    "Expected exactly one presentation for {id}, got {}",
                    presentations.len()
                )));
            }

            let policy = if query.require_cryptographic_holder_binding() {
                BindingPolicy::Mandatory
            } else {
                BindingPolicy::Optional
            };

            let mut candidates = Vec::with_capacity(presentations.len());
            for presentation in presentations {
                let credential = self
                    .credential_verifier
                    .verify_credential(presentation, session, policy)
                    .await?;
                if query.meta().accepts_vct(credential.vct()) {
                    candidates.push(credential);
                } else {
                    debug!(
                        "presentation for {id} has vct {:?}, not one of {:?}",
                        credential.vct(),
                        query.meta().vct_values()
                    );
                }
            }

            let Some(first) = candidates.first() else {
                return Err(VerificationError::submission(format!(
                    "No presentation for {id} has a requested credential type"
                )));
            };
            if let Some(claims) = query.claims() {
                match_claims(&Json::Object(first.claims().clone()), claims).map_err(|e| {
                    VerificationError::submission(format!("Presentation for {id} rejected: {e}"))
                })?;
            }

            verified.insert(
                id.to_owned(),
                Json::Array(candidates.into_iter().map(|c| c.into_claims()).collect()),
            );
        }

        serde_json::to_string(&verified).map_err(|e| {
            error!("failed to serialize verified claims: {e}");
            VerificationError::submission("Verified claims could not be serialized")
        })
    }
}

/// Builder struct for [Verifier].
#[derive(Debug, Clone, Default)]
pub struct VerifierBuilder {
    config: Option<VerifierConfig>,
    key_resolver: Option<Arc<dyn IssuerKeyResolver + Send + Sync>>,
    trust_statement_fetcher: Option<Arc<dyn TrustStatementFetcher + Send + Sync>>,
    status_resolver: Option<Arc<dyn StatusResolver + Send + Sync>>,
}

impl VerifierBuilder {
    /// Build the verifier.
    pub fn build(self) -> Result<Verifier> {
        let Self {
            config,
            key_resolver,
            trust_statement_fetcher,
            status_resolver,
        } = self;

        let Some(config) = config else {
            bail!("configuration is required, see `with_config`")
        };

        let Some(key_resolver) = key_resolver else {
            bail!("issuer key resolver is required, see `with_key_resolver`")
        };

        let Some(status_resolver) = status_resolver else {
            bail!("status resolver is required, see `with_status_resolver`")
        };

        // Without a fetcher only anchors that issue credentials themselves are
        // trusted.
        let trust_statement_fetcher: Arc<dyn TrustStatementFetcher + Send + Sync> =
            match trust_statement_fetcher {
                Some(fetcher) => fetcher,
                None => Arc::new(StaticTrustStatementFetcher::default()),
            };

        let trust = TrustValidator::new(trust_statement_fetcher, key_resolver.clone());
        Ok(Verifier {
            credential_verifier: CredentialVerifier::new(
                Arc::new(config),
                key_resolver,
                trust,
                status_resolver,
            ),
        })
    }

    pub fn with_config(mut self, config: VerifierConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the [IssuerKeyResolver] used for credential, trust statement and
    /// status list signatures.
    pub fn with_key_resolver(mut self, key_resolver: Arc<dyn IssuerKeyResolver + Send + Sync>) -> Self {
        self.key_resolver = Some(key_resolver);
        self
    }

    pub fn with_trust_statement_fetcher(
        mut self,
        fetcher: Arc<dyn TrustStatementFetcher + Send + Sync>,
    ) -> Self {
        self.trust_statement_fetcher = Some(fetcher);
        self
    }

    pub fn with_status_resolver(mut self, status_resolver: Arc<dyn StatusResolver + Send + Sync>) -> Self {
        self.status_resolver = Some(status_resolver);
        self
    }

    /// Fetch trust statements and status lists over HTTPS, bounded by the
    /// configured timeout. The configuration and key resolver must be set
    /// first.
    pub fn with_http_collaborators(mut self) -> Result<Self> {
        let (Some(config), Some(key_resolver)) = (&self.config, &self.key_resolver) else {
            bail!("`with_config` and `with_key_resolver` must be called before `with_http_collaborators`")
        };

        let fetcher = HttpTrustStatementFetcher::new(ReqwestClient::new(config.http_timeout())?);
        let status_resolver = TokenStatusListResolver::new(
            ReqwestClient::new(config.http_timeout())?,
            key_resolver.clone(),
            config,
        );

        self.trust_statement_fetcher = Some(Arc::new(fetcher));
        self.status_resolver = Some(Arc::new(status_resolver));
        Ok(self)
    }
}
