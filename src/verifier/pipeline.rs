//! Verification of a single presented SD-JWT.
//!
//! The phases run in a fixed order and the first failure is the result:
//!
//! 1. structure of the compact serialization
//! 2. JOSE header (`alg`, `typ`, `kid`)
//! 3. issuer trust, before any key is fetched
//! 4. issuer key resolution and signature
//! 5. `exp` / `nbf`
//! 6. credential status
//! 7. disclosure resolution
//! 8. holder key binding

use std::sync::Arc;

use chrono::Utc;
use p256::ecdsa::VerifyingKey;
use serde_json::{Map, Value as Json};
use tracing::{debug, trace};

use super::{
    key_resolver::IssuerKeyResolver,
    session::Session,
    status::{CredentialStatus, StatusResolver},
    trust::TrustValidator,
};
use crate::{
    config::VerifierConfig,
    core::{
        error::{ErrorKind, VerificationError, VerificationOutcome},
        jws::{CompactJws, Header},
        sd_jwt::{
            key_binding::{self, KeyBindingRequirements},
            verify, Disclosure, SdJwt,
        },
    },
};

/// Whether a presentation must carry a key binding JWT.
///
/// With [`BindingPolicy::Optional`] the key binding is still checked whenever
/// the credential has a `cnf` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindingPolicy {
    #[default]
    Optional,
    Mandatory,
}

/// Issuer-signed claims with a verified signature. Disclosures have not been
/// merged yet.
#[derive(Debug, Clone)]
pub struct VerifiedJwt {
    header: Header,
    claims: Map<String, Json>,
}

impl VerifiedJwt {
    pub fn verify(jws: CompactJws, key: &VerifyingKey) -> Result<Self, VerificationError> {
        verify::verify_signature(&jws, key)?;
        let (header, claims) = jws.into_parts();
        Ok(Self { header, claims })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn claims(&self) -> &Map<String, Json> {
        &self.claims
    }

    pub fn resolve(self, disclosures: &[Disclosure]) -> Result<ResolvedCredential, VerificationError> {
        let claims = verify::resolve_disclosures(self.claims, disclosures)?;
        Ok(ResolvedCredential {
            header: self.header,
            claims,
        })
    }
}

/// A credential with every disclosed claim merged in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCredential {
    header: Header,
    claims: Map<String, Json>,
}

impl ResolvedCredential {
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn claims(&self) -> &Map<String, Json> {
        &self.claims
    }

    pub fn vct(&self) -> Option<&str> {
        self.claims.get("vct").and_then(Json::as_str)
    }

    pub fn into_claims(self) -> Json {
        Json::Object(self.claims)
    }
}

#[derive(Debug, Clone)]
pub struct CredentialVerifier {
    config: Arc<VerifierConfig>,
    key_resolver: Arc<dyn IssuerKeyResolver + Send + Sync>,
    trust: TrustValidator,
    status_resolver: Arc<dyn StatusResolver + Send + Sync>,
}

impl CredentialVerifier {
    pub fn new(
        config: Arc<VerifierConfig>,
        key_resolver: Arc<dyn IssuerKeyResolver + Send + Sync>,
        trust: TrustValidator,
        status_resolver: Arc<dyn StatusResolver + Send + Sync>,
    ) -> Self {
        Self {
            config,
            key_resolver,
            trust,
            status_resolver,
        }
    }

    /// Verifies `raw` and reports the resolved claims or the first failure.
    pub async fn verify(
        &self,
        raw: &str,
        session: &Session,
        policy: BindingPolicy,
    ) -> VerificationOutcome {
        self.verify_credential(raw, session, policy)
            .await
            .map(ResolvedCredential::into_claims)
            .into()
    }

    pub async fn verify_credential(
        &self,
        raw: &str,
        session: &Session,
        policy: BindingPolicy,
    ) -> Result<ResolvedCredential, VerificationError> {
        let result = self.run(raw, session, policy).await;
        if let Err(e) = &result {
            debug!("presentation for session {} rejected: {e}", session.uuid);
        }
        result
    }

    async fn run(
        &self,
        raw: &str,
        session: &Session,
        policy: BindingPolicy,
    ) -> Result<ResolvedCredential, VerificationError> {
        let sd_jwt = SdJwt::parse(raw)?;
        let jws = verify::decode_issuer_signed_jwt(&sd_jwt)?;

        let kid = verify::validate_header(jws.header())?.to_owned();

        let issuer = verify::issuer(jws.claims())?.to_owned();
        let vct = jws.claims().get("vct").and_then(Json::as_str);
        if !self
            .trust
            .is_trusted(&issuer, vct, &session.trust_policy)
            .await
        {
            return Err(VerificationError::new(
                ErrorKind::IssuerNotAccepted,
                format!("Issuer {issuer} is not accepted"),
            ));
        }

        let key = self
            .key_resolver
            .resolve(&issuer, &kid)
            .await
            .map_err(|e| {
                VerificationError::new(
                    ErrorKind::PublicKeyOfIssuerUnresolvable,
                    format!("Failed to resolve key '{kid}' of issuer {issuer}: {e:#}"),
                )
            })?;
        trace!("loaded key '{kid}' of issuer {issuer}");
        let verified = VerifiedJwt::verify(jws, &key)?;

        verify::validate_times(verified.claims(), Utc::now())?;

        self.check_status(verified.claims()).await?;

        let resolved = verified.resolve(sd_jwt.disclosures())?;

        if resolved.claims().contains_key("cnf") || policy == BindingPolicy::Mandatory {
            let holder_key = key_binding::holder_key(resolved.claims())?;
            let audiences = self.audiences(session);
            key_binding::validate(
                &sd_jwt,
                &holder_key,
                &KeyBindingRequirements {
                    nonce: &session.nonce,
                    audiences: &audiences,
                    proof_time_window_seconds: self.config.acceptable_proof_time_window_seconds,
                    now: Utc::now(),
                },
            )?;
        }

        Ok(resolved)
    }

    async fn check_status(&self, claims: &Map<String, Json>) -> Result<(), VerificationError> {
        for reference in self.status_resolver.references(claims)? {
            match self.status_resolver.verify(&reference).await {
                CredentialStatus::Valid => {}
                CredentialStatus::Revoked => {
                    return Err(VerificationError::new(
                        ErrorKind::CredentialRevoked,
                        "Credential has been revoked",
                    ))
                }
                CredentialStatus::Suspended => {
                    return Err(VerificationError::new(
                        ErrorKind::CredentialSuspended,
                        "Credential has been suspended",
                    ))
                }
                CredentialStatus::Unresolvable(reason) => {
                    return Err(VerificationError::new(
                        ErrorKind::UnresolvableStatusList,
                        format!("Status list {} could not be resolved: {reason}", reference.uri),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Values accepted as key binding `aud`: the verifier identifier and its
    /// external url, either possibly overridden by the session.
    fn audiences(&self, session: &Session) -> Vec<String> {
        let overrides = session.configuration_override.as_ref();
        let verifier_id = overrides
            .and_then(|o| o.verifier_did.clone())
            .unwrap_or_else(|| self.config.client_id.clone());
        let external_url = overrides
            .and_then(|o| o.external_url.as_deref())
            .map(|url| url.trim_end_matches('/').to_owned())
            .or_else(|| {
                self.config
                    .external_url
                    .as_ref()
                    .map(|url| url.as_audience().to_owned())
            });

        let mut audiences = vec![verifier_id];
        audiences.extend(external_url);
        audiences.retain(|aud| !aud.trim().is_empty());
        audiences
    }
}
