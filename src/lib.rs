//! Verification of [SD-JWT VC] presentations submitted to an [OID4VP 1.0] verifier.
//!
//! [SD-JWT VC]: <https://datatracker.ietf.org/doc/draft-ietf-oauth-sd-jwt-vc/>
//! [OID4VP 1.0]: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html>
//!
//! # Verifier Usage
//!
//! ```ignore
//! use sd_jwt_vp_verifier::config::VerifierConfig;
//! use sd_jwt_vp_verifier::core::dcql_query::DcqlQuery;
//! use sd_jwt_vp_verifier::verifier::{session::Session, trust::TrustPolicy, Verifier};
//!
//! // Setup verifier.
//! let verifier = Verifier::builder()
//!     .with_config(VerifierConfig::new("x509_san_dns:verifier.example"))
//!     .with_key_resolver(key_resolver)
//!     .with_http_collaborators()?
//!     .build()?;
//!
//! // The request sent to the wallet.
//! let session = Session::new(
//!     nonce,
//!     DcqlQuery::try_from(dcql_query_json)?,
//!     TrustPolicy::with_accepted_issuers(vec!["did:example:issuer".into()]),
//! );
//!
//! // When the wallet responds, verify the `vp_token`.
//! let claims = verifier.verify_dcql_presentation(&session, &vp_token).await?;
//! ```
//!
//! # Verification
//!
//! Each presented SD-JWT goes through [`CredentialVerifier`], which checks, in
//! order and stopping at the first failure: the compact serialization, the
//! JOSE header, issuer trust, the issuer signature, validity times, the
//! credential status, the disclosures and finally the holder key binding.
//! Failures are reported as a [`VerificationError`] carrying an [`ErrorKind`].
//!
//! Issuer trust is decided by the [`TrustPolicy`] of the session: an
//! allow-list of issuers, or trust anchors whose registries publish trust
//! statements naming the issuer.
//!
//! [`CredentialVerifier`]: crate::verifier::pipeline::CredentialVerifier
//! [`VerificationError`]: crate::core::error::VerificationError
//! [`ErrorKind`]: crate::core::error::ErrorKind
//! [`TrustPolicy`]: crate::verifier::trust::TrustPolicy
//!
//! # Query Language
//!
//! Requested credentials are described with **DCQL** (Digital Credentials
//! Query Language, OID4VP v1.0 Section 6). Claims queries are evaluated by
//! [`match_claims`] against the first accepted presentation of each
//! credential query.
//!
//! [`match_claims`]: crate::core::dcql_query::matcher::match_claims

pub mod config;
pub mod core;
pub mod utils;
pub mod verifier;
