//! Holder key binding: the KB-JWT appended to a presented SD-JWT.

use chrono::{DateTime, Utc};
use p256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::debug;

use super::{SdJwt, KB_JWT_TYPE};
use crate::core::{
    error::{ErrorKind, VerificationError},
    jws::{parse_p256_jwk, CompactJws, SUPPORTED_ALGORITHMS},
};

/// `aud` may be a single string or an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyBindingClaims {
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub aud: Option<Audience>,
    /// Any JSON value; only the expected string matches.
    #[serde(default)]
    pub nonce: Option<Json>,
    #[serde(default)]
    pub sd_hash: Option<String>,
}

/// What the verifier expects the holder to have bound the presentation to.
#[derive(Debug, Clone)]
pub struct KeyBindingRequirements<'a> {
    pub nonce: &'a str,
    /// Every value accepted as `aud`.
    pub audiences: &'a [String],
    pub proof_time_window_seconds: u64,
    pub now: DateTime<Utc>,
}

/// The holder key from the `cnf` claim, either a bare JWK or nested under
/// `jwk`.
pub fn holder_key(claims: &Map<String, Json>) -> Result<VerifyingKey, VerificationError> {
    let cnf = claims.get("cnf").ok_or_else(|| {
        VerificationError::holder_binding("No cnf claim found. Only supporting JWK holder bindings")
    })?;
    let Json::Object(cnf) = cnf else {
        return Err(VerificationError::holder_binding(
            "Holder Binding is not a JWK",
        ));
    };
    let jwk = cnf.get("jwk").cloned().unwrap_or_else(|| Json::Object(cnf.clone()));
    parse_p256_jwk(&jwk).map_err(|e| {
        VerificationError::holder_binding(format!("Holder Binding Key could not be parsed: {e:#}"))
    })
}

/// Verifies the key binding JWT of `sd_jwt` against `holder_key`.
pub fn validate(
    sd_jwt: &SdJwt,
    holder_key: &VerifyingKey,
    requirements: &KeyBindingRequirements<'_>,
) -> Result<(), VerificationError> {
    let raw = sd_jwt
        .key_binding()
        .ok_or_else(|| VerificationError::holder_binding("Missing Holder Key Binding Proof"))?;
    let jws = CompactJws::decode(raw).map_err(|e| {
        VerificationError::holder_binding(format!(
            "Holder Key Binding Proof could not be parsed: {e:#}"
        ))
    })?;

    if jws.header().typ() != Some(KB_JWT_TYPE) {
        return Err(VerificationError::holder_binding(format!(
            "Invalid Holder Key Binding Proof type, expected {KB_JWT_TYPE}"
        )));
    }
    if !SUPPORTED_ALGORITHMS.contains(&jws.header().alg.as_str()) {
        return Err(VerificationError::holder_binding(format!(
            "Unsupported Holder Key Binding Proof algorithm: {}",
            jws.header().alg
        )));
    }
    jws.verify(holder_key).map_err(|e| {
        debug!("key binding signature did not verify: {e:#}");
        VerificationError::holder_binding(
            "Holder Binding provided does not match the one in the credential",
        )
    })?;

    let claims: KeyBindingClaims = serde_json::from_value(Json::Object(jws.claims().clone()))
        .map_err(|e| {
            VerificationError::holder_binding(format!(
                "Holder Key Binding Proof claims could not be parsed: {e}"
            ))
        })?;

    let iat = claims
        .iat
        .ok_or_else(|| VerificationError::holder_binding("Missing iat in Holder Key Binding Proof"))?;
    let window = i64::try_from(requirements.proof_time_window_seconds).unwrap_or(i64::MAX);
    let now = requirements.now.timestamp();
    if iat < now.saturating_sub(window) || iat > now.saturating_add(window) {
        return Err(VerificationError::holder_binding(format!(
            "Holder Key Binding Proof was issued at {iat}, outside the accepted window of {window}s"
        )));
    }

    let audience = match &claims.aud {
        Some(Audience::Single(aud)) => Some(aud.as_str()),
        Some(Audience::Multiple(auds)) if auds.len() == 1 => Some(auds[0].as_str()),
        _ => None,
    };
    match audience {
        Some(aud) if !aud.trim().is_empty() => {
            if !requirements.audiences.iter().any(|accepted| accepted == aud) {
                return Err(VerificationError::holder_binding(format!(
                    "Holder Key Binding Proof audience '{aud}' does not match the verifier"
                )));
            }
        }
        _ => {
            return Err(VerificationError::holder_binding(
                "Holder Key Binding Proof must have exactly one audience",
            ))
        }
    }

    if claims.nonce.as_ref().and_then(Json::as_str) != Some(requirements.nonce) {
        return Err(VerificationError::new(
            ErrorKind::MissingNonce,
            "Holder Key Binding Proof nonce does not match the request",
        ));
    }

    if claims.sd_hash.as_deref() != Some(sd_jwt.sd_hash().as_str()) {
        return Err(VerificationError::holder_binding(
            "Holder Key Binding Proof sd_hash does not match the presentation",
        ));
    }

    Ok(())
}
