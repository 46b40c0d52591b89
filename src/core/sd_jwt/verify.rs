//! Checks on the issuer-signed part of an SD-JWT that do not depend on any
//! external collaborator besides the issuer key.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use p256::ecdsa::VerifyingKey;
use serde_json::{Map, Value as Json};
use tracing::{debug, trace};

use super::{Disclosure, SdJwt, SD_ALG, SD_JWT_VC_TYPES};
use crate::core::{
    error::{ErrorKind, VerificationError},
    jws::{CompactJws, Header, SUPPORTED_ALGORITHMS},
};

/// Registered claims that must never be selectively disclosed.
pub const NON_DISCLOSABLE_CLAIMS: &[&str] = &["iss", "nbf", "exp", "cnf", "vct", "status"];

pub fn decode_issuer_signed_jwt(sd_jwt: &SdJwt) -> Result<CompactJws, VerificationError> {
    CompactJws::decode(sd_jwt.issuer_signed_jwt())
        .map_err(|e| VerificationError::malformed(format!("Failed to parse JWT: {e:#}")))
}

/// Validates `alg`, `typ` and `kid`, returning the key id.
pub fn validate_header(header: &Header) -> Result<&str, VerificationError> {
    if !SUPPORTED_ALGORITHMS.contains(&header.alg.as_str()) {
        return Err(VerificationError::new(
            ErrorKind::InvalidFormat,
            format!("Unsupported algorithm: {}", header.alg),
        ));
    }
    match header.typ() {
        Some(typ) if SD_JWT_VC_TYPES.contains(&typ) => {}
        typ => {
            return Err(VerificationError::new(
                ErrorKind::InvalidFormat,
                format!("Unsupported type: {}", typ.unwrap_or("<none>")),
            ))
        }
    }
    match header.kid() {
        Some(kid) if !kid.trim().is_empty() => Ok(kid),
        _ => Err(VerificationError::malformed("Missing Key Id")),
    }
}

/// The `iss` claim, which every credential must carry.
pub fn issuer(claims: &Map<String, Json>) -> Result<&str, VerificationError> {
    claims
        .get("iss")
        .and_then(Json::as_str)
        .filter(|iss| !iss.trim().is_empty())
        .ok_or_else(|| VerificationError::malformed("Missing issuer"))
}

pub fn verify_signature(jws: &CompactJws, key: &VerifyingKey) -> Result<(), VerificationError> {
    jws.verify(key).map_err(|e| {
        debug!("issuer signature did not verify: {e:#}");
        VerificationError::malformed("Signature mismatch")
    })?;
    trace!("issuer signature verified");
    Ok(())
}

pub fn validate_times(
    claims: &Map<String, Json>,
    now: DateTime<Utc>,
) -> Result<(), VerificationError> {
    if let Some(exp) = numeric_date(claims, "exp")? {
        if now > exp {
            return Err(VerificationError::new(
                ErrorKind::JwtExpired,
                format!("Credential expired at {exp}"),
            ));
        }
    }
    if let Some(nbf) = numeric_date(claims, "nbf")? {
        if now < nbf {
            return Err(VerificationError::new(
                ErrorKind::JwtPremature,
                format!("Credential is not valid before {nbf}"),
            ));
        }
    }
    Ok(())
}

fn numeric_date(
    claims: &Map<String, Json>,
    name: &str,
) -> Result<Option<DateTime<Utc>>, VerificationError> {
    let Some(value) = claims.get(name) else {
        return Ok(None);
    };
    value
        .as_i64()
        .or_else(|| {
            value
                .as_f64()
                .map(f64::floor)
                .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        })
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(Some)
        .ok_or_else(|| VerificationError::malformed(format!("Invalid '{name}' claim")))
}

/// Checks every disclosure against the signed `_sd` digests and merges the
/// disclosed claims into `claims`.
///
/// The `_sd` array is left in place, so resolving with no disclosures yields
/// the base claims unchanged.
pub fn resolve_disclosures(
    mut claims: Map<String, Json>,
    disclosures: &[Disclosure],
) -> Result<Map<String, Json>, VerificationError> {
    match claims.get("_sd_alg") {
        None => {}
        Some(Json::String(alg)) if alg == SD_ALG => {}
        Some(alg) => {
            return Err(VerificationError::malformed(format!(
                "Unsupported _sd_alg: {alg}"
            )))
        }
    }

    let digests: Vec<&str> = match claims.get("_sd") {
        None => Vec::new(),
        Some(Json::Array(digests)) => digests
            .iter()
            .map(|d| {
                d.as_str()
                    .ok_or_else(|| VerificationError::malformed("_sd must only contain strings"))
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(VerificationError::malformed("_sd must be an array")),
    };

    let distinct: HashSet<&Disclosure> = disclosures.iter().collect();
    if distinct.len() != disclosures.len() {
        return Err(VerificationError::malformed("Non-distinct disclosures"));
    }

    for disclosure in disclosures {
        let name = disclosure.claim_name();
        if NON_DISCLOSABLE_CLAIMS.contains(&name) {
            return Err(VerificationError::malformed(format!(
                "Illegal disclosed claim name '{name}'"
            )));
        }
        if claims.contains_key(name) {
            return Err(VerificationError::malformed(format!(
                "Disclosed claim '{name}' collides with an existing claim"
            )));
        }
        let digest = disclosure.digest();
        let occurrences = digests.iter().filter(|d| **d == digest).count();
        if occurrences != 1 {
            return Err(VerificationError::malformed(format!(
                "Disclosure digest for '{name}' found {occurrences} times in _sd"
            )));
        }
    }
    debug!("{} disclosure digests checked", disclosures.len());

    // Names were checked to be distinct from the base claims above; two
    // disclosures may still name the same claim.
    for disclosure in disclosures {
        let name = disclosure.claim_name();
        if claims.contains_key(name) {
            return Err(VerificationError::malformed(format!(
                "Claim '{name}' disclosed more than once"
            )));
        }
        claims.insert(name.to_owned(), disclosure.claim_value().clone());
    }

    Ok(claims)
}
