use std::hash::{Hash, Hasher};

use base64::prelude::*;
use serde_json::Value as Json;
use sha2::{Digest, Sha256};

use crate::core::error::VerificationError;

/// Claim names a disclosure must never carry.
pub const FORBIDDEN_CLAIM_NAMES: &[&str] = &["_sd", "..."];

/// A single selectively disclosable claim: base64url of `[salt, name, value]`.
///
/// Two disclosures are the same disclosure when their encoded forms match.
#[derive(Debug, Clone)]
pub struct Disclosure {
    encoded: String,
    salt: String,
    claim_name: String,
    claim_value: Json,
}

impl Disclosure {
    pub fn parse(encoded: &str) -> Result<Self, VerificationError> {
        let bytes = BASE64_URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('='))
            .map_err(|e| VerificationError::malformed(format!("Invalid disclosure: {e}")))?;
        let array: Vec<Json> = serde_json::from_slice(&bytes).map_err(|e| {
            VerificationError::malformed(format!("Disclosure is not a json array: {e}"))
        })?;

        let [salt, name, value]: [Json; 3] = array.try_into().map_err(|_| {
            VerificationError::malformed("Disclosure must have exactly three elements")
        })?;
        let (Json::String(salt), Json::String(claim_name)) = (salt, name) else {
            return Err(VerificationError::malformed(
                "Disclosure salt and claim name must be strings",
            ));
        };
        if FORBIDDEN_CLAIM_NAMES.contains(&claim_name.as_str()) {
            return Err(VerificationError::malformed(format!(
                "Illegal disclosure name '{claim_name}'"
            )));
        }

        Ok(Self {
            encoded: encoded.to_owned(),
            salt,
            claim_name,
            claim_value: value,
        })
    }

    /// Creates and encodes a new disclosure.
    pub fn new(salt: impl Into<String>, claim_name: impl Into<String>, claim_value: Json) -> Self {
        let salt = salt.into();
        let claim_name = claim_name.into();
        let array = Json::Array(vec![
            Json::String(salt.clone()),
            Json::String(claim_name.clone()),
            claim_value.clone(),
        ]);
        Self {
            encoded: BASE64_URL_SAFE_NO_PAD.encode(array.to_string()),
            salt,
            claim_name,
            claim_value,
        }
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn claim_name(&self) -> &str {
        &self.claim_name
    }

    pub fn claim_value(&self) -> &Json {
        &self.claim_value
    }

    /// The value an issuer places in `_sd` for this disclosure.
    pub fn digest(&self) -> String {
        sha256_base64url(&self.encoded)
    }
}

impl PartialEq for Disclosure {
    fn eq(&self, other: &Self) -> bool {
        self.encoded == other.encoded
    }
}

impl Eq for Disclosure {}

impl Hash for Disclosure {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.encoded.hash(state)
    }
}

/// base64url (unpadded) of the SHA-256 of `input`.
pub fn sha256_base64url(input: &str) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(input.as_bytes()))
}
