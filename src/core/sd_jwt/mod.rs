//! The SD-JWT token model: `<issuer-jwt>~<disclosure>~...~[<kb-jwt>]`.

use std::str::FromStr;

use crate::core::error::VerificationError;

pub mod disclosure;
pub mod key_binding;
pub mod verify;

pub use disclosure::{sha256_base64url, Disclosure};

pub const SEPARATOR: char = '~';

/// `typ` values accepted on the issuer-signed JWT.
pub const SD_JWT_VC_TYPES: &[&str] = &["vc+sd-jwt", "dc+sd-jwt"];

pub const KB_JWT_TYPE: &str = "kb+jwt";

/// The only supported `_sd_alg`.
pub const SD_ALG: &str = "sha-256";

/// A structurally valid SD-JWT, as presented by a holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdJwt {
    issuer_signed_jwt: String,
    disclosures: Vec<Disclosure>,
    key_binding: Option<String>,
    presentation: String,
}

impl SdJwt {
    pub fn parse(raw: &str) -> Result<Self, VerificationError> {
        if !raw.contains(SEPARATOR) {
            return Err(VerificationError::malformed(
                "SD-JWT must contain at least one '~' separator",
            ));
        }
        if raw.contains("~~") {
            return Err(VerificationError::malformed(
                "SD-JWT must not contain empty disclosures",
            ));
        }

        // A trailing separator yields an empty final segment, otherwise the
        // final segment is the key binding JWT. Either way it is not a
        // disclosure.
        let segments: Vec<&str> = raw.split(SEPARATOR).collect();
        let (issuer_signed_jwt, rest) = segments
            .split_first()
            .ok_or_else(|| VerificationError::malformed("SD-JWT is empty"))?;
        if issuer_signed_jwt.is_empty() {
            return Err(VerificationError::malformed(
                "SD-JWT is missing the issuer-signed JWT",
            ));
        }
        let (last, disclosures) = rest
            .split_last()
            .ok_or_else(|| VerificationError::malformed("SD-JWT is empty"))?;

        let disclosures = disclosures
            .iter()
            .map(|d| Disclosure::parse(d))
            .collect::<Result<Vec<_>, _>>()?;

        let key_binding = (!last.is_empty()).then(|| last.to_string());

        // Everything up to and including the last separator.
        let presentation_end = raw.rfind(SEPARATOR).map(|i| i + 1).unwrap_or(raw.len());

        Ok(Self {
            issuer_signed_jwt: issuer_signed_jwt.to_string(),
            disclosures,
            key_binding,
            presentation: raw[..presentation_end].to_string(),
        })
    }

    pub fn issuer_signed_jwt(&self) -> &str {
        &self.issuer_signed_jwt
    }

    pub fn disclosures(&self) -> &[Disclosure] {
        &self.disclosures
    }

    pub fn key_binding(&self) -> Option<&str> {
        self.key_binding.as_deref()
    }

    pub fn has_key_binding(&self) -> bool {
        self.key_binding.is_some()
    }

    /// The issuer-signed JWT and disclosures, ending in `~`: the input the
    /// holder hashes into the key binding `sd_hash`.
    pub fn presentation(&self) -> &str {
        &self.presentation
    }

    pub fn sd_hash(&self) -> String {
        sha256_base64url(&self.presentation)
    }
}

impl FromStr for SdJwt {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
