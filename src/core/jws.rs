//! Compact JWS handling for the ES256 signed tokens that make up an SD-JWT
//! presentation: the issuer-signed JWT, the key binding JWT, status list
//! tokens and trust statements.

use anyhow::{bail, Context, Result};
use base64::prelude::*;
use p256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};

pub const ES256: &str = "ES256";

/// Signature algorithms accepted on any token.
pub const SUPPORTED_ALGORITHMS: &[&str] = &[ES256];

/// JOSE header of a compact JWS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl Header {
    pub fn es256(typ: impl Into<String>, kid: Option<String>) -> Self {
        Self {
            alg: ES256.to_owned(),
            typ: Some(typ.into()),
            kid,
        }
    }

    pub fn typ(&self) -> Option<&str> {
        self.typ.as_deref()
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }
}

/// A decoded, not yet verified, compact JWS with a JSON object payload.
#[derive(Debug, Clone)]
pub struct CompactJws {
    signing_input: String,
    header: Header,
    claims: Map<String, Json>,
    signature: Vec<u8>,
}

impl CompactJws {
    pub fn decode(jws: &str) -> Result<Self> {
        let mut parts = jws.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            bail!("jws did not have exactly three parts")
        };

        let header_bytes = BASE64_URL_SAFE_NO_PAD
            .decode(header_b64)
            .context("jws header was not valid base64url")?;
        let header: Header =
            serde_json::from_slice(&header_bytes).context("jws header was not a valid header")?;

        let payload_bytes = BASE64_URL_SAFE_NO_PAD
            .decode(payload_b64)
            .context("jws payload was not valid base64url")?;
        let claims = serde_json::from_slice::<Map<String, Json>>(&payload_bytes)
            .context("jws payload was not a json object")?;

        let signature = BASE64_URL_SAFE_NO_PAD
            .decode(signature_b64)
            .context("jws signature was not valid base64url")?;

        Ok(Self {
            signing_input: format!("{header_b64}.{payload_b64}"),
            header,
            claims,
            signature,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn claims(&self) -> &Map<String, Json> {
        &self.claims
    }

    pub fn into_parts(self) -> (Header, Map<String, Json>) {
        (self.header, self.claims)
    }

    /// Checks the ES256 signature against `key`.
    pub fn verify(&self, key: &VerifyingKey) -> Result<()> {
        if self.header.alg != ES256 {
            bail!("unsupported signature algorithm '{}'", self.header.alg)
        }
        let signature =
            Signature::from_slice(&self.signature).context("signature was not a P-256 signature")?;
        key.verify(self.signing_input.as_bytes(), &signature)
            .context("signature did not verify")
    }
}

/// Signs `claims` with `key`, producing a compact ES256 JWS.
pub fn encode_es256(header: &Header, claims: &Json, key: &SigningKey) -> Result<String> {
    let header_b64 = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(header)?);
    let payload_b64 = BASE64_URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature: Signature = key.sign(signing_input.as_bytes());
    let signature_b64 = BASE64_URL_SAFE_NO_PAD.encode(signature.to_bytes());
    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Parses a P-256 public JWK, ignoring any members other than the key
/// coordinates.
pub fn parse_p256_jwk(jwk: &Json) -> Result<VerifyingKey> {
    let Json::Object(jwk) = jwk else {
        bail!("jwk was not a json object")
    };
    let member = |name: &str| {
        jwk.get(name)
            .and_then(Json::as_str)
            .with_context(|| format!("jwk is missing '{name}'"))
    };
    if member("kty")? != "EC" || member("crv")? != "P-256" {
        bail!("jwk is not a P-256 key")
    }
    let coordinates = json!({
        "kty": "EC",
        "crv": "P-256",
        "x": member("x")?,
        "y": member("y")?,
    });
    let public_key = p256::PublicKey::from_jwk_str(&coordinates.to_string())
        .context("jwk coordinates are not a point on P-256")?;
    Ok(VerifyingKey::from(&public_key))
}

/// Encodes a P-256 public key as a JWK object.
pub fn p256_jwk(key: &VerifyingKey) -> Json {
    let jwk = p256::PublicKey::from(key).to_jwk_string();
    serde_json::from_str(&jwk).unwrap_or(Json::Null)
}
