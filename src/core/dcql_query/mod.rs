use crate::{core::sd_jwt::SD_JWT_VC_TYPES, utils::NonEmptyVec};
use anyhow::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

pub mod matcher;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DcqlQuery {
    credentials: NonEmptyVec<DcqlCredentialQuery>,
}

impl DcqlQuery {
    pub fn new(credentials: NonEmptyVec<DcqlCredentialQuery>) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &[DcqlCredentialQuery] {
        &self.credentials
    }

    pub fn credentials_mut(&mut self) -> &mut NonEmptyVec<DcqlCredentialQuery> {
        &mut self.credentials
    }
}

impl TryFrom<Json> for DcqlQuery {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Credential format identifiers a query may ask for.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub enum CredentialFormat {
    #[serde(rename = "dc+sd-jwt")]
    DcSdJwt,
    /// Pre-1.0 media type, still presented by older wallets.
    #[serde(rename = "vc+sd-jwt")]
    VcSdJwt,
    #[serde(untagged)]
    Other(String),
}

impl CredentialFormat {
    pub fn as_str(&self) -> &str {
        match self {
            CredentialFormat::DcSdJwt => "dc+sd-jwt",
            CredentialFormat::VcSdJwt => "vc+sd-jwt",
            CredentialFormat::Other(s) => s,
        }
    }

    pub fn is_sd_jwt(&self) -> bool {
        SD_JWT_VC_TYPES.contains(&self.as_str())
    }
}

/// A Credential Query object
/// See: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6.1>
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DcqlCredentialQuery {
    /// REQUIRED. A string identifying the Credential in the response.
    id: String,

    /// REQUIRED. The requested format of the Credential.
    format: CredentialFormat,

    /// Format specific constraints on the Credential; for SD-JWT VC the
    /// accepted `vct` values.
    #[serde(default)]
    meta: DcqlCredentialMeta,

    /// OPTIONAL. Claims that must be present in the Credential.
    #[serde(skip_serializing_if = "Option::is_none")]
    claims: Option<NonEmptyVec<DcqlCredentialClaimsQuery>>,

    /// OPTIONAL. Defaults to `true` if not present.
    #[serde(skip_serializing_if = "Option::is_none")]
    require_cryptographic_holder_binding: Option<bool>,

    /// OPTIONAL. Defaults to `false` if not present.
    #[serde(skip_serializing_if = "Option::is_none")]
    multiple: Option<bool>,
}

impl DcqlCredentialQuery {
    pub fn new(id: String, format: CredentialFormat) -> Self {
        Self {
            id,
            format,
            meta: DcqlCredentialMeta::default(),
            claims: None,
            require_cryptographic_holder_binding: None,
            multiple: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn format(&self) -> &CredentialFormat {
        &self.format
    }

    pub fn meta(&self) -> &DcqlCredentialMeta {
        &self.meta
    }

    pub fn set_meta(&mut self, meta: DcqlCredentialMeta) {
        self.meta = meta;
    }

    pub fn claims(&self) -> Option<&NonEmptyVec<DcqlCredentialClaimsQuery>> {
        self.claims.as_ref()
    }

    pub fn set_claims(&mut self, claims: Option<NonEmptyVec<DcqlCredentialClaimsQuery>>) {
        self.claims = claims;
    }

    /// Returns `true` if cryptographic holder binding is required.
    /// Defaults to `true` per Section 6.1 if not explicitly set.
    pub fn require_cryptographic_holder_binding(&self) -> bool {
        self.require_cryptographic_holder_binding.unwrap_or(true)
    }

    pub fn set_require_cryptographic_holder_binding(
        &mut self,
        require_cryptographic_holder_binding: Option<bool>,
    ) {
        self.require_cryptographic_holder_binding = require_cryptographic_holder_binding;
    }

    /// Returns `true` if multiple Credentials may be returned for this query.
    /// Defaults to `false` per Section 6.1 if not explicitly set.
    pub fn multiple(&self) -> bool {
        self.multiple.unwrap_or(false)
    }

    pub fn set_multiple(&mut self, multiple: Option<bool>) {
        self.multiple = multiple;
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct DcqlCredentialMeta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    vct_values: Vec<String>,
}

impl DcqlCredentialMeta {
    pub fn new(vct_values: Vec<String>) -> Self {
        Self { vct_values }
    }

    pub fn vct_values(&self) -> &[String] {
        &self.vct_values
    }

    /// An empty `vct_values` places no constraint on the credential type.
    pub fn accepts_vct(&self, vct: Option<&str>) -> bool {
        if self.vct_values.is_empty() {
            return true;
        }
        vct.is_some_and(|vct| self.vct_values.iter().any(|v| v == vct))
    }
}

/// A Claims Query object
/// See: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6.3>
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DcqlCredentialClaimsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    /// REQUIRED. A claims path pointer into the Credential.
    path: NonEmptyVec<DcqlCredentialClaimsQueryPath>,
    /// OPTIONAL. The values the claim may take.
    #[serde(skip_serializing_if = "Option::is_none")]
    values: Option<NonEmptyVec<DcqlCredentialClaimsQueryValue>>,
}

impl DcqlCredentialClaimsQuery {
    pub fn new(path: NonEmptyVec<DcqlCredentialClaimsQueryPath>) -> Self {
        Self {
            id: None,
            path,
            values: None,
        }
    }

    pub fn id(&self) -> Option<&String> {
        self.id.as_ref()
    }

    pub fn set_id(&mut self, id: Option<String>) {
        self.id = id;
    }

    pub fn path(&self) -> &[DcqlCredentialClaimsQueryPath] {
        &self.path
    }

    pub fn values(&self) -> Option<&NonEmptyVec<DcqlCredentialClaimsQueryValue>> {
        self.values.as_ref()
    }

    pub fn set_values(&mut self, values: Option<NonEmptyVec<DcqlCredentialClaimsQueryValue>>) {
        self.values = values;
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum DcqlCredentialClaimsQueryValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
}

impl DcqlCredentialClaimsQueryValue {
    /// Numbers compare by value, so `98` matches `98.0` but not `98.1`.
    pub fn matches(&self, claim: &Json) -> bool {
        match self {
            DcqlCredentialClaimsQueryValue::String(s) => claim.as_str() == Some(s),
            DcqlCredentialClaimsQueryValue::Integer(i) => claim.as_f64() == Some(*i as f64),
            DcqlCredentialClaimsQueryValue::Number(n) => claim.as_f64() == Some(*n),
            DcqlCredentialClaimsQueryValue::Boolean(b) => claim.as_bool() == Some(*b),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DcqlCredentialClaimsQueryPath {
    String(String),
    /// Selects every element of an array.
    Null,
    Integer(usize),
}
