use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::trust::TrustPolicy;
use crate::core::dcql_query::DcqlQuery;

/// The verification request a presentation answers. Read-only during
/// verification; storing it between request and response is up to the
/// embedding service.
#[derive(Debug, Clone)]
pub struct Session {
    pub uuid: Uuid,
    /// The nonce sent to the wallet, expected back in the key binding JWT.
    pub nonce: String,
    pub trust_policy: TrustPolicy,
    pub dcql_query: DcqlQuery,
    pub configuration_override: Option<ConfigurationOverride>,
}

impl Session {
    pub fn new(nonce: impl Into<String>, dcql_query: DcqlQuery, trust_policy: TrustPolicy) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            nonce: nonce.into(),
            trust_policy,
            dcql_query,
            configuration_override: None,
        }
    }

    pub fn with_configuration_override(mut self, configuration_override: ConfigurationOverride) -> Self {
        self.configuration_override = Some(configuration_override);
        self
    }
}

/// Per-request replacement of the verifier identity used for audience checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationOverride {
    #[serde(default)]
    pub verifier_did: Option<String>,
    #[serde(default)]
    pub external_url: Option<String>,
}
