use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// The closed set of reasons a presentation can be rejected.
///
/// Serialized in snake case so the value can be handed to the wallet as an
/// OID4VP `error_description` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidFormat,
    MalformedCredential,
    JwtExpired,
    JwtPremature,
    PublicKeyOfIssuerUnresolvable,
    IssuerNotAccepted,
    HolderBindingMismatch,
    MissingNonce,
    CredentialRevoked,
    CredentialSuspended,
    UnresolvableStatusList,
    InvalidPresentationSubmission,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidFormat => "invalid_format",
            ErrorKind::MalformedCredential => "malformed_credential",
            ErrorKind::JwtExpired => "jwt_expired",
            ErrorKind::JwtPremature => "jwt_premature",
            ErrorKind::PublicKeyOfIssuerUnresolvable => "public_key_of_issuer_unresolvable",
            ErrorKind::IssuerNotAccepted => "issuer_not_accepted",
            ErrorKind::HolderBindingMismatch => "holder_binding_mismatch",
            ErrorKind::MissingNonce => "missing_nonce",
            ErrorKind::CredentialRevoked => "credential_revoked",
            ErrorKind::CredentialSuspended => "credential_suspended",
            ErrorKind::UnresolvableStatusList => "unresolvable_status_list",
            ErrorKind::InvalidPresentationSubmission => "invalid_presentation_submission",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single, terminal verification failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {description}")]
pub struct VerificationError {
    kind: ErrorKind,
    description: String,
}

impl VerificationError {
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn malformed(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedCredential, description)
    }

    pub(crate) fn holder_binding(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::HolderBindingMismatch, description)
    }

    pub(crate) fn submission(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPresentationSubmission, description)
    }
}

/// Result of verifying one presented credential.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    /// The credential passed every check; `claims` is the resolved claim set.
    Success { claims: Json },
    /// The first check that failed.
    Failure {
        kind: ErrorKind,
        description: String,
    },
}

impl VerificationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationOutcome::Success { .. })
    }

    pub fn claims(&self) -> Option<&Json> {
        match self {
            VerificationOutcome::Success { claims } => Some(claims),
            VerificationOutcome::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            VerificationOutcome::Success { .. } => None,
            VerificationOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn into_result(self) -> Result<Json, VerificationError> {
        match self {
            VerificationOutcome::Success { claims } => Ok(claims),
            VerificationOutcome::Failure { kind, description } => {
                Err(VerificationError::new(kind, description))
            }
        }
    }
}

impl From<Result<Json, VerificationError>> for VerificationOutcome {
    fn from(result: Result<Json, VerificationError>) -> Self {
        match result {
            Ok(claims) => VerificationOutcome::Success { claims },
            Err(VerificationError { kind, description }) => {
                VerificationOutcome::Failure { kind, description }
            }
        }
    }
}
