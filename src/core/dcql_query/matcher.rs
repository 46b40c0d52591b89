//! Evaluation of DCQL claims queries against a resolved claim set.

use serde_json::Value as Json;

use super::{DcqlCredentialClaimsQuery, DcqlCredentialClaimsQueryPath};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClaimMatchError {
    #[error("claim path {path} could not be resolved: {reason}")]
    Unresolvable { path: String, reason: String },
    #[error("claim at {path} has value {value}, which is not one of the requested values")]
    UnexpectedValue { path: String, value: Json },
}

/// Checks that every claims query resolves in `claims` and, where the query
/// lists values, that every selected claim has one of them.
pub fn match_claims(
    claims: &Json,
    queries: &[DcqlCredentialClaimsQuery],
) -> Result<(), ClaimMatchError> {
    for query in queries {
        let path = display_path(query);
        let selected = select(claims, query.path())
            .map_err(|reason| ClaimMatchError::Unresolvable {
                path: path.clone(),
                reason,
            })?;

        let Some(values) = query.values() else {
            continue;
        };
        if let Some(unexpected) = selected
            .into_iter()
            .find(|claim| !values.iter().any(|v| v.matches(claim)))
        {
            return Err(ClaimMatchError::UnexpectedValue {
                path,
                value: unexpected.clone(),
            });
        }
    }
    Ok(())
}

/// Follows a claims path pointer, returning every claim it selects.
///
/// Elements lacking the requested key or index are dropped from the
/// selection. The walk fails on a type mismatch or when nothing is left.
pub fn select<'a>(
    claims: &'a Json,
    path: &[DcqlCredentialClaimsQueryPath],
) -> Result<Vec<&'a Json>, String> {
    let mut selected = vec![claims];
    for component in path {
        let mut next = Vec::with_capacity(selected.len());
        for claim in selected {
            match (component, claim) {
                (DcqlCredentialClaimsQueryPath::String(key), Json::Object(object)) => {
                    next.extend(object.get(key));
                }
                (DcqlCredentialClaimsQueryPath::Null, Json::Array(elements)) => {
                    next.extend(elements.iter());
                }
                (DcqlCredentialClaimsQueryPath::Integer(index), Json::Array(elements)) => {
                    next.extend(elements.get(*index));
                }
                (DcqlCredentialClaimsQueryPath::String(key), _) => {
                    return Err(format!("cannot select claim '{key}' from a non-object"))
                }
                (_, _) => return Err("cannot select an element from a non-array".into()),
            }
        }
        if next.is_empty() {
            return Err(format!(
                "{} selected no claims",
                serde_json::to_string(component).unwrap_or_default()
            ));
        }
        selected = next;
    }
    Ok(selected)
}

fn display_path(query: &DcqlCredentialClaimsQuery) -> String {
    let path = serde_json::to_string(query.path()).unwrap_or_else(|_| "<path>".into());
    match query.id() {
        Some(id) => format!("{path} ({id})"),
        None => path,
    }
}
