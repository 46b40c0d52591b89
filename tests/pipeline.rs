use chrono::Utc;
use sd_jwt_vp_verifier::{
    core::{
        error::{ErrorKind, VerificationOutcome},
        jws::Header,
        sd_jwt::Disclosure,
    },
    verifier::{
        key_resolver::StaticKeyResolver,
        pipeline::BindingPolicy,
        session::ConfigurationOverride,
        status::{CredentialStatus, StaticStatusResolver},
        trust::{StaticTrustStatementFetcher, TrustPolicy},
    },
};
use serde_json::json;
use url::Url;

mod support;

use support::*;

fn kind(outcome: &VerificationOutcome) -> Option<ErrorKind> {
    outcome.error_kind()
}

#[tokio::test]
async fn resolved_claims_equal_base_claims_without_disclosures() {
    let issuer = Issuer::new(ISSUER_DID);
    let claims = issuer.pid_claims();
    let vp = issuer.issue(claims.clone(), &[]);

    let outcome = verifier_for(&[&issuer])
        .verify_credential(&vp, &session(pid_query(), trusting(&issuer)), BindingPolicy::Optional)
        .await;
    assert_eq!(outcome, VerificationOutcome::Success { claims });
}

#[tokio::test]
async fn disclosures_and_key_binding() {
    let issuer = Issuer::new(ISSUER_DID);
    let holder = Holder::new();
    let mut claims = issuer.pid_claims();
    claims["cnf"] = holder.cnf();
    let vp = holder.bind(&issuer.issue(
        claims,
        &[("given_name", json!("Erika")), ("family_name", json!("Mustermann"))],
    ));

    let outcome = verifier_for(&[&issuer])
        .verify_credential(&vp, &session(pid_query(), trusting(&issuer)), BindingPolicy::Mandatory)
        .await;
    let claims = outcome.claims().expect("presentation should verify");
    assert_eq!(claims["given_name"], "Erika");
    assert_eq!(claims["family_name"], "Mustermann");
    assert_eq!(claims["vct"], PID_VCT);
}

#[tokio::test]
async fn structural_failures() {
    let issuer = Issuer::new(ISSUER_DID);
    let verifier = verifier_for(&[&issuer]);
    let session = session(pid_query(), trusting(&issuer));
    let jwt = issuer.sign(issuer.header(), issuer.pid_claims());

    for vp in [jwt.clone(), format!("{jwt}~~"), "not-a-jwt~".to_string()] {
        let outcome = verifier
            .verify_credential(&vp, &session, BindingPolicy::Optional)
            .await;
        assert_eq!(kind(&outcome), Some(ErrorKind::MalformedCredential), "{vp}");
    }
}

#[tokio::test]
async fn header_failures() {
    let issuer = Issuer::new(ISSUER_DID);
    let verifier = verifier_for(&[&issuer]);
    let session = session(pid_query(), trusting(&issuer));

    let mut wrong_alg = issuer.header();
    wrong_alg.alg = "ES384".into();
    let wrong_typ = Header::es256("jwt", Some(issuer.kid.clone()));
    let no_kid = Header::es256("dc+sd-jwt", None);

    for (header, expected) in [
        (wrong_alg, ErrorKind::InvalidFormat),
        (wrong_typ, ErrorKind::InvalidFormat),
        (no_kid, ErrorKind::MalformedCredential),
    ] {
        let vp = format!("{}~", issuer.sign(header, issuer.pid_claims()));
        let outcome = verifier
            .verify_credential(&vp, &session, BindingPolicy::Optional)
            .await;
        assert_eq!(kind(&outcome), Some(expected));
    }
}

#[tokio::test]
async fn trust_is_checked_before_key_resolution() {
    let issuer = Issuer::new(ISSUER_DID);
    // No key registered for the issuer.
    let verifier = verifier_for(&[]);
    let vp = issuer.issue(issuer.pid_claims(), &[]);

    let untrusted = session(pid_query(), TrustPolicy::with_accepted_issuers(vec!["did:example:other".into()]));
    let outcome = verifier
        .verify_credential(&vp, &untrusted, BindingPolicy::Optional)
        .await;
    assert_eq!(kind(&outcome), Some(ErrorKind::IssuerNotAccepted));

    let nobody = session(pid_query(), TrustPolicy::default());
    let outcome = verifier
        .verify_credential(&vp, &nobody, BindingPolicy::Optional)
        .await;
    assert_eq!(kind(&outcome), Some(ErrorKind::IssuerNotAccepted));

    let trusted = session(pid_query(), trusting(&issuer));
    let outcome = verifier
        .verify_credential(&vp, &trusted, BindingPolicy::Optional)
        .await;
    assert_eq!(kind(&outcome), Some(ErrorKind::PublicKeyOfIssuerUnresolvable));
}

#[tokio::test]
async fn open_trust_policy_accepts_any_issuer() {
    let issuer = Issuer::new("did:example:unlisted");
    let vp = issuer.issue(issuer.pid_claims(), &[]);

    let outcome = verifier_for(&[&issuer])
        .verify_credential(&vp, &session(pid_query(), TrustPolicy::open()), BindingPolicy::Optional)
        .await;
    assert!(outcome.is_success());
}

#[tokio::test]
async fn signature_mismatch() {
    let issuer = Issuer::new(ISSUER_DID);
    let impostor = Issuer::new(ISSUER_DID);
    let vp = impostor.issue(impostor.pid_claims(), &[]);

    let outcome = verifier_for(&[&issuer])
        .verify_credential(&vp, &session(pid_query(), trusting(&issuer)), BindingPolicy::Optional)
        .await;
    assert_eq!(kind(&outcome), Some(ErrorKind::MalformedCredential));
}

#[tokio::test]
async fn validity_times() {
    let issuer = Issuer::new(ISSUER_DID);
    let verifier = verifier_for(&[&issuer]);
    let session = session(pid_query(), trusting(&issuer));
    let now = Utc::now().timestamp();

    let mut expired = issuer.pid_claims();
    expired["exp"] = json!(now - 10);
    let mut premature = issuer.pid_claims();
    premature["nbf"] = json!(now + 600);

    for (claims, expected) in [(expired, ErrorKind::JwtExpired), (premature, ErrorKind::JwtPremature)] {
        let vp = issuer.issue(claims, &[]);
        let outcome = verifier
            .verify_credential(&vp, &session, BindingPolicy::Optional)
            .await;
        assert_eq!(kind(&outcome), Some(expected));
    }
}

#[tokio::test]
async fn credential_status() {
    let issuer = Issuer::new(ISSUER_DID);
    let mut keys = StaticKeyResolver::new();
    issuer.register(&mut keys);
    let list: Url = "https://status.example/lists/1".parse().unwrap();
    let statuses = StaticStatusResolver::default()
        .with_status(list.clone(), 0, CredentialStatus::Valid)
        .with_status(list.clone(), 1, CredentialStatus::Revoked)
        .with_status(list, 2, CredentialStatus::Suspended);
    let verifier = verifier(keys, statuses, StaticTrustStatementFetcher::default());
    let session = session(pid_query(), trusting(&issuer));

    for (idx, expected) in [
        (0, None),
        (1, Some(ErrorKind::CredentialRevoked)),
        (2, Some(ErrorKind::CredentialSuspended)),
        (3, Some(ErrorKind::UnresolvableStatusList)),
    ] {
        let mut claims = issuer.pid_claims();
        claims["status"] = json!({
            "status_list": {"idx": idx, "uri": "https://status.example/lists/1"}
        });
        let vp = issuer.issue(claims, &[]);
        let outcome = verifier
            .verify_credential(&vp, &session, BindingPolicy::Optional)
            .await;
        assert_eq!(kind(&outcome), expected, "idx {idx}");
    }
}

#[tokio::test]
async fn duplicate_disclosures() {
    let issuer = Issuer::new(ISSUER_DID);
    let given = Disclosure::new("salt", "given_name", json!("Erika"));
    let jwt = issuer.sign_with_digests(issuer.header(), issuer.pid_claims(), &[given.clone()]);
    let vp = present(&jwt, &[given.clone(), given]);

    let outcome = verifier_for(&[&issuer])
        .verify_credential(&vp, &session(pid_query(), trusting(&issuer)), BindingPolicy::Optional)
        .await;
    assert_eq!(kind(&outcome), Some(ErrorKind::MalformedCredential));
}

#[tokio::test]
async fn reserved_claims_cannot_be_disclosed() {
    let issuer = Issuer::new(ISSUER_DID);
    let verifier = verifier_for(&[&issuer]);
    let session = session(pid_query(), trusting(&issuer));

    for name in ["iss", "nbf", "exp", "cnf", "vct", "status"] {
        let mut claims = issuer.pid_claims();
        claims.as_object_mut().unwrap().remove(name);
        // Issuer must stay resolvable for the trust check.
        claims["iss"] = json!(issuer.did);
        let vp = issuer.issue(claims, &[(name, json!("x"))]);
        let outcome = verifier
            .verify_credential(&vp, &session, BindingPolicy::Optional)
            .await;
        assert_eq!(kind(&outcome), Some(ErrorKind::MalformedCredential), "{name}");
    }
}

#[tokio::test]
async fn undisclosed_digest() {
    let issuer = Issuer::new(ISSUER_DID);
    let signed = Disclosure::new("salt-1", "given_name", json!("Erika"));
    let forged = Disclosure::new("salt-2", "given_name", json!("Max"));
    let jwt = issuer.sign_with_digests(issuer.header(), issuer.pid_claims(), &[signed]);
    let vp = present(&jwt, &[forged]);

    let outcome = verifier_for(&[&issuer])
        .verify_credential(&vp, &session(pid_query(), trusting(&issuer)), BindingPolicy::Optional)
        .await;
    assert_eq!(kind(&outcome), Some(ErrorKind::MalformedCredential));
}

#[tokio::test]
async fn key_binding_requirements() {
    let issuer = Issuer::new(ISSUER_DID);
    let holder = Holder::new();
    let verifier = verifier_for(&[&issuer]);
    let session = session(pid_query(), trusting(&issuer));

    // Mandatory binding without a cnf claim.
    let unbound = issuer.issue(issuer.pid_claims(), &[]);
    let outcome = verifier
        .verify_credential(&holder.bind(&unbound), &session, BindingPolicy::Mandatory)
        .await;
    assert_eq!(kind(&outcome), Some(ErrorKind::HolderBindingMismatch));

    let mut claims = issuer.pid_claims();
    claims["cnf"] = holder.cnf();
    let bound = issuer.issue(claims, &[("family_name", json!("Mustermann"))]);

    // A cnf claim makes the proof required even when binding is optional.
    let outcome = verifier
        .verify_credential(&bound, &session, BindingPolicy::Optional)
        .await;
    assert_eq!(kind(&outcome), Some(ErrorKind::HolderBindingMismatch));

    let other_holder = Holder::new();
    let now = Utc::now().timestamp();
    let cases: Vec<(String, ErrorKind)> = vec![
        (other_holder.bind(&bound), ErrorKind::HolderBindingMismatch),
        (
            holder.bind_with(&bound, |c| c["nonce"] = json!("other-nonce")),
            ErrorKind::MissingNonce,
        ),
        (
            holder.bind_with(&bound, |c| c["aud"] = json!("https://attacker.example")),
            ErrorKind::HolderBindingMismatch,
        ),
        (
            holder.bind_with(&bound, |c| c["aud"] = json!([VERIFIER_ID, EXTERNAL_URL])),
            ErrorKind::HolderBindingMismatch,
        ),
        (
            holder.bind_with(&bound, |c| c["iat"] = json!(now - 600)),
            ErrorKind::HolderBindingMismatch,
        ),
        (
            holder.bind_with(&bound, |c| c["sd_hash"] = json!("bm90IHRoZSBoYXNo")),
            ErrorKind::HolderBindingMismatch,
        ),
    ];
    for (vp, expected) in cases {
        let outcome = verifier
            .verify_credential(&vp, &session, BindingPolicy::Mandatory)
            .await;
        assert_eq!(kind(&outcome), Some(expected));
    }

    // Both the verifier id and the external url are accepted audiences.
    for aud in [json!(VERIFIER_ID), json!([EXTERNAL_URL])] {
        let vp = holder.bind_with(&bound, |c| c["aud"] = aud);
        let outcome = verifier
            .verify_credential(&vp, &session, BindingPolicy::Mandatory)
            .await;
        assert!(outcome.is_success(), "{outcome:?}");
    }
}

#[tokio::test]
async fn configuration_override_changes_audience() {
    let issuer = Issuer::new(ISSUER_DID);
    let holder = Holder::new();
    let mut claims = issuer.pid_claims();
    claims["cnf"] = holder.cnf();
    let bound = issuer.issue(claims, &[]);
    let verifier = verifier_for(&[&issuer]);

    let session = session(pid_query(), trusting(&issuer)).with_configuration_override(
        ConfigurationOverride {
            verifier_did: Some("did:example:tenant".into()),
            external_url: Some("https://tenant.example/".into()),
        },
    );

    let vp = holder.bind_with(&bound, |c| c["aud"] = json!("did:example:tenant"));
    assert!(verifier
        .verify_credential(&vp, &session, BindingPolicy::Mandatory)
        .await
        .is_success());

    let vp = holder.bind_with(&bound, |c| c["aud"] = json!("https://tenant.example"));
    assert!(verifier
        .verify_credential(&vp, &session, BindingPolicy::Mandatory)
        .await
        .is_success());

    let vp = holder.bind(&bound);
    assert_eq!(
        kind(
            &verifier
                .verify_credential(&vp, &session, BindingPolicy::Mandatory)
                .await
        ),
        Some(ErrorKind::HolderBindingMismatch)
    );
}
