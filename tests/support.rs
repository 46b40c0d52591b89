#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use p256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sd_jwt_vp_verifier::{
    config::VerifierConfig,
    core::{
        dcql_query::DcqlQuery,
        jws::{encode_es256, p256_jwk, Header},
        sd_jwt::{sha256_base64url, Disclosure, KB_JWT_TYPE},
    },
    verifier::{
        key_resolver::StaticKeyResolver,
        session::Session,
        status::StaticStatusResolver,
        trust::{StaticTrustStatementFetcher, TrustPolicy},
        Verifier,
    },
};
use serde_json::{json, Value as Json};

pub const VERIFIER_ID: &str = "x509_san_dns:verifier.example";
pub const EXTERNAL_URL: &str = "https://verifier.example/oid4vp";
pub const NONCE: &str = "n-0S6_WzA2Mj";
pub const PID_VCT: &str = "urn:eu.europa.ec.eudi:pid:1";
pub const ISSUER_DID: &str = "did:example:issuer";

pub struct Issuer {
    pub did: String,
    pub kid: String,
    key: SigningKey,
}

impl Issuer {
    pub fn new(did: &str) -> Self {
        Self {
            did: did.to_owned(),
            kid: format!("{did}#key-1"),
            key: SigningKey::random(&mut OsRng),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key().clone()
    }

    pub fn register(&self, keys: &mut StaticKeyResolver) {
        keys.insert(&self.did, &self.kid, self.verifying_key());
    }

    pub fn header(&self) -> Header {
        Header::es256("dc+sd-jwt", Some(self.kid.clone()))
    }

    /// Base claims for a PID credential of this issuer, valid for an hour.
    pub fn pid_claims(&self) -> Json {
        let now = Utc::now().timestamp();
        json!({
            "iss": self.did,
            "vct": PID_VCT,
            "iat": now,
            "nbf": now - 60,
            "exp": now + 3600,
        })
    }

    /// Issues an SD-JWT with each of `disclosed` selectively disclosable,
    /// returning `<jwt>~<disclosure>~...~`.
    pub fn issue(&self, claims: Json, disclosed: &[(&str, Json)]) -> String {
        let disclosures: Vec<Disclosure> = disclosed
            .iter()
            .enumerate()
            .map(|(i, (name, value))| Disclosure::new(format!("salt-{i}"), *name, value.clone()))
            .collect();
        let jwt = self.sign_with_digests(self.header(), claims, &disclosures);
        present(&jwt, &disclosures)
    }

    /// Signs `claims`, adding the digests of `disclosures` to `_sd`.
    pub fn sign_with_digests(&self, header: Header, mut claims: Json, disclosures: &[Disclosure]) -> String {
        if !disclosures.is_empty() {
            claims["_sd"] = json!(disclosures.iter().map(|d| d.digest()).collect::<Vec<_>>());
            claims["_sd_alg"] = json!("sha-256");
        }
        self.sign(header, claims)
    }

    pub fn sign(&self, header: Header, claims: Json) -> String {
        encode_es256(&header, &claims, &self.key).unwrap()
    }
}

/// `<jwt>~<disclosure>~...~`
pub fn present(jwt: &str, disclosures: &[Disclosure]) -> String {
    let mut presentation = format!("{jwt}~");
    for disclosure in disclosures {
        presentation.push_str(disclosure.encoded());
        presentation.push('~');
    }
    presentation
}

pub struct Holder {
    key: SigningKey,
}

impl Holder {
    pub fn new() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
        }
    }

    pub fn cnf(&self) -> Json {
        json!({ "jwk": p256_jwk(self.key.verifying_key()) })
    }

    /// The key binding claims a well behaved wallet sends.
    pub fn kb_claims(&self, presentation: &str) -> Json {
        json!({
            "iat": Utc::now().timestamp(),
            "aud": VERIFIER_ID,
            "nonce": NONCE,
            "sd_hash": sha256_base64url(presentation),
        })
    }

    /// Appends a key binding JWT to `presentation`.
    pub fn bind(&self, presentation: &str) -> String {
        self.bind_with(presentation, |_| {})
    }

    pub fn bind_with(&self, presentation: &str, edit: impl FnOnce(&mut Json)) -> String {
        let mut claims = self.kb_claims(presentation);
        edit(&mut claims);
        let kb = encode_es256(&Header::es256(KB_JWT_TYPE, None), &claims, &self.key).unwrap();
        format!("{presentation}{kb}")
    }
}

pub fn config() -> VerifierConfig {
    let mut config: VerifierConfig = serde_json::from_value(json!({
        "client_id": VERIFIER_ID,
        "external_url": EXTERNAL_URL,
    }))
    .unwrap();
    config.status_list_cache_ttl_seconds = 0;
    config
}

pub fn verifier(
    keys: StaticKeyResolver,
    statuses: StaticStatusResolver,
    fetcher: StaticTrustStatementFetcher,
) -> Verifier {
    Verifier::builder()
        .with_config(config())
        .with_key_resolver(Arc::new(keys))
        .with_status_resolver(Arc::new(statuses))
        .with_trust_statement_fetcher(Arc::new(fetcher))
        .build()
        .unwrap()
}

/// A verifier that knows the keys of `issuers` and no status lists.
pub fn verifier_for(issuers: &[&Issuer]) -> Verifier {
    let mut keys = StaticKeyResolver::new();
    for issuer in issuers {
        issuer.register(&mut keys);
    }
    verifier(
        keys,
        StaticStatusResolver::default(),
        StaticTrustStatementFetcher::default(),
    )
}

pub fn pid_query() -> Json {
    json!({
        "credentials": [{
            "id": "pid",
            "format": "dc+sd-jwt",
            "meta": {"vct_values": [PID_VCT]},
            "claims": [{"path": ["family_name"]}]
        }]
    })
}

pub fn session(query: Json, trust_policy: TrustPolicy) -> Session {
    Session::new(NONCE, DcqlQuery::try_from(query).unwrap(), trust_policy)
}

pub fn trusting(issuer: &Issuer) -> TrustPolicy {
    TrustPolicy::with_accepted_issuers(vec![issuer.did.clone()])
}
